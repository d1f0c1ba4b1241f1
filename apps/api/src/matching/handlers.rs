//! Axum route handlers for the Match API.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::matching::matcher::{rank_jobs, RankedMatch};
use crate::matching::scoring::MatchResult;
use crate::models::resume::ResumeProfile;
use crate::state::AppState;
use crate::storage::{JobFilter, DEFAULT_LIST_LIMIT};

const DEFAULT_BATCH_RESULTS: usize = 10;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct MatchRequest {
    pub resume_id: Uuid,
    pub job_id: String,
}

#[derive(Debug, Deserialize)]
pub struct BatchMatchRequest {
    pub resume_id: Uuid,
    /// Results returned. Defaults to 10.
    pub limit: Option<usize>,
    pub organization: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BatchMatchResponse {
    pub resume_id: Uuid,
    /// Active jobs scored before truncation.
    pub considered: usize,
    pub matches: Vec<RankedMatch>,
}

async fn load_resume(state: &AppState, id: Uuid) -> Result<ResumeProfile, AppError> {
    state
        .resumes
        .find_resume(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/match
pub async fn handle_match(
    State(state): State<AppState>,
    Json(req): Json<MatchRequest>,
) -> Result<Json<MatchResult>, AppError> {
    let job_id = req.job_id.trim();
    if job_id.is_empty() {
        return Err(AppError::Validation("job_id must not be empty".to_string()));
    }

    let resume = load_resume(&state, req.resume_id).await?;
    let job = state
        .jobs
        .find_job(job_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job {job_id} not found")))?;

    Ok(Json(state.matcher.match_job(&resume, &job).await))
}

/// POST /api/v1/match/batch
/// Scores the résumé against up to 50 active jobs and returns the best `limit`.
pub async fn handle_match_batch(
    State(state): State<AppState>,
    Json(req): Json<BatchMatchRequest>,
) -> Result<Json<BatchMatchResponse>, AppError> {
    let limit = req.limit.unwrap_or(DEFAULT_BATCH_RESULTS);
    if limit == 0 {
        return Err(AppError::Validation("limit must be at least 1".to_string()));
    }

    let resume = load_resume(&state, req.resume_id).await?;
    let filter = JobFilter {
        organization: req.organization,
        location: req.location,
        limit: DEFAULT_LIST_LIMIT,
    };
    let jobs = state.jobs.list_active_jobs(&filter).await?;
    let matches = rank_jobs(state.matcher.as_ref(), &resume, &jobs, limit).await;

    Ok(Json(BatchMatchResponse {
        resume_id: resume.id,
        considered: jobs.len(),
        matches,
    }))
}
