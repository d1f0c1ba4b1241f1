//! Persistence boundary for crawled jobs and parsed résumés.
//!
//! `job_id` is the natural key: writing an existing `job_id` updates the row in place
//! and refreshes `last_scraped`, never inserting a second row.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::job::{JobPosting, JobValidationError, NewJob};
use crate::models::resume::ResumeProfile;

/// Rows committed per transaction during batch saves.
pub const BATCH_COMMIT_SIZE: usize = 10;

pub const DEFAULT_LIST_LIMIT: usize = 50;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("job_id '{0}' was written concurrently by another crawler")]
    Conflict(String),

    #[error("invalid job record: {0}")]
    Invalid(#[from] JobValidationError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("storage backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Narrowing applied when listing active jobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFilter {
    pub organization: Option<String>,
    /// Case-insensitive substring of the location or duty station.
    pub location: Option<String>,
    pub limit: usize,
}

impl Default for JobFilter {
    fn default() -> Self {
        Self {
            organization: None,
            location: None,
            limit: DEFAULT_LIST_LIMIT,
        }
    }
}

impl JobFilter {
    pub fn matches(&self, job: &JobPosting) -> bool {
        if !job.is_active {
            return false;
        }
        if let Some(org) = &self.organization {
            if !job.organization.eq_ignore_ascii_case(org) {
                return false;
            }
        }
        if let Some(needle) = &self.location {
            let needle = needle.to_lowercase();
            let hit = [job.location.as_deref(), job.duty_station.as_deref()]
                .into_iter()
                .flatten()
                .any(|l| l.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        true
    }
}

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn upsert_job(&self, job: &NewJob) -> Result<UpsertOutcome, StoreError>;

    async fn find_job(&self, job_id: &str) -> Result<Option<JobPosting>, StoreError>;

    async fn list_active_jobs(&self, filter: &JobFilter) -> Result<Vec<JobPosting>, StoreError>;

    /// Saves every job independently: one failure never drops the others.
    /// Results are returned in input order.
    async fn save_batch(&self, jobs: &[NewJob]) -> Vec<Result<UpsertOutcome, StoreError>> {
        let mut results = Vec::with_capacity(jobs.len());
        for job in jobs {
            results.push(self.upsert_job(job).await);
        }
        results
    }
}

#[async_trait]
pub trait ResumeStore: Send + Sync {
    async fn find_resume(&self, id: Uuid) -> Result<Option<ResumeProfile>, StoreError>;
}
