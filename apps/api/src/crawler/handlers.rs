//! Axum route handlers for crawler health and on-demand runs.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use tracing::info;

use crate::crawler::health::{HealthReport, OverallHealth};
use crate::crawler::metrics::CrawlSummary;
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CrawlerHealthResponse {
    pub overall: OverallHealth,
    pub crawlers: Vec<HealthReport>,
}

/// GET /api/v1/crawlers/health
/// Every registered crawler, including those that have never run.
pub async fn handle_crawler_health(State(state): State<AppState>) -> Json<CrawlerHealthResponse> {
    let crawlers = state.health.reports(&state.crawlers.organizations());
    let overall = state.health.overall(&crawlers);

    Json(CrawlerHealthResponse { overall, crawlers })
}

/// GET /api/v1/crawlers/:org/health
pub async fn handle_organization_health(
    State(state): State<AppState>,
    Path(organization): Path<String>,
) -> Result<Json<HealthReport>, AppError> {
    let crawler = state.crawlers.get(&organization)?;
    Ok(Json(state.health.report(crawler.organization())))
}

/// POST /api/v1/crawlers/:org/run
/// Runs the crawler to completion and returns its summary. 409 if it is already running.
pub async fn handle_run_crawler(
    State(state): State<AppState>,
    Path(organization): Path<String>,
) -> Result<Json<CrawlSummary>, AppError> {
    let crawler = state.crawlers.get(&organization)?;
    info!("Manual crawl requested for {}", crawler.organization());

    let metrics = crawler.try_run().await?;
    state.health.record(&metrics);
    Ok(Json(metrics.summary()))
}
