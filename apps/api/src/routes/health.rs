use axum::{extract::State, Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ServiceStatus {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    /// Registered site crawlers, whether or not they have run.
    pub crawlers: usize,
}

/// GET /health
/// Liveness only; crawler health lives under /api/v1/crawlers/health.
pub async fn health_handler(State(state): State<AppState>) -> Json<ServiceStatus> {
    Json(ServiceStatus {
        status: "ok",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        crawlers: state.crawlers.organizations().len(),
    })
}
