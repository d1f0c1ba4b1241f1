use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::crawler::CrawlError;
use crate::storage::StoreError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Crawl error: {0}")]
    Crawl(#[from] CrawlError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Store(StoreError::Conflict(msg)) => {
                (StatusCode::CONFLICT, "CONFLICT", msg.clone())
            }
            AppError::Store(e) => {
                tracing::error!("Storage error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR",
                    "A storage error occurred".to_string(),
                )
            }
            AppError::Crawl(CrawlError::UnknownOrganization(org)) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("No crawler registered for '{org}'"),
            ),
            AppError::Crawl(CrawlError::AlreadyRunning(org)) => (
                StatusCode::CONFLICT,
                "CONFLICT",
                format!("A crawl for {org} is already running"),
            ),
            AppError::Crawl(e) => {
                tracing::error!("Crawl error: {e}");
                (
                    StatusCode::BAD_GATEWAY,
                    "CRAWL_ERROR",
                    "The crawler could not complete the request".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
