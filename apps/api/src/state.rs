use std::sync::Arc;

use crate::crawler::health::HealthTracker;
use crate::crawler::CrawlerRegistry;
use crate::matching::matcher::JobMatcher;
use crate::storage::{JobStore, ResumeStore};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<dyn JobStore>,
    pub resumes: Arc<dyn ResumeStore>,
    /// Pluggable matcher. Default: KeywordJobMatcher over the match cache.
    pub matcher: Arc<dyn JobMatcher>,
    pub crawlers: CrawlerRegistry,
    /// Shared with the background scheduler, when one is running.
    pub health: Arc<HealthTracker>,
}
