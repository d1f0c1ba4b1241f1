//! Crawl orchestration: the per-site run harness, retry policy, run metrics,
//! health aggregation and multi-site scheduling.

pub mod handlers;
pub mod harness;
pub mod health;
pub mod metrics;
pub mod retry;
pub mod scheduler;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::crawler::harness::Crawler;

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("could not parse {url}: {message}")]
    Parse { url: String, message: String },

    #[error("invalid selector '{0}'")]
    Selector(String),

    #[error("HTTP client setup failed: {0}")]
    Client(#[from] reqwest::Error),

    #[error("crawl exceeded its {}s budget", .0.as_secs())]
    Timeout(Duration),

    #[error("a crawl for {0} is already running")]
    AlreadyRunning(String),

    #[error("no crawler registered for '{0}'")]
    UnknownOrganization(String),
}

/// Every configured site crawler, keyed by organization code.
#[derive(Clone, Default)]
pub struct CrawlerRegistry {
    crawlers: BTreeMap<String, Arc<Crawler>>,
}

impl CrawlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, crawler: Crawler) {
        self.crawlers
            .insert(crawler.organization().to_uppercase(), Arc::new(crawler));
    }

    /// Case-insensitive lookup.
    pub fn get(&self, organization: &str) -> Result<Arc<Crawler>, CrawlError> {
        self.crawlers
            .get(&organization.to_uppercase())
            .cloned()
            .ok_or_else(|| CrawlError::UnknownOrganization(organization.to_string()))
    }

    pub fn organizations(&self) -> Vec<String> {
        self.crawlers.keys().cloned().collect()
    }

    pub fn all(&self) -> Vec<Arc<Crawler>> {
        self.crawlers.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.crawlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.crawlers.is_empty()
    }
}
