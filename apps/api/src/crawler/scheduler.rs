use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tracing::info;

use crate::crawler::health::HealthTracker;
use crate::crawler::metrics::{CrawlMetrics, CrawlStatus};
use crate::crawler::CrawlerRegistry;

/// Runs every registered crawler concurrently and records each outcome.
/// A crawler that is still busy from a previous cycle is waited on, not skipped.
pub async fn run_all(registry: &CrawlerRegistry, tracker: &HealthTracker) -> Vec<CrawlMetrics> {
    let crawlers = registry.all();
    info!("Running {} crawlers", crawlers.len());

    let results = join_all(crawlers.iter().map(|crawler| crawler.run())).await;
    for metrics in &results {
        tracker.record(metrics);
    }

    let succeeded = results
        .iter()
        .filter(|m| m.status != CrawlStatus::Failed)
        .count();
    let saved: usize = results.iter().map(|m| m.jobs_saved + m.jobs_updated).sum();
    info!(
        "Crawl cycle finished: {succeeded}/{} crawlers succeeded, {saved} jobs stored",
        results.len()
    );
    results
}

/// Starts the periodic crawl loop. The first cycle runs immediately.
pub fn spawn_schedule(
    registry: CrawlerRegistry,
    tracker: Arc<HealthTracker>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            run_all(&registry, &tracker).await;
        }
    })
}
