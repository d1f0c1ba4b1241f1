use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::CrawlerSettings;
use crate::crawler::metrics::{CrawlMetrics, CrawlStatus};
use crate::crawler::retry::RetryPolicy;
use crate::crawler::CrawlError;
use crate::extractors::SiteExtractor;
use crate::models::job::NewJob;
use crate::storage::JobStore;

/// Runs one site's extractor under a retry policy and a wall-clock budget, then
/// saves what it found. Runs of the same crawler never overlap.
pub struct Crawler {
    extractor: Arc<dyn SiteExtractor>,
    store: Arc<dyn JobStore>,
    policy: RetryPolicy,
    timeout: Duration,
    running: Mutex<()>,
}

impl Crawler {
    pub fn new(
        extractor: Arc<dyn SiteExtractor>,
        store: Arc<dyn JobStore>,
        policy: RetryPolicy,
        timeout: Duration,
    ) -> Self {
        Self {
            extractor,
            store,
            policy,
            timeout,
            running: Mutex::new(()),
        }
    }

    pub fn from_settings(
        extractor: Arc<dyn SiteExtractor>,
        store: Arc<dyn JobStore>,
        settings: &CrawlerSettings,
    ) -> Self {
        Self::new(
            extractor,
            store,
            RetryPolicy::new(
                settings.max_retries,
                Duration::from_secs(settings.retry_delay_secs),
            ),
            Duration::from_secs(settings.timeout_secs),
        )
    }

    pub fn organization(&self) -> &str {
        self.extractor.organization()
    }

    /// Runs now, or fails fast if a run is already in progress.
    pub async fn try_run(&self) -> Result<CrawlMetrics, CrawlError> {
        let _guard = self
            .running
            .try_lock()
            .map_err(|_| CrawlError::AlreadyRunning(self.organization().to_string()))?;
        Ok(self.execute().await)
    }

    /// Runs once the previous run (if any) has finished. Never errors: failures are
    /// reported through the returned metrics.
    pub async fn run(&self) -> CrawlMetrics {
        let _guard = self.running.lock().await;
        self.execute().await
    }

    async fn execute(&self) -> CrawlMetrics {
        let organization = self.organization().to_string();
        let mut metrics = CrawlMetrics::new(&organization);
        metrics.start(Utc::now());
        info!("Starting crawl for {organization}");

        let outcome = tokio::time::timeout(self.timeout, self.crawl_and_save(&mut metrics)).await;
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => metrics.fail(format!("Crawl failed with error: {e}")),
            Err(_) => metrics.fail(format!(
                "Crawl failed with error: {}",
                CrawlError::Timeout(self.timeout)
            )),
        }

        metrics.finish(Utc::now());
        let level_failed = metrics.status == CrawlStatus::Failed;
        let line = format!(
            "Crawl for {organization} completed in {:.2}s - Status: {}, Jobs: {} found, {} saved, {} updated, {} failed",
            metrics.duration_seconds(),
            metrics.status,
            metrics.jobs_found,
            metrics.jobs_saved,
            metrics.jobs_updated,
            metrics.jobs_failed,
        );
        if level_failed {
            warn!("{line}");
        } else {
            info!("{line}");
        }
        metrics
    }

    async fn crawl_and_save(&self, metrics: &mut CrawlMetrics) -> Result<(), CrawlError> {
        let attempts = self.policy.max_retries.max(1);
        let extractor = &self.extractor;

        let drafts = self
            .policy
            .run(
                || extractor.crawl(),
                |attempt, e| {
                    metrics.retry_count += 1;
                    let message = format!("Attempt {}/{attempts} failed: {e}", attempt + 1);
                    warn!("{}: {message}", extractor.organization());
                    metrics.push_error(message);
                },
            )
            .await?;

        metrics.jobs_found = drafts.len();
        if drafts.is_empty() {
            warn!("No jobs found during crawl for {}", self.organization());
            metrics.settle();
            return Ok(());
        }

        let mut valid = Vec::with_capacity(drafts.len());
        for mut draft in drafts {
            if draft.organization.as_deref().map_or(true, |o| o.trim().is_empty()) {
                draft.organization = Some(self.organization().to_string());
            }
            let label = draft.title.clone().unwrap_or_else(|| "Unknown".to_string());
            match NewJob::try_from(draft) {
                Ok(job) => valid.push(job),
                Err(e) => metrics.record_failed(format!("Failed to save job {label}: {e}")),
            }
        }

        let results = self.store.save_batch(&valid).await;
        for (job, result) in valid.iter().zip(results) {
            match result {
                Ok(outcome) => metrics.record_saved(outcome),
                Err(e) => {
                    warn!("Failed to save job {} ({}): {e}", job.title, job.job_id);
                    metrics.record_failed(format!("Failed to save job {}: {e}", job.title));
                }
            }
        }

        info!(
            "Save results for {}: {} new, {} updated, {} failed",
            self.organization(),
            metrics.jobs_saved,
            metrics.jobs_updated,
            metrics.jobs_failed
        );
        metrics.settle();
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use crate::extractors::{CrawlLimits, ListingElement};
    use crate::models::job::JobDraft;
    use crate::storage::memory::MemoryJobStore;

    /// Extractor whose `crawl` fails a fixed number of times, then returns `jobs`.
    pub(crate) struct ScriptedExtractor {
        pub organization: &'static str,
        pub failures_before_success: u32,
        pub jobs: Vec<JobDraft>,
        pub stall: Option<Duration>,
        pub calls: AtomicU32,
    }

    impl ScriptedExtractor {
        pub(crate) fn new(organization: &'static str, jobs: Vec<JobDraft>) -> Self {
            Self {
                organization,
                failures_before_success: 0,
                jobs,
                stall: None,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl SiteExtractor for ScriptedExtractor {
        fn organization(&self) -> &str {
            self.organization
        }

        fn limits(&self) -> CrawlLimits {
            CrawlLimits::default()
        }

        async fn fetch_listing(&self, _page: u32) -> Result<Vec<ListingElement>, CrawlError> {
            Ok(Vec::new())
        }

        fn parse_element(&self, _element: &ListingElement) -> Option<JobDraft> {
            None
        }

        async fn crawl(&self) -> Result<Vec<JobDraft>, CrawlError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(stall) = self.stall {
                tokio::time::sleep(stall).await;
            }
            if call < self.failures_before_success {
                return Err(CrawlError::Status {
                    url: format!("https://example.org/{}", self.organization),
                    status: 503,
                });
            }
            Ok(self.jobs.clone())
        }
    }

    pub(crate) fn draft(n: u32) -> JobDraft {
        JobDraft {
            job_id: Some(format!("UN-{n}")),
            title: Some(format!("Programme Officer {n}")),
            apply_url: Some(format!("https://careers.un.org/jobopening/{n}")),
            ..Default::default()
        }
    }

    fn crawler(extractor: ScriptedExtractor, store: Arc<MemoryJobStore>) -> Crawler {
        Crawler::new(
            Arc::new(extractor),
            store,
            RetryPolicy::new(3, Duration::from_secs(5)),
            Duration::from_secs(300),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_fails_twice_then_succeeds() {
        let store = Arc::new(MemoryJobStore::new());
        let mut extractor = ScriptedExtractor::new("UN", (1..=5).map(draft).collect());
        extractor.failures_before_success = 2;

        let metrics = crawler(extractor, store.clone()).run().await;
        assert_eq!(metrics.status, CrawlStatus::Success);
        assert_eq!(metrics.retry_count, 2);
        assert_eq!(metrics.jobs_found, 5);
        assert_eq!(metrics.jobs_saved, 5);
        assert_eq!(metrics.jobs_failed, 0);
        assert_eq!(store.len(), 5);
    }

    #[tokio::test]
    async fn test_two_failed_saves_make_partial_success() {
        let store = Arc::new(MemoryJobStore::new());
        store.fail_writes_for("UN-2");
        store.fail_writes_for("UN-4");
        let extractor = ScriptedExtractor::new("UN", (1..=5).map(draft).collect());

        let metrics = crawler(extractor, store.clone()).run().await;
        assert_eq!(metrics.status, CrawlStatus::PartialSuccess);
        assert_eq!(metrics.jobs_saved + metrics.jobs_updated, 3);
        assert_eq!(metrics.jobs_failed, 2);
        assert_eq!(metrics.errors.len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_drafts_count_as_failed() {
        let store = Arc::new(MemoryJobStore::new());
        let mut broken = draft(9);
        broken.apply_url = Some("javascript:void(0)".to_string());
        let extractor = ScriptedExtractor::new("UN", vec![draft(1), broken]);

        let metrics = crawler(extractor, store).run().await;
        assert_eq!(metrics.status, CrawlStatus::PartialSuccess);
        assert_eq!(metrics.jobs_saved, 1);
        assert_eq!(metrics.jobs_failed, 1);
    }

    #[tokio::test]
    async fn test_zero_jobs_is_success() {
        let store = Arc::new(MemoryJobStore::new());
        let metrics = crawler(ScriptedExtractor::new("WHO", Vec::new()), store).run().await;
        assert_eq!(metrics.status, CrawlStatus::Success);
        assert_eq!(metrics.jobs_found, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_fail_the_run() {
        let store = Arc::new(MemoryJobStore::new());
        let mut extractor = ScriptedExtractor::new("FAO", vec![draft(1)]);
        extractor.failures_before_success = 10;

        let metrics = crawler(extractor, store.clone()).run().await;
        assert_eq!(metrics.status, CrawlStatus::Failed);
        assert_eq!(metrics.retry_count, 3);
        assert!(metrics
            .errors
            .last()
            .is_some_and(|e| e.starts_with("Crawl failed with error")));
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fails_the_run() {
        let store = Arc::new(MemoryJobStore::new());
        let mut extractor = ScriptedExtractor::new("ILO", vec![draft(1)]);
        extractor.stall = Some(Duration::from_secs(600));

        let metrics = crawler(extractor, store.clone()).run().await;
        assert_eq!(metrics.status, CrawlStatus::Failed);
        assert!(metrics.errors.iter().any(|e| e.contains("300s budget")));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_rerun_updates_without_new_rows() {
        let store = Arc::new(MemoryJobStore::new());
        let c = crawler(ScriptedExtractor::new("UN", (1..=3).map(draft).collect()), store.clone());

        let first = c.run().await;
        let second = c.run().await;
        assert_eq!(first.jobs_saved, 3);
        assert_eq!(second.jobs_saved, 0);
        assert_eq!(second.jobs_updated, 3);
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn test_organization_defaults_to_site() {
        let store = Arc::new(MemoryJobStore::new());
        crawler(ScriptedExtractor::new("UNICEF", vec![draft(1)]), store.clone())
            .run()
            .await;
        let job = store.find_job("UN-1").await.unwrap().unwrap();
        assert_eq!(job.organization, "UNICEF");
    }
}
