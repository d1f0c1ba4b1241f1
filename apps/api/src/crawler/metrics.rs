use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::UpsertOutcome;

/// Oldest errors are dropped past this many.
pub const MAX_RECORDED_ERRORS: usize = 20;
/// Errors included in a run summary.
pub const SUMMARY_ERRORS: usize = 10;

/// `idle → running → {success | partial_success | failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlStatus {
    Idle,
    Running,
    Success,
    PartialSuccess,
    Failed,
}

impl CrawlStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CrawlStatus::Idle => "idle",
            CrawlStatus::Running => "running",
            CrawlStatus::Success => "success",
            CrawlStatus::PartialSuccess => "partial_success",
            CrawlStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CrawlStatus::Success | CrawlStatus::PartialSuccess | CrawlStatus::Failed
        )
    }
}

impl fmt::Display for CrawlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one crawl execution.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlMetrics {
    pub organization: String,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub jobs_found: usize,
    pub jobs_saved: usize,
    pub jobs_updated: usize,
    pub jobs_failed: usize,
    pub status: CrawlStatus,
    pub retry_count: u32,
    pub errors: Vec<String>,
}

impl CrawlMetrics {
    pub fn new(organization: impl Into<String>) -> Self {
        Self {
            organization: organization.into(),
            started_at: None,
            finished_at: None,
            jobs_found: 0,
            jobs_saved: 0,
            jobs_updated: 0,
            jobs_failed: 0,
            status: CrawlStatus::Idle,
            retry_count: 0,
            errors: Vec::new(),
        }
    }

    pub fn start(&mut self, now: DateTime<Utc>) {
        self.started_at = Some(now);
        self.status = CrawlStatus::Running;
    }

    pub fn push_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
        if self.errors.len() > MAX_RECORDED_ERRORS {
            let excess = self.errors.len() - MAX_RECORDED_ERRORS;
            self.errors.drain(..excess);
        }
    }

    pub fn record_saved(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Created => self.jobs_saved += 1,
            UpsertOutcome::Updated => self.jobs_updated += 1,
        }
    }

    pub fn record_failed(&mut self, message: impl Into<String>) {
        self.jobs_failed += 1;
        self.push_error(message);
    }

    /// Status after extraction succeeded: any failed job makes the run partial.
    pub fn settle(&mut self) {
        self.status = if self.jobs_failed == 0 {
            CrawlStatus::Success
        } else {
            CrawlStatus::PartialSuccess
        };
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = CrawlStatus::Failed;
        self.push_error(message);
    }

    pub fn finish(&mut self, now: DateTime<Utc>) {
        self.finished_at = Some(now);
    }

    pub fn duration_seconds(&self) -> f64 {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => (end - start).num_milliseconds().max(0) as f64 / 1000.0,
            _ => 0.0,
        }
    }

    /// Percentage of found jobs that were stored. 0.0 when nothing was found.
    pub fn success_rate(&self) -> f64 {
        if self.jobs_found == 0 {
            return 0.0;
        }
        (self.jobs_saved + self.jobs_updated) as f64 / self.jobs_found as f64 * 100.0
    }

    pub fn summary(&self) -> CrawlSummary {
        CrawlSummary {
            organization: self.organization.clone(),
            start_time: self.started_at,
            end_time: self.finished_at,
            duration_seconds: self.duration_seconds(),
            jobs_found: self.jobs_found,
            jobs_saved: self.jobs_saved,
            jobs_updated: self.jobs_updated,
            jobs_failed: self.jobs_failed,
            success_rate: self.success_rate(),
            status: self.status,
            retry_count: self.retry_count,
            errors: self.errors.iter().take(SUMMARY_ERRORS).cloned().collect(),
        }
    }
}

/// Caller-facing run report: status and counts, never traces.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlSummary {
    pub organization: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_seconds: f64,
    pub jobs_found: usize,
    pub jobs_saved: usize,
    pub jobs_updated: usize,
    pub jobs_failed: usize,
    pub success_rate: f64,
    pub status: CrawlStatus,
    pub retry_count: u32,
    pub errors: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_errors_are_bounded() {
        let mut m = CrawlMetrics::new("UN");
        for i in 0..25 {
            m.push_error(format!("error {i}"));
        }
        assert_eq!(m.errors.len(), MAX_RECORDED_ERRORS);
        assert_eq!(m.errors.first().map(String::as_str), Some("error 5"));
        assert_eq!(m.summary().errors.len(), SUMMARY_ERRORS);
    }

    #[test]
    fn test_settle_partial_when_any_job_failed() {
        let mut m = CrawlMetrics::new("UN");
        m.jobs_found = 3;
        m.record_saved(UpsertOutcome::Created);
        m.record_saved(UpsertOutcome::Updated);
        m.record_failed("bad row");
        m.settle();
        assert_eq!(m.status, CrawlStatus::PartialSuccess);
        assert!((m.success_rate() - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_duration_and_status_serialization() {
        let start = Utc::now();
        let mut m = CrawlMetrics::new("WHO");
        m.start(start);
        assert_eq!(m.status, CrawlStatus::Running);
        m.settle();
        m.finish(start + Duration::milliseconds(2500));

        let summary = m.summary();
        assert_eq!(summary.duration_seconds, 2.5);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(
            serde_json::to_value(CrawlStatus::PartialSuccess).unwrap(),
            "partial_success"
        );
    }
}
