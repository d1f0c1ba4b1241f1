//! Rolling per-organization crawler health, recomputed on demand from recorded runs.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::crawler::metrics::{CrawlMetrics, CrawlStatus};

const RECENT_ERRORS_KEPT: usize = 20;
const CRITICAL_HOURS: f64 = 48.0;
const WARNING_HOURS: f64 = 24.0;
const CRITICAL_SUCCESS_RATE: f64 = 50.0;
const WARNING_SUCCESS_RATE: f64 = 80.0;
const WARNING_ERROR_COUNT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlerHealth {
    Unknown,
    Healthy,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Healthy,
    Info,
    Warning,
    Critical,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthCheck {
    pub check: &'static str,
    pub status: CheckStatus,
    pub message: String,
}

/// Aggregate over every recorded run of one organization.
#[derive(Debug, Clone, Default, PartialEq)]
struct CrawlerStats {
    total_runs: u32,
    successful_runs: u32,
    failed_runs: u32,
    last_run: Option<DateTime<Utc>>,
    last_success: Option<DateTime<Utc>>,
    total_jobs_found: usize,
    total_jobs_saved: usize,
    average_duration: f64,
    recent_errors: VecDeque<String>,
}

impl CrawlerStats {
    /// Only fully successful runs count towards the success rate.
    fn success_rate(&self) -> f64 {
        if self.total_runs == 0 {
            return 0.0;
        }
        self.successful_runs as f64 / self.total_runs as f64 * 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthStats {
    pub total_runs: u32,
    pub successful_runs: u32,
    pub failed_runs: u32,
    pub success_rate: f64,
    pub last_run: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub average_duration: f64,
    pub total_jobs_found: usize,
    pub total_jobs_saved: usize,
    pub recent_errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub organization: String,
    pub health: CrawlerHealth,
    pub checks: Vec<HealthCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<HealthStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverallHealth {
    pub status: CrawlerHealth,
    pub message: String,
    pub crawler_count: usize,
    pub healthy_count: usize,
    pub warning_count: usize,
    pub critical_count: usize,
    pub unknown_count: usize,
    pub last_check: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct TrackerState {
    stats: BTreeMap<String, CrawlerStats>,
    last_update: Option<DateTime<Utc>>,
}

/// Shared, in-process aggregation of crawl metrics.
#[derive(Default)]
pub struct HealthTracker {
    state: Mutex<TrackerState>,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record(&self, metrics: &CrawlMetrics) {
        let now = Utc::now();
        let mut state = self.lock();
        let stats = state.stats.entry(metrics.organization.clone()).or_default();

        stats.total_runs += 1;
        let ended = metrics.finished_at.or(metrics.started_at).unwrap_or(now);
        stats.last_run = Some(ended);

        match metrics.status {
            CrawlStatus::Success => {
                stats.successful_runs += 1;
                stats.last_success = Some(ended);
            }
            CrawlStatus::Failed => stats.failed_runs += 1,
            _ => {}
        }

        stats.total_jobs_found += metrics.jobs_found;
        stats.total_jobs_saved += metrics.jobs_saved;

        let runs = stats.total_runs as f64;
        stats.average_duration =
            (stats.average_duration * (runs - 1.0) + metrics.duration_seconds()) / runs;

        stats.recent_errors.extend(metrics.errors.iter().cloned());
        while stats.recent_errors.len() > RECENT_ERRORS_KEPT {
            stats.recent_errors.pop_front();
        }

        state.last_update = Some(now);
    }

    pub fn report(&self, organization: &str) -> HealthReport {
        self.report_at(organization, Utc::now())
    }

    pub fn report_at(&self, organization: &str, now: DateTime<Utc>) -> HealthReport {
        let state = self.lock();
        match state.stats.get(organization) {
            Some(stats) => classify(organization, stats, now),
            None => HealthReport {
                organization: organization.to_string(),
                health: CrawlerHealth::Unknown,
                checks: vec![HealthCheck {
                    check: "last_run",
                    status: CheckStatus::Unknown,
                    message: "No data available".to_string(),
                }],
                stats: None,
            },
        }
    }

    /// Reports for `organizations`, in order. Organizations without runs report unknown.
    pub fn reports(&self, organizations: &[String]) -> Vec<HealthReport> {
        let now = Utc::now();
        organizations
            .iter()
            .map(|org| self.report_at(org, now))
            .collect()
    }

    /// When a run was last recorded.
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.lock().last_update
    }

    pub fn overall(&self, reports: &[HealthReport]) -> OverallHealth {
        summarize(reports, self.last_update())
    }
}

fn classify(organization: &str, stats: &CrawlerStats, now: DateTime<Utc>) -> HealthReport {
    let mut health = CrawlerHealth::Healthy;
    let mut checks = Vec::with_capacity(3);

    let mut escalate = |to: CrawlerHealth| {
        if to > health {
            health = to;
        }
    };

    match stats.last_run {
        Some(last_run) => {
            let hours = (now - last_run).num_seconds() as f64 / 3600.0;
            let (status, message) = if hours > CRITICAL_HOURS {
                escalate(CrawlerHealth::Critical);
                (CheckStatus::Critical, format!("No run in {hours:.1} hours"))
            } else if hours > WARNING_HOURS {
                escalate(CrawlerHealth::Warning);
                (CheckStatus::Warning, format!("No run in {hours:.1} hours"))
            } else {
                (CheckStatus::Healthy, format!("Last run {hours:.1} hours ago"))
            };
            checks.push(HealthCheck {
                check: "last_run",
                status,
                message,
            });
        }
        None => checks.push(HealthCheck {
            check: "last_run",
            status: CheckStatus::Unknown,
            message: "Never run".to_string(),
        }),
    }

    if stats.total_runs > 0 {
        let rate = stats.success_rate();
        let status = if rate < CRITICAL_SUCCESS_RATE {
            escalate(CrawlerHealth::Critical);
            CheckStatus::Critical
        } else if rate < WARNING_SUCCESS_RATE {
            escalate(CrawlerHealth::Warning);
            CheckStatus::Warning
        } else {
            CheckStatus::Healthy
        };
        checks.push(HealthCheck {
            check: "success_rate",
            status,
            message: format!("Success rate: {rate:.1}%"),
        });
    }

    let error_count = stats.recent_errors.len();
    let (status, message) = if error_count > WARNING_ERROR_COUNT {
        escalate(CrawlerHealth::Warning);
        (CheckStatus::Warning, format!("{error_count} recent errors"))
    } else if error_count > 0 {
        (CheckStatus::Info, format!("{error_count} recent errors"))
    } else {
        (CheckStatus::Healthy, "No recent errors".to_string())
    };
    checks.push(HealthCheck {
        check: "errors",
        status,
        message,
    });

    if stats.last_run.is_none() {
        health = CrawlerHealth::Unknown;
    }

    HealthReport {
        organization: organization.to_string(),
        health,
        checks,
        stats: Some(HealthStats {
            total_runs: stats.total_runs,
            successful_runs: stats.successful_runs,
            failed_runs: stats.failed_runs,
            success_rate: stats.success_rate(),
            last_run: stats.last_run,
            last_success: stats.last_success,
            average_duration: stats.average_duration,
            total_jobs_found: stats.total_jobs_found,
            total_jobs_saved: stats.total_jobs_saved,
            recent_errors: stats.recent_errors.iter().cloned().collect(),
        }),
    }
}

/// Worst individual health wins: critical > warning > healthy > unknown.
fn summarize(reports: &[HealthReport], last_check: Option<DateTime<Utc>>) -> OverallHealth {
    let count = |h: CrawlerHealth| reports.iter().filter(|r| r.health == h).count();
    let status = reports
        .iter()
        .map(|r| r.health)
        .max()
        .unwrap_or(CrawlerHealth::Unknown);

    let message = if reports.is_empty() {
        "No crawler data available".to_string()
    } else {
        format!("{} crawlers monitored", reports.len())
    };

    OverallHealth {
        status,
        message,
        crawler_count: reports.len(),
        healthy_count: count(CrawlerHealth::Healthy),
        warning_count: count(CrawlerHealth::Warning),
        critical_count: count(CrawlerHealth::Critical),
        unknown_count: count(CrawlerHealth::Unknown),
        last_check,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn run(org: &str, status: CrawlStatus, ended: DateTime<Utc>, errors: usize) -> CrawlMetrics {
        let mut m = CrawlMetrics::new(org);
        m.start(ended - Duration::seconds(30));
        m.status = status;
        m.jobs_found = 4;
        m.jobs_saved = 4;
        for i in 0..errors {
            m.push_error(format!("error {i}"));
        }
        m.finish(ended);
        m
    }

    #[test]
    fn test_unknown_without_history() {
        let tracker = HealthTracker::new();
        let report = tracker.report("UN");
        assert_eq!(report.health, CrawlerHealth::Unknown);
        assert!(report.stats.is_none());
        let reports = tracker.reports(&["UN".to_string()]);
        assert_eq!(tracker.overall(&reports).status, CrawlerHealth::Unknown);
    }

    #[test]
    fn test_stale_last_run_is_critical() {
        let now = Utc::now();
        let tracker = HealthTracker::new();
        tracker.record(&run("UN", CrawlStatus::Success, now - Duration::hours(50), 0));

        let report = tracker.report_at("UN", now);
        assert_eq!(report.health, CrawlerHealth::Critical);
        assert_eq!(report.checks[0].status, CheckStatus::Critical);
    }

    #[test]
    fn test_recent_run_with_high_success_rate_is_healthy() {
        let now = Utc::now();
        let ended = now - Duration::hours(10);
        let tracker = HealthTracker::new();
        for i in 0..10 {
            let status = if i == 0 { CrawlStatus::Failed } else { CrawlStatus::Success };
            tracker.record(&run("WHO", status, ended, usize::from(i == 0)));
        }

        let report = tracker.report_at("WHO", now);
        assert_eq!(report.health, CrawlerHealth::Healthy);
        let stats = report.stats.unwrap();
        assert_eq!(stats.success_rate, 90.0);
        assert_eq!(stats.failed_runs, 1);
        assert_eq!(stats.total_jobs_found, 40);
    }

    #[test]
    fn test_warning_thresholds() {
        let now = Utc::now();
        let tracker = HealthTracker::new();
        tracker.record(&run("FAO", CrawlStatus::Success, now - Duration::hours(30), 0));
        assert_eq!(tracker.report_at("FAO", now).health, CrawlerHealth::Warning);

        // 3 of 4 runs successful: 75%
        let tracker = HealthTracker::new();
        for status in [
            CrawlStatus::Success,
            CrawlStatus::Success,
            CrawlStatus::PartialSuccess,
            CrawlStatus::Success,
        ] {
            tracker.record(&run("ILO", status, now - Duration::hours(1), 0));
        }
        assert_eq!(tracker.report_at("ILO", now).health, CrawlerHealth::Warning);

        let tracker = HealthTracker::new();
        tracker.record(&run("UNOPS", CrawlStatus::Success, now - Duration::hours(1), 12));
        let report = tracker.report_at("UNOPS", now);
        assert_eq!(report.health, CrawlerHealth::Warning);
        assert_eq!(report.checks[2].message, "12 recent errors");
    }

    #[test]
    fn test_low_success_rate_is_critical() {
        let now = Utc::now();
        let tracker = HealthTracker::new();
        tracker.record(&run("UNDP", CrawlStatus::Failed, now - Duration::hours(1), 1));
        tracker.record(&run("UNDP", CrawlStatus::Success, now - Duration::hours(1), 0));
        tracker.record(&run("UNDP", CrawlStatus::Failed, now - Duration::hours(1), 1));
        assert_eq!(tracker.report_at("UNDP", now).health, CrawlerHealth::Critical);
    }

    #[test]
    fn test_recent_errors_are_capped() {
        let tracker = HealthTracker::new();
        for _ in 0..3 {
            tracker.record(&run("UN", CrawlStatus::PartialSuccess, Utc::now(), 10));
        }
        let stats = tracker.report("UN").stats.unwrap();
        assert_eq!(stats.recent_errors.len(), RECENT_ERRORS_KEPT);
    }

    #[test]
    fn test_overall_takes_worst() {
        let now = Utc::now();
        let tracker = HealthTracker::new();
        tracker.record(&run("UN", CrawlStatus::Success, now, 0));
        tracker.record(&run("WHO", CrawlStatus::Failed, now, 1));

        let reports = tracker.reports(&["UN".to_string(), "WHO".to_string()]);
        let overall = tracker.overall(&reports);
        assert_eq!(overall.status, CrawlerHealth::Critical);
        assert_eq!(overall.crawler_count, 2);
        assert_eq!(overall.healthy_count, 1);
        assert_eq!(overall.critical_count, 1);
        assert!(overall.last_check.is_some());
    }
}
