use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::models::job::{JobPosting, NewJob};
use crate::models::resume::ResumeProfile;
use crate::storage::{JobFilter, JobStore, ResumeStore, StoreError, UpsertOutcome};

/// In-process job store with the same upsert semantics as `PgJobStore`.
/// Used for dry runs and tests.
#[derive(Default)]
pub struct MemoryJobStore {
    rows: Mutex<HashMap<String, JobPosting>>,
    failing: Mutex<HashSet<String>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later write of `job_id` fail with a backend error.
    pub fn fail_writes_for(&self, job_id: &str) {
        lock(&self.failing).insert(job_id.to_string());
    }

    pub fn len(&self) -> usize {
        lock(&self.rows).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn upsert_job(&self, job: &NewJob) -> Result<UpsertOutcome, StoreError> {
        if lock(&self.failing).contains(&job.job_id) {
            return Err(StoreError::Backend(format!("write rejected for {}", job.job_id)));
        }

        let now = Utc::now();
        let mut rows = lock(&self.rows);
        match rows.get(&job.job_id) {
            Some(existing) => {
                let row = job.to_posting(existing.id, existing.created_at, now);
                rows.insert(job.job_id.clone(), row);
                Ok(UpsertOutcome::Updated)
            }
            None => {
                rows.insert(job.job_id.clone(), job.to_posting(Uuid::new_v4(), now, now));
                Ok(UpsertOutcome::Created)
            }
        }
    }

    async fn find_job(&self, job_id: &str) -> Result<Option<JobPosting>, StoreError> {
        Ok(lock(&self.rows).get(job_id).cloned())
    }

    async fn list_active_jobs(&self, filter: &JobFilter) -> Result<Vec<JobPosting>, StoreError> {
        let mut jobs: Vec<JobPosting> = lock(&self.rows)
            .values()
            .filter(|job| filter.matches(job))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| {
            b.last_scraped
                .cmp(&a.last_scraped)
                .then_with(|| a.job_id.cmp(&b.job_id))
        });
        jobs.truncate(filter.limit);
        Ok(jobs)
    }
}

#[derive(Default)]
pub struct MemoryResumeStore {
    resumes: Mutex<HashMap<Uuid, ResumeProfile>>,
}

impl MemoryResumeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, resume: ResumeProfile) {
        lock(&self.resumes).insert(resume.id, resume);
    }
}

#[async_trait]
impl ResumeStore for MemoryResumeStore {
    async fn find_resume(&self, id: Uuid) -> Result<Option<ResumeProfile>, StoreError> {
        Ok(lock(&self.resumes).get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::JobDraft;

    fn new_job(job_id: &str, title: &str) -> NewJob {
        NewJob::try_from(JobDraft {
            job_id: Some(job_id.to_string()),
            title: Some(title.to_string()),
            organization: Some("FAO".to_string()),
            location: Some("Rome, Italy".to_string()),
            apply_url: Some(format!("https://www.fao.org/jobs/{job_id}")),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_upsert_updates_in_place() {
        let store = MemoryJobStore::new();
        let first = store.upsert_job(&new_job("FAO-1", "Statistician")).await.unwrap();
        let before = store.find_job("FAO-1").await.unwrap().unwrap();

        let second = store
            .upsert_job(&new_job("FAO-1", "Senior Statistician"))
            .await
            .unwrap();
        let after = store.find_job("FAO-1").await.unwrap().unwrap();

        assert_eq!(first, UpsertOutcome::Created);
        assert_eq!(second, UpsertOutcome::Updated);
        assert_eq!(store.len(), 1);
        assert_eq!(after.id, before.id);
        assert_eq!(after.created_at, before.created_at);
        assert_eq!(after.title, "Senior Statistician");
        assert!(after.last_scraped >= before.last_scraped);
    }

    #[tokio::test]
    async fn test_save_batch_isolates_failures() {
        let store = MemoryJobStore::new();
        store.fail_writes_for("FAO-2");
        let jobs = vec![new_job("FAO-1", "A"), new_job("FAO-2", "B"), new_job("FAO-3", "C")];

        let results = store.save_batch(&jobs).await;
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(StoreError::Backend(_))));
        assert!(results[2].is_ok());
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_list_active_jobs_filters() {
        let store = MemoryJobStore::new();
        store.upsert_job(&new_job("FAO-1", "A")).await.unwrap();
        let mut other = new_job("WHO-1", "B");
        other.organization = "WHO".to_string();
        other.location = Some("Geneva".to_string());
        store.upsert_job(&other).await.unwrap();

        let by_org = JobFilter {
            organization: Some("who".to_string()),
            ..Default::default()
        };
        let hits = store.list_active_jobs(&by_org).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].job_id, "WHO-1");

        let by_location = JobFilter {
            location: Some("rome".to_string()),
            ..Default::default()
        };
        let hits = store.list_active_jobs(&by_location).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].job_id, "FAO-1");

        let limited = JobFilter {
            limit: 1,
            ..Default::default()
        };
        assert_eq!(store.list_active_jobs(&limited).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_resume_lookup() {
        let store = MemoryResumeStore::new();
        let resume = ResumeProfile {
            id: Uuid::new_v4(),
            raw_text: "Economist".to_string(),
            ..Default::default()
        };
        store.insert(resume.clone());
        let found = store.find_resume(resume.id).await.unwrap().unwrap();
        assert_eq!(found.raw_text, "Economist");
        assert!(store.find_resume(Uuid::new_v4()).await.unwrap().is_none());
    }
}
