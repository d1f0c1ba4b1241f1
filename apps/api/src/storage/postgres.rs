use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{Connection, PgConnection, PgPool, Postgres, Transaction};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::job::{JobPosting, NewJob};
use crate::models::resume::ResumeProfile;
use crate::storage::{
    JobFilter, JobStore, ResumeStore, StoreError, UpsertOutcome, BATCH_COMMIT_SIZE,
};

const JOB_COLUMNS: &str = "id, job_id, title, organization, description, responsibilities, \
    qualifications, category, grade, contract_type, location, duty_station, remote_eligible, \
    language_requirements, education_level, years_of_experience, apply_url, deadline, \
    posted_date, source_url, is_active, created_at, updated_at, last_scraped";

type Outcome = Result<UpsertOutcome, StoreError>;

pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn upsert_job(&self, job: &NewJob) -> Result<UpsertOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;
        let outcome = upsert_on(&mut tx, job).await.map_err(|e| map_write_error(e, job))?;
        tx.commit().await?;
        Ok(outcome)
    }

    async fn find_job(&self, job_id: &str) -> Result<Option<JobPosting>, StoreError> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE job_id = $1");
        let job = sqlx::query_as::<_, JobPosting>(&sql)
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(job)
    }

    async fn list_active_jobs(&self, filter: &JobFilter) -> Result<Vec<JobPosting>, StoreError> {
        let sql = format!(
            r#"
            SELECT {JOB_COLUMNS} FROM jobs
            WHERE is_active
              AND ($1::text IS NULL OR lower(organization) = lower($1))
              AND ($2::text IS NULL
                   OR location ILIKE '%' || $2 || '%'
                   OR duty_station ILIKE '%' || $2 || '%')
            ORDER BY last_scraped DESC, job_id
            LIMIT $3
            "#
        );
        let jobs = sqlx::query_as::<_, JobPosting>(&sql)
            .bind(filter.organization.as_deref())
            .bind(filter.location.as_deref())
            .bind(filter.limit as i64)
            .fetch_all(&self.pool)
            .await?;
        Ok(jobs)
    }

    /// One savepoint per job inside a transaction that is committed after every
    /// `BATCH_COMMIT_SIZE` successful upserts. A failing job rolls back only its savepoint.
    async fn save_batch(&self, jobs: &[NewJob]) -> Vec<Outcome> {
        let mut results: Vec<Outcome> = Vec::with_capacity(jobs.len());
        let mut pending: Vec<Outcome> = Vec::new();
        let mut tx: Option<Transaction<'_, Postgres>> = None;
        let mut uncommitted = 0usize;

        for job in jobs {
            if tx.is_none() {
                match self.pool.begin().await {
                    Ok(open) => tx = Some(open),
                    Err(e) => {
                        warn!("Could not open transaction for {}: {e}", job.job_id);
                        results.push(Err(StoreError::Database(e)));
                        continue;
                    }
                }
            }
            let Some(open) = tx.as_mut() else {
                continue;
            };

            let outcome = upsert_in_savepoint(open, job).await;
            if outcome.is_ok() {
                uncommitted += 1;
            }
            pending.push(outcome);

            if uncommitted >= BATCH_COMMIT_SIZE {
                if let Some(open) = tx.take() {
                    flush(open, &mut pending, &mut results).await;
                }
                uncommitted = 0;
            }
        }

        if let Some(open) = tx.take() {
            flush(open, &mut pending, &mut results).await;
        }
        results
    }
}

async fn upsert_in_savepoint(tx: &mut Transaction<'_, Postgres>, job: &NewJob) -> Outcome {
    let mut savepoint = Connection::begin(&mut **tx).await?;
    match upsert_on(&mut savepoint, job).await {
        Ok(outcome) => {
            savepoint.commit().await?;
            Ok(outcome)
        }
        Err(e) => {
            if let Err(rollback) = savepoint.rollback().await {
                warn!("Savepoint rollback failed for {}: {rollback}", job.job_id);
            }
            Err(map_write_error(e, job))
        }
    }
}

/// Commits a chunk. If the commit fails, every job in the chunk is reported failed.
async fn flush(tx: Transaction<'_, Postgres>, pending: &mut Vec<Outcome>, results: &mut Vec<Outcome>) {
    match tx.commit().await {
        Ok(()) => {
            debug!("Committed {} job writes", pending.len());
            results.append(pending);
        }
        Err(e) => {
            warn!("Batch commit failed, {} job writes lost: {e}", pending.len());
            let reason = e.to_string();
            results.extend(pending.drain(..).map(|outcome| {
                outcome.and_then(|_| Err(StoreError::Backend(format!("commit failed: {reason}"))))
            }));
        }
    }
}

/// Existence check by `job_id`, then UPDATE or INSERT.
async fn upsert_on(conn: &mut PgConnection, job: &NewJob) -> Result<UpsertOutcome, sqlx::Error> {
    let existing: Option<Uuid> = sqlx::query_scalar("SELECT id FROM jobs WHERE job_id = $1")
        .bind(&job.job_id)
        .fetch_optional(&mut *conn)
        .await?;

    let education = job.education_level.map(|e| e.label());

    if existing.is_some() {
        sqlx::query(
            r#"
            UPDATE jobs SET
                title = $2, organization = $3, description = $4, responsibilities = $5,
                qualifications = $6, category = $7, grade = $8, contract_type = $9,
                location = $10, duty_station = $11, remote_eligible = $12,
                language_requirements = $13, education_level = $14, years_of_experience = $15,
                apply_url = $16, deadline = $17, posted_date = $18, source_url = $19,
                is_active = TRUE, updated_at = now(), last_scraped = now()
            WHERE job_id = $1
            "#,
        )
        .bind(&job.job_id)
        .bind(&job.title)
        .bind(&job.organization)
        .bind(&job.description)
        .bind(&job.responsibilities)
        .bind(&job.qualifications)
        .bind(&job.category)
        .bind(&job.grade)
        .bind(&job.contract_type)
        .bind(&job.location)
        .bind(&job.duty_station)
        .bind(job.remote_eligible)
        .bind(Json(&job.language_requirements))
        .bind(education)
        .bind(job.years_of_experience)
        .bind(&job.apply_url)
        .bind(job.deadline)
        .bind(job.posted_date)
        .bind(&job.source_url)
        .execute(&mut *conn)
        .await?;

        debug!("Updated job {}", job.job_id);
        return Ok(UpsertOutcome::Updated);
    }

    sqlx::query(
        r#"
        INSERT INTO jobs
            (id, job_id, title, organization, description, responsibilities, qualifications,
             category, grade, contract_type, location, duty_station, remote_eligible,
             language_requirements, education_level, years_of_experience, apply_url,
             deadline, posted_date, source_url)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&job.job_id)
    .bind(&job.title)
    .bind(&job.organization)
    .bind(&job.description)
    .bind(&job.responsibilities)
    .bind(&job.qualifications)
    .bind(&job.category)
    .bind(&job.grade)
    .bind(&job.contract_type)
    .bind(&job.location)
    .bind(&job.duty_station)
    .bind(job.remote_eligible)
    .bind(Json(&job.language_requirements))
    .bind(education)
    .bind(job.years_of_experience)
    .bind(&job.apply_url)
    .bind(job.deadline)
    .bind(job.posted_date)
    .bind(&job.source_url)
    .execute(&mut *conn)
    .await?;

    info!("Added job {}: {}", job.job_id, job.title);
    Ok(UpsertOutcome::Created)
}

/// The losing writer of a concurrent insert hits the unique constraint on `job_id`.
fn map_write_error(e: sqlx::Error, job: &NewJob) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return StoreError::Conflict(job.job_id.clone());
        }
    }
    StoreError::Database(e)
}

// ────────────────────────────────────────────────────────────────────────────
// Résumés
// ────────────────────────────────────────────────────────────────────────────

pub struct PgResumeStore {
    pool: PgPool,
}

impl PgResumeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResumeStore for PgResumeStore {
    async fn find_resume(&self, id: Uuid) -> Result<Option<ResumeProfile>, StoreError> {
        let resume = sqlx::query_as::<_, ResumeProfile>(
            "SELECT id, raw_text, skills, experience_years, education_level FROM resumes WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(resume)
    }
}
