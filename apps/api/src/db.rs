use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Creates and returns a PostgreSQL connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    info!("PostgreSQL connection pool established");
    Ok(pool)
}

/// Creates the `jobs` and `resumes` tables if they do not exist yet.
/// `job_id` carries the unique constraint that makes upserts safe across crawlers.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            id                    UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            job_id                TEXT NOT NULL UNIQUE,
            title                 TEXT NOT NULL,
            organization          TEXT NOT NULL,
            description           TEXT,
            responsibilities      TEXT,
            qualifications        TEXT,
            category              TEXT,
            grade                 TEXT,
            contract_type         TEXT,
            location              TEXT,
            duty_station          TEXT,
            remote_eligible       BOOLEAN NOT NULL DEFAULT FALSE,
            language_requirements JSONB NOT NULL DEFAULT '{}'::jsonb,
            education_level       TEXT,
            years_of_experience   INTEGER,
            apply_url             TEXT NOT NULL,
            deadline              DATE,
            posted_date           DATE,
            source_url            TEXT,
            is_active             BOOLEAN NOT NULL DEFAULT TRUE,
            created_at            TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at            TIMESTAMPTZ NOT NULL DEFAULT now(),
            last_scraped          TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS resumes (
            id                UUID PRIMARY KEY,
            raw_text          TEXT NOT NULL DEFAULT '',
            skills            TEXT[] NOT NULL DEFAULT '{}',
            experience_years  INTEGER,
            education_level   TEXT,
            created_at        TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    info!("Database schema verified");
    Ok(())
}
