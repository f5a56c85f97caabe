use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Create digest jobs table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS digest_jobs (
            id UUID PRIMARY KEY,
            keywords TEXT[] NOT NULL,
            date_start DATE NOT NULL,
            date_end DATE NOT NULL,
            deliver_to TEXT,
            status VARCHAR(20) NOT NULL,
            current_stage VARCHAR(50),
            current_percentage SMALLINT NOT NULL DEFAULT 0,
            cancellation_requested BOOLEAN NOT NULL DEFAULT FALSE,
            artifact_path TEXT,
            error_message TEXT,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create progress log table (append-only)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS digest_progress_log (
            id BIGSERIAL PRIMARY KEY,
            job_id UUID NOT NULL REFERENCES digest_jobs(id) ON DELETE CASCADE,
            stage VARCHAR(50),
            event_type VARCHAR(20) NOT NULL,
            percentage SMALLINT,
            message TEXT NOT NULL,
            details JSONB,
            timestamp TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create enrichment jobs table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS enrichment_jobs (
            external_id TEXT PRIMARY KEY,
            record_ids BIGINT[] NOT NULL,
            status VARCHAR(20) NOT NULL,
            retry_count INTEGER NOT NULL DEFAULT 0,
            max_retries INTEGER NOT NULL DEFAULT 3,
            error_message TEXT,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL,
            completed_at TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create corpus records table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS records (
            id BIGSERIAL PRIMARY KEY,
            url TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL,
            tags TEXT[] NOT NULL DEFAULT '{}',
            excerpt TEXT,
            saved_at TIMESTAMPTZ NOT NULL,
            content TEXT,
            content_state VARCHAR(20) NOT NULL DEFAULT 'not_attempted',
            fetched_at TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for the hot read paths
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_digest_jobs_status ON digest_jobs(status)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_progress_log_job_id ON digest_progress_log(job_id, timestamp DESC)",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_enrichment_jobs_status ON enrichment_jobs(status)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_records_saved_at ON records(saved_at)")
        .execute(pool)
        .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}
