//! Enrichment Job Repository
//!
//! Tracks externally-submitted enrichment batches. Terminal rows are never
//! mutated: a retry inserts a fresh row with an incremented retry count, and
//! exhausted jobs are simply abandoned in place.

use clippings_core::domain::enrichment::{EnrichmentJob, EnrichmentStatus};
use sqlx::PgPool;

/// Record a newly accepted batch
pub async fn create(pool: &PgPool, job: &EnrichmentJob) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO enrichment_jobs
            (external_id, record_ids, status, retry_count, max_retries, error_message,
             created_at, updated_at, completed_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(&job.external_id)
    .bind(&job.record_ids)
    .bind(status_to_string(job.status))
    .bind(job.retry_count)
    .bind(job.max_retries)
    .bind(&job.error_message)
    .bind(job.created_at)
    .bind(job.updated_at)
    .bind(job.completed_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Move a pending job to running
pub async fn mark_running(pool: &PgPool, external_id: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE enrichment_jobs
        SET status = 'running', updated_at = $1
        WHERE external_id = $2 AND status = 'pending'
        "#,
    )
    .bind(chrono::Utc::now())
    .bind(external_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Close a job out as successful
pub async fn mark_success(pool: &PgPool, external_id: &str) -> Result<(), sqlx::Error> {
    let now = chrono::Utc::now();

    sqlx::query(
        r#"
        UPDATE enrichment_jobs
        SET status = 'success', updated_at = $1, completed_at = $1
        WHERE external_id = $2 AND status IN ('pending', 'running')
        "#,
    )
    .bind(now)
    .bind(external_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Close a job out as failed
pub async fn mark_failed(
    pool: &PgPool,
    external_id: &str,
    error_message: &str,
) -> Result<(), sqlx::Error> {
    let now = chrono::Utc::now();

    sqlx::query(
        r#"
        UPDATE enrichment_jobs
        SET status = 'failed', error_message = $1, updated_at = $2, completed_at = $2
        WHERE external_id = $3 AND status IN ('pending', 'running')
        "#,
    )
    .bind(error_message)
    .bind(now)
    .bind(external_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Failed jobs that still have retry budget, oldest first
pub async fn find_retryable(pool: &PgPool) -> Result<Vec<EnrichmentJob>, sqlx::Error> {
    let rows = sqlx::query_as::<_, EnrichmentRow>(
        r#"
        SELECT external_id, record_ids, status, retry_count, max_retries, error_message,
               created_at, updated_at, completed_at
        FROM enrichment_jobs
        WHERE status = 'failed' AND retry_count < max_retries
        ORDER BY updated_at ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

/// Record a resubmission of a failed job under a new external id
///
/// The original terminal row stays untouched; the new row carries the
/// incremented retry count.
pub async fn create_retry(
    pool: &PgPool,
    original: &EnrichmentJob,
    new_external_id: &str,
) -> Result<(), sqlx::Error> {
    let now = chrono::Utc::now();

    let retry = EnrichmentJob {
        external_id: new_external_id.to_string(),
        record_ids: original.record_ids.clone(),
        status: EnrichmentStatus::Pending,
        retry_count: original.retry_count + 1,
        max_retries: original.max_retries,
        error_message: None,
        created_at: now,
        updated_at: now,
        completed_at: None,
    };

    create(pool, &retry).await
}

/// Counts by status for the stats read path
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct EnrichmentStats {
    pub pending: i64,
    pub running: i64,
    pub success: i64,
    pub failed: i64,
}

pub async fn stats(pool: &PgPool) -> Result<EnrichmentStats, sqlx::Error> {
    let rows: Vec<(String, i64)> =
        sqlx::query_as("SELECT status, COUNT(*) FROM enrichment_jobs GROUP BY status")
            .fetch_all(pool)
            .await?;

    let mut stats = EnrichmentStats::default();
    for (status, count) in rows {
        match status.as_str() {
            "pending" => stats.pending = count,
            "running" => stats.running = count,
            "success" => stats.success = count,
            "failed" => stats.failed = count,
            _ => {}
        }
    }

    Ok(stats)
}

// =============================================================================
// Helper Functions
// =============================================================================

fn status_to_string(status: EnrichmentStatus) -> &'static str {
    match status {
        EnrichmentStatus::Pending => "pending",
        EnrichmentStatus::Running => "running",
        EnrichmentStatus::Success => "success",
        EnrichmentStatus::Failed => "failed",
    }
}

fn string_to_status(s: &str) -> EnrichmentStatus {
    match s {
        "pending" => EnrichmentStatus::Pending,
        "running" => EnrichmentStatus::Running,
        "success" => EnrichmentStatus::Success,
        "failed" => EnrichmentStatus::Failed,
        _ => EnrichmentStatus::Pending,
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct EnrichmentRow {
    external_id: String,
    record_ids: Vec<i64>,
    status: String,
    retry_count: i32,
    max_retries: i32,
    error_message: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
    completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<EnrichmentRow> for EnrichmentJob {
    fn from(row: EnrichmentRow) -> Self {
        EnrichmentJob {
            external_id: row.external_id,
            record_ids: row.record_ids,
            status: string_to_status(&row.status),
            retry_count: row.retry_count,
            max_retries: row.max_retries,
            error_message: row.error_message,
            created_at: row.created_at,
            updated_at: row.updated_at,
            completed_at: row.completed_at,
        }
    }
}
