//! Digest Job Repository
//!
//! Handles all database operations related to digest jobs. Status updates
//! carry a status predicate in the WHERE clause so terminal states are never
//! overwritten, whatever order concurrent writers land in.

use clippings_core::domain::job::{DigestJob, JobStatus};
use clippings_core::domain::stage::Stage;
use sqlx::PgPool;
use uuid::Uuid;

/// Outcome of the combined admission check + insert
#[derive(Debug, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    /// Another job is already in flight; nothing was inserted
    Busy,
}

/// Admission-checked job creation
///
/// The in-flight count and the insert run inside one transaction, so two
/// enqueue attempts racing through the same database serialize on commit
/// rather than on a separate check-then-insert window. Under concurrent
/// enqueues from multiple processes at READ COMMITTED a residual race
/// remains (both transactions can count zero before either commits); jobs
/// are user-initiated at low frequency, so this is an accepted property of
/// the design, not an oversight.
pub async fn admit_and_create(pool: &PgPool, job: &DigestJob) -> Result<Admission, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let (in_flight,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM digest_jobs WHERE status IN ('pending', 'processing')
        "#,
    )
    .fetch_one(&mut *tx)
    .await?;

    if in_flight > 0 {
        return Ok(Admission::Busy);
    }

    sqlx::query(
        r#"
        INSERT INTO digest_jobs
            (id, keywords, date_start, date_end, deliver_to, status, current_stage,
             current_percentage, cancellation_requested, artifact_path, error_message,
             created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        "#,
    )
    .bind(job.id)
    .bind(&job.keywords)
    .bind(job.date_start)
    .bind(job.date_end)
    .bind(&job.deliver_to)
    .bind(status_to_string(job.status))
    .bind(job.current_stage.map(Stage::as_str))
    .bind(job.current_percentage)
    .bind(job.cancellation_requested)
    .bind(&job.artifact_path)
    .bind(&job.error_message)
    .bind(job.created_at)
    .bind(job.updated_at)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(Admission::Admitted)
}

/// Find a job by ID
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<DigestJob>, sqlx::Error> {
    let row = sqlx::query_as::<_, JobRow>(
        r#"
        SELECT id, keywords, date_start, date_end, deliver_to, status, current_stage,
               current_percentage, cancellation_requested, artifact_path, error_message,
               created_at, updated_at
        FROM digest_jobs
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.into()))
}

/// List recent jobs, newest first
pub async fn list_recent(pool: &PgPool, limit: i64) -> Result<Vec<DigestJob>, sqlx::Error> {
    let rows = sqlx::query_as::<_, JobRow>(
        r#"
        SELECT id, keywords, date_start, date_end, deliver_to, status, current_stage,
               current_percentage, cancellation_requested, artifact_path, error_message,
               created_at, updated_at
        FROM digest_jobs
        ORDER BY created_at DESC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

/// Move a pending job to processing
pub async fn mark_processing(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE digest_jobs
        SET status = 'processing', updated_at = $1
        WHERE id = $2 AND status = 'pending'
        "#,
    )
    .bind(chrono::Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Overwrite the job's "where are we now" snapshot
///
/// Only valid while the job is processing; the append-only progress log is
/// the history, this is the cheap read path.
pub async fn update_snapshot(
    pool: &PgPool,
    id: Uuid,
    stage: Stage,
    percentage: i16,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE digest_jobs
        SET current_stage = $1, current_percentage = $2, updated_at = $3
        WHERE id = $4 AND status = 'processing'
        "#,
    )
    .bind(stage.as_str())
    .bind(percentage)
    .bind(chrono::Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Finish a job successfully with its artifact reference
pub async fn mark_completed(
    pool: &PgPool,
    id: Uuid,
    artifact_path: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE digest_jobs
        SET status = 'completed', artifact_path = $1, current_percentage = 100, updated_at = $2
        WHERE id = $3 AND status IN ('pending', 'processing')
        "#,
    )
    .bind(artifact_path)
    .bind(chrono::Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Finish a job as failed with a human-readable message
pub async fn mark_failed(pool: &PgPool, id: Uuid, error_message: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE digest_jobs
        SET status = 'failed', error_message = $1, updated_at = $2
        WHERE id = $3 AND status IN ('pending', 'processing')
        "#,
    )
    .bind(error_message)
    .bind(chrono::Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Finish a job as cancelled
///
/// Only reachable from processing: the orchestrator task itself observed the
/// flag at a stage boundary. Nothing force-kills a running job.
pub async fn mark_cancelled(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE digest_jobs
        SET status = 'cancelled', updated_at = $1
        WHERE id = $2 AND status = 'processing'
        "#,
    )
    .bind(chrono::Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Set the cancellation flag on an in-flight job
///
/// Returns false when the job does not exist or has already finished. The
/// flag is only ever observed cooperatively by the orchestrator task.
pub async fn request_cancellation(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE digest_jobs
        SET cancellation_requested = TRUE, updated_at = $1
        WHERE id = $2 AND status IN ('pending', 'processing')
        "#,
    )
    .bind(chrono::Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Polled read of the cancellation flag
pub async fn cancellation_requested(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let row: Option<(bool,)> =
        sqlx::query_as("SELECT cancellation_requested FROM digest_jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;

    Ok(row.map(|(flag,)| flag).unwrap_or(false))
}

/// Fail jobs left in flight by a dead process
///
/// Run at startup: a job still pending/processing at boot can have no owning
/// task, so it is closed out rather than left blocking admission forever.
pub async fn fail_interrupted(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE digest_jobs
        SET status = 'failed', error_message = 'interrupted by orchestrator restart',
            updated_at = $1
        WHERE status IN ('pending', 'processing')
        "#,
    )
    .bind(chrono::Utc::now())
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

// =============================================================================
// Helper Functions
// =============================================================================

fn status_to_string(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Pending => "pending",
        JobStatus::Processing => "processing",
        JobStatus::Completed => "completed",
        JobStatus::Failed => "failed",
        JobStatus::Cancelled => "cancelled",
    }
}

fn string_to_status(s: &str) -> JobStatus {
    match s {
        "pending" => JobStatus::Pending,
        "processing" => JobStatus::Processing,
        "completed" => JobStatus::Completed,
        "failed" => JobStatus::Failed,
        "cancelled" => JobStatus::Cancelled,
        _ => JobStatus::Pending,
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    keywords: Vec<String>,
    date_start: chrono::NaiveDate,
    date_end: chrono::NaiveDate,
    deliver_to: Option<String>,
    status: String,
    current_stage: Option<String>,
    current_percentage: i16,
    cancellation_requested: bool,
    artifact_path: Option<String>,
    error_message: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<JobRow> for DigestJob {
    fn from(row: JobRow) -> Self {
        DigestJob {
            id: row.id,
            keywords: row.keywords,
            date_start: row.date_start,
            date_end: row.date_end,
            deliver_to: row.deliver_to,
            status: string_to_status(&row.status),
            current_stage: row.current_stage.as_deref().and_then(Stage::parse),
            current_percentage: row.current_percentage,
            cancellation_requested: row.cancellation_requested,
            artifact_path: row.artifact_path,
            error_message: row.error_message,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_string_roundtrip() {
        for status in [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
            JobStatus::Cancelled,
        ] {
            assert_eq!(string_to_status(status_to_string(status)), status);
        }
    }
}
