//! Progress Log Repository
//!
//! Handles all database operations for the append-only progress log.
//! Entries are only ever inserted; history is read back strictly ordered by
//! timestamp with the serial id breaking ties.

use clippings_core::domain::progress::{EventType, ProgressEntry};
use clippings_core::domain::stage::Stage;
use sqlx::PgPool;
use uuid::Uuid;

/// Append a progress entry
pub async fn append(pool: &PgPool, entry: &ProgressEntry) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO digest_progress_log
            (job_id, stage, event_type, percentage, message, details, timestamp)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(entry.job_id)
    .bind(entry.stage.map(Stage::as_str))
    .bind(entry.event_type.as_str())
    .bind(entry.percentage)
    .bind(&entry.message)
    .bind(&entry.details)
    .bind(entry.timestamp)
    .execute(pool)
    .await?;

    Ok(())
}

/// Full history for a job, oldest first
pub async fn find_by_job(pool: &PgPool, job_id: Uuid) -> Result<Vec<ProgressEntry>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ProgressRow>(
        r#"
        SELECT job_id, stage, event_type, percentage, message, details, timestamp
        FROM digest_progress_log
        WHERE job_id = $1
        ORDER BY timestamp ASC, id ASC
        "#,
    )
    .bind(job_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

/// Most recent entries for a job, newest first
pub async fn find_recent(
    pool: &PgPool,
    job_id: Uuid,
    limit: i64,
) -> Result<Vec<ProgressEntry>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ProgressRow>(
        r#"
        SELECT job_id, stage, event_type, percentage, message, details, timestamp
        FROM digest_progress_log
        WHERE job_id = $1
        ORDER BY timestamp DESC, id DESC
        LIMIT $2
        "#,
    )
    .bind(job_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct ProgressRow {
    job_id: Uuid,
    stage: Option<String>,
    event_type: String,
    percentage: Option<i16>,
    message: String,
    details: Option<serde_json::Value>,
    timestamp: chrono::DateTime<chrono::Utc>,
}

impl From<ProgressRow> for ProgressEntry {
    fn from(row: ProgressRow) -> Self {
        ProgressEntry {
            job_id: row.job_id,
            stage: row.stage.as_deref().and_then(Stage::parse),
            event_type: EventType::parse(&row.event_type).unwrap_or(EventType::Info),
            percentage: row.percentage,
            message: row.message,
            details: row.details,
            timestamp: row.timestamp,
        }
    }
}
