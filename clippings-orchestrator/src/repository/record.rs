//! Corpus Record Repository
//!
//! Read access for the filtering stage plus the narrow write paths owned by
//! the result merger. The corpus itself is populated by an external
//! importer; this core never inserts records.

use chrono::{Days, NaiveDate, NaiveTime};
use clippings_core::domain::record::{ContentState, Record};
use sqlx::PgPool;

/// Records saved within the inclusive date range, oldest first
pub async fn find_by_date_range(
    pool: &PgPool,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<Record>, sqlx::Error> {
    let range_start = start.and_time(NaiveTime::MIN).and_utc();
    let range_end = end
        .checked_add_days(Days::new(1))
        .unwrap_or(end)
        .and_time(NaiveTime::MIN)
        .and_utc();

    let rows = sqlx::query_as::<_, RecordRow>(
        r#"
        SELECT id, url, title, tags, excerpt, saved_at, content, content_state, fetched_at
        FROM records
        WHERE saved_at >= $1 AND saved_at < $2
        ORDER BY saved_at ASC
        "#,
    )
    .bind(range_start)
    .bind(range_end)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

/// Records by id, preserving no particular order
pub async fn find_by_ids(pool: &PgPool, ids: &[i64]) -> Result<Vec<Record>, sqlx::Error> {
    let rows = sqlx::query_as::<_, RecordRow>(
        r#"
        SELECT id, url, title, tags, excerpt, saved_at, content, content_state, fetched_at
        FROM records
        WHERE id = ANY($1)
        "#,
    )
    .bind(ids)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

/// Store fetched content for a record
pub async fn mark_fetched(
    pool: &PgPool,
    record_id: i64,
    text: &str,
    fetched_at: chrono::DateTime<chrono::Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE records
        SET content = $1, content_state = 'fetched', fetched_at = $2
        WHERE id = $3
        "#,
    )
    .bind(text)
    .bind(fetched_at)
    .bind(record_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Mark a record's content as permanently unavailable
///
/// Distinct from "not attempted": the normal pipeline skips unavailable
/// records instead of re-requesting them.
pub async fn mark_unavailable(pool: &PgPool, record_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE records
        SET content = NULL, content_state = 'unavailable', fetched_at = NULL
        WHERE id = $1
        "#,
    )
    .bind(record_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Explicit re-fetch operation: clear the unavailable marker
///
/// The only path back from `unavailable` to `not_attempted`. Returns false
/// when the record was not marked unavailable.
pub async fn clear_unavailable(pool: &PgPool, record_id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE records
        SET content_state = 'not_attempted', fetched_at = NULL
        WHERE id = $1 AND content_state = 'unavailable'
        "#,
    )
    .bind(record_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// All records currently marked unavailable
pub async fn find_unavailable(pool: &PgPool) -> Result<Vec<Record>, sqlx::Error> {
    let rows = sqlx::query_as::<_, RecordRow>(
        r#"
        SELECT id, url, title, tags, excerpt, saved_at, content, content_state, fetched_at
        FROM records
        WHERE content_state = 'unavailable'
        ORDER BY saved_at ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct RecordRow {
    id: i64,
    url: String,
    title: String,
    tags: Vec<String>,
    excerpt: Option<String>,
    saved_at: chrono::DateTime<chrono::Utc>,
    content: Option<String>,
    content_state: String,
    fetched_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<RecordRow> for Record {
    fn from(row: RecordRow) -> Self {
        let content = match (row.content_state.as_str(), row.content, row.fetched_at) {
            ("fetched", Some(text), Some(fetched_at)) => ContentState::Fetched { text, fetched_at },
            ("unavailable", _, _) => ContentState::Unavailable,
            _ => ContentState::NotAttempted,
        };

        Record {
            id: row.id,
            url: row.url,
            title: row.title,
            tags: row.tags,
            excerpt: row.excerpt,
            saved_at: row.saved_at,
            content,
        }
    }
}
