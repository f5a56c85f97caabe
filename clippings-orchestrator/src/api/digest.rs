//! Digest Job API Handlers
//!
//! HTTP endpoints for the digest job lifecycle: enqueue, status snapshot,
//! progress log, cancellation.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use clippings_core::domain::progress::ProgressEntry;
use clippings_core::dto::digest::{CreateDigest, DigestSnapshot};

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};
use crate::repository::{enrichment_repository, job_repository, progress_repository};
use crate::service::queue::QueueError;

/// POST /api/digests
/// Validate, admit, and enqueue a new digest job; returns immediately
pub async fn create_digest(
    State(state): State<AppState>,
    Json(req): Json<CreateDigest>,
) -> ApiResult<(StatusCode, Json<EnqueueResponse>)> {
    tracing::info!("Enqueue request for keywords: {}", req.keywords);

    let job_id = state.queue.enqueue(req).await.map_err(|e| match e {
        QueueError::Validation(msg) => ApiError::Validation(msg),
        QueueError::Busy => ApiError::Conflict("another digest job is already in flight".to_string()),
        QueueError::Database(err) => ApiError::DatabaseError(err),
    })?;

    Ok((StatusCode::ACCEPTED, Json(EnqueueResponse { job_id })))
}

/// GET /api/digests/{id}
/// Cheap "where are we now" snapshot for one job
pub async fn get_digest(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DigestSnapshot>> {
    tracing::debug!("Getting digest job: {}", id);

    let job = job_repository::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Digest job {} not found", id)))?;

    Ok(Json(DigestSnapshot::from(job)))
}

/// GET /api/digests/{id}/logs
/// Most recent progress entries, newest first
pub async fn get_digest_logs(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<LogsQuery>,
) -> ApiResult<Json<Vec<ProgressEntry>>> {
    tracing::debug!("Getting logs for digest job: {}", id);

    job_repository::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Digest job {} not found", id)))?;

    let limit = params.limit.unwrap_or(50).clamp(1, 500);
    let entries = progress_repository::find_recent(&state.pool, id, limit).await?;

    Ok(Json(entries))
}

/// POST /api/digests/{id}/cancel
/// Set the cancellation flag; the job stops at its next stage boundary
pub async fn cancel_digest(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    tracing::info!("Cancellation requested for digest job: {}", id);

    let flagged = state.queue.request_cancellation(id).await?;

    if flagged {
        return Ok(StatusCode::ACCEPTED);
    }

    match job_repository::find_by_id(&state.pool, id).await? {
        Some(_) => Err(ApiError::Conflict(format!(
            "Digest job {} has already finished",
            id
        ))),
        None => Err(ApiError::NotFound(format!("Digest job {} not found", id))),
    }
}

/// GET /api/enrichment/stats
/// Enrichment job counts by status
pub async fn enrichment_stats(
    State(state): State<AppState>,
) -> ApiResult<Json<enrichment_repository::EnrichmentStats>> {
    let stats = enrichment_repository::stats(&state.pool).await?;
    Ok(Json(stats))
}

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Serialize)]
pub struct EnqueueResponse {
    pub job_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    pub limit: Option<i64>,
}
