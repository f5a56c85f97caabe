//! API Module
//!
//! HTTP API layer for the orchestrator.
//! Each submodule handles endpoints for a specific domain.

pub mod digest;
pub mod error;
pub mod health;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use sqlx::PgPool;
use tower_http::trace::TraceLayer;

use crate::service::queue::JobQueue;

/// Shared state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub queue: Arc<JobQueue>,
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Digest job endpoints
        .route("/api/digests", post(digest::create_digest))
        .route("/api/digests/{id}", get(digest::get_digest))
        .route("/api/digests/{id}/logs", get(digest::get_digest_logs))
        .route("/api/digests/{id}/cancel", post(digest::cancel_digest))
        // Enrichment bookkeeping
        .route("/api/enrichment/stats", get(digest::enrichment_stats))
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
