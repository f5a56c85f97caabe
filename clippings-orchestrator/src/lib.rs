//! Clippings Orchestrator
//!
//! The job-orchestration core that drives "generate a filtered digest from
//! a content corpus":
//! - Admission-controlled job queue (one digest in flight system-wide)
//! - Persisted multi-stage progress tracking (append-only log + snapshot)
//! - Bounded polling against the slow external enrichment service
//! - Result merging and retry discipline that tolerates partial failure
//!
//! Architecture:
//! - `config`: environment-driven settings
//! - `db`: connection pool and migrations
//! - `repository`: data access, one module per persisted entity
//! - `service`: business logic (queue, pipeline, batch/poll/merge, retry)
//! - `api`: axum HTTP layer

pub mod api;
pub mod config;
pub mod db;
pub mod repository;
pub mod service;
