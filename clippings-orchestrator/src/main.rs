//! Clippings Server
//!
//! Binary entry point for the digest orchestrator: wires the database pool,
//! the external-service clients, the enrichment sub-pipeline, and the job
//! queue, then serves the HTTP API.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clippings_client::{EnrichmentClient, GenerationClient};
use clippings_orchestrator::api::{self, AppState};
use clippings_orchestrator::config::Config;
use clippings_orchestrator::db;
use clippings_orchestrator::repository::job_repository;
use clippings_orchestrator::service::batch::BatchSubmitter;
use clippings_orchestrator::service::deliver::ArtifactWriter;
use clippings_orchestrator::service::merge::ResultMerger;
use clippings_orchestrator::service::pipeline::PipelineOrchestrator;
use clippings_orchestrator::service::poll::CompletionPoller;
use clippings_orchestrator::service::queue::JobQueue;
use clippings_orchestrator::service::retry::RetryPolicy;
use clippings_orchestrator::service::store::{SqlEnrichmentJobStore, SqlRecordStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clippings_orchestrator=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Clippings Orchestrator...");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    info!("Connecting to database...");
    let pool = db::create_pool(&config.database_url)
        .await
        .context("Failed to create database pool")?;

    db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    // Jobs left in flight by a previous process have no owning task; close
    // them out so they stop holding the admission gate.
    let interrupted = job_repository::fail_interrupted(&pool)
        .await
        .context("Failed to recover interrupted jobs")?;
    if interrupted > 0 {
        warn!("Marked {interrupted} interrupted job(s) as failed at startup");
    }

    // External collaborators
    let enrichment = Arc::new(EnrichmentClient::new(
        config.enrichment_url.clone(),
        config.enrichment_api_key.clone(),
    ));
    let generation = Arc::new(GenerationClient::new(
        config.generation_url.clone(),
        config.generation_api_key.clone(),
        config.generation_model.clone(),
    ));

    // Enrichment sub-pipeline
    let enrichment_jobs = Arc::new(SqlEnrichmentJobStore::new(pool.clone()));
    let records = Arc::new(SqlRecordStore::new(pool.clone()));

    let submitter = BatchSubmitter::new(
        enrichment.clone(),
        enrichment_jobs.clone(),
        config.batch_size,
        config.max_batches,
        config.enrichment_max_retries,
    );
    let poller = CompletionPoller::new(
        enrichment.clone(),
        enrichment_jobs,
        config.poll_timeout,
        config.poll_interval,
        config.max_concurrent_polls,
    );
    let merger = ResultMerger::new(enrichment, records.clone());

    let orchestrator = Arc::new(PipelineOrchestrator::new(
        records,
        submitter,
        poller,
        merger,
        generation,
        RetryPolicy::new(config.retry_max_attempts, config.retry_initial_delay),
    ));

    let delivery = Arc::new(ArtifactWriter::new(config.artifact_dir.clone()));
    let queue = Arc::new(JobQueue::new(pool.clone(), orchestrator, delivery));

    let app = api::create_router(AppState { pool, queue });

    info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .await
        .context("Failed to start server")?;

    Ok(())
}
