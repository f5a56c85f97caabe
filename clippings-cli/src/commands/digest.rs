//! Digest command handlers
//!
//! `generate` runs the whole pipeline synchronously in-process with the
//! no-op progress reporter — the degenerate case of the queued path. The
//! other subcommands inspect or flag jobs directly in the store.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Subcommand;
use colored::*;
use uuid::Uuid;

use clippings_client::{EnrichmentClient, GenerationClient};
use clippings_core::domain::job::{DigestJob, JobStatus};
use clippings_core::domain::progress::{EventType, ProgressEntry};
use clippings_core::dto::digest::CreateDigest;
use clippings_orchestrator::config::Config as OrchestratorConfig;
use clippings_orchestrator::db;
use clippings_orchestrator::repository::{job_repository, progress_repository};
use clippings_orchestrator::service::batch::BatchSubmitter;
use clippings_orchestrator::service::deliver::{ArtifactWriter, DigestDelivery};
use clippings_orchestrator::service::merge::ResultMerger;
use clippings_orchestrator::service::pipeline::PipelineOrchestrator;
use clippings_orchestrator::service::poll::CompletionPoller;
use clippings_orchestrator::service::progress::NoopReporter;
use clippings_orchestrator::service::queue::build_job;
use clippings_orchestrator::service::retry::RetryPolicy;
use clippings_orchestrator::service::store::{SqlEnrichmentJobStore, SqlRecordStore};

use crate::config::Config;

/// Digest subcommands
#[derive(Subcommand)]
pub enum DigestCommands {
    /// Run a digest synchronously and write the artifact
    Generate {
        /// Keywords, comma or newline separated
        #[arg(short, long)]
        keywords: String,

        /// Start of the date range (YYYY-MM-DD, default: two months back)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// End of the date range (YYYY-MM-DD, default: today)
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Artifact output directory
        #[arg(short, long, default_value = "data")]
        output: String,
    },
    /// List recent digest jobs
    List {
        /// Number of jobs to show
        #[arg(short, long, default_value_t = 20)]
        limit: i64,
    },
    /// Show a job's status snapshot
    Status {
        /// Job ID
        id: Uuid,
    },
    /// Show a job's progress log
    Logs {
        /// Job ID
        id: Uuid,

        /// Number of entries to show
        #[arg(short, long, default_value_t = 50)]
        limit: i64,

        /// Show the full history instead of the most recent entries
        #[arg(long)]
        all: bool,
    },
    /// Request cooperative cancellation of a running job
    Cancel {
        /// Job ID
        id: Uuid,
    },
}

/// Handle digest commands
pub async fn handle_digest_command(command: DigestCommands, config: &Config) -> Result<()> {
    let pool = db::create_pool(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    match command {
        DigestCommands::Generate {
            keywords,
            from,
            to,
            output,
        } => generate(pool, keywords, from, to, output).await,
        DigestCommands::List { limit } => list(pool, limit).await,
        DigestCommands::Status { id } => status(pool, id).await,
        DigestCommands::Logs { id, limit, all } => logs(pool, id, limit, all).await,
        DigestCommands::Cancel { id } => cancel(pool, id).await,
    }
}

/// Run the pipeline synchronously with the no-op reporter
async fn generate(
    pool: sqlx::PgPool,
    keywords: String,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    output: String,
) -> Result<()> {
    let settings = OrchestratorConfig::from_env()
        .context("Enrichment/generation settings missing from environment")?;

    db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let job = build_job(CreateDigest {
        keywords,
        date_start: from,
        date_end: to,
        deliver_to: None,
    })
    .map_err(|e| anyhow::anyhow!("{e}"))?;

    println!(
        "{}",
        format!(
            "Generating digest for {} ({} to {})",
            job.keywords.join(", "),
            job.date_start,
            job.date_end
        )
        .bold()
    );

    let enrichment = Arc::new(EnrichmentClient::new(
        settings.enrichment_url.clone(),
        settings.enrichment_api_key.clone(),
    ));
    let generation = Arc::new(GenerationClient::new(
        settings.generation_url.clone(),
        settings.generation_api_key.clone(),
        settings.generation_model.clone(),
    ));

    let enrichment_jobs = Arc::new(SqlEnrichmentJobStore::new(pool.clone()));
    let records = Arc::new(SqlRecordStore::new(pool.clone()));

    let orchestrator = PipelineOrchestrator::new(
        records.clone(),
        BatchSubmitter::new(
            enrichment.clone(),
            enrichment_jobs.clone(),
            settings.batch_size,
            settings.max_batches,
            settings.enrichment_max_retries,
        ),
        CompletionPoller::new(
            enrichment.clone(),
            enrichment_jobs,
            settings.poll_timeout,
            settings.poll_interval,
            settings.max_concurrent_polls,
        ),
        ResultMerger::new(enrichment, records),
        generation,
        RetryPolicy::new(settings.retry_max_attempts, settings.retry_initial_delay),
    );

    let reporter = NoopReporter;
    let digest = orchestrator
        .run(&job, &reporter)
        .await
        .map_err(|e| anyhow::anyhow!("digest generation failed: {e}"))?;

    let artifact = ArtifactWriter::new(output)
        .deliver(&job, &digest, &reporter)
        .await?;

    println!(
        "{} {} item(s), artifact at {}",
        "Done:".green().bold(),
        digest.items.len(),
        artifact
    );

    Ok(())
}

/// List recent jobs
async fn list(pool: sqlx::PgPool, limit: i64) -> Result<()> {
    let jobs = job_repository::list_recent(&pool, limit).await?;

    if jobs.is_empty() {
        println!("{}", "No digest jobs found.".yellow());
        return Ok(());
    }

    println!("{}", format!("Found {} job(s):", jobs.len()).bold());
    println!();
    for job in jobs {
        print_job(&job);
        println!();
    }

    Ok(())
}

/// Show the job's snapshot
async fn status(pool: sqlx::PgPool, id: Uuid) -> Result<()> {
    let job = job_repository::find_by_id(&pool, id)
        .await?
        .with_context(|| format!("Digest job {id} not found"))?;

    print_job(&job);
    Ok(())
}

/// Show progress entries, oldest first for reading
async fn logs(pool: sqlx::PgPool, id: Uuid, limit: i64, all: bool) -> Result<()> {
    let entries = if all {
        progress_repository::find_by_job(&pool, id).await?
    } else {
        let mut recent = progress_repository::find_recent(&pool, id, limit).await?;
        recent.reverse();
        recent
    };

    if entries.is_empty() {
        println!("{}", "No log entries found.".yellow());
        return Ok(());
    }

    for entry in &entries {
        print_entry(entry);
    }

    Ok(())
}

/// Flag a running job for cooperative cancellation
async fn cancel(pool: sqlx::PgPool, id: Uuid) -> Result<()> {
    if job_repository::request_cancellation(&pool, id).await? {
        println!(
            "{}",
            "Cancellation requested; the job stops at its next stage boundary.".green()
        );
    } else {
        println!("{}", "Job not found or already finished.".yellow());
    }

    Ok(())
}

fn print_job(job: &DigestJob) {
    let status = match job.status {
        JobStatus::Pending => "pending".yellow(),
        JobStatus::Processing => "processing".cyan(),
        JobStatus::Completed => "completed".green(),
        JobStatus::Failed => "failed".red(),
        JobStatus::Cancelled => "cancelled".magenta(),
    };

    println!("{} {}", "Job:".bold(), job.id);
    println!("  Status:    {status}");
    println!("  Keywords:  {}", job.keywords.join(", "));
    println!("  Range:     {} to {}", job.date_start, job.date_end);

    if let Some(stage) = job.current_stage {
        println!("  Stage:     {stage} ({}%)", job.current_percentage);
    }
    if let Some(artifact) = &job.artifact_path {
        println!("  Artifact:  {artifact}");
    }
    if let Some(error) = &job.error_message {
        println!("  Error:     {}", error.red());
    }
}

fn print_entry(entry: &ProgressEntry) {
    let tag = match entry.event_type {
        EventType::Error => "error".red(),
        EventType::Warning => "warning".yellow(),
        EventType::Retry => "retry".yellow(),
        EventType::Info => "info".cyan(),
        EventType::StageUpdate => "stage".green(),
    };

    println!(
        "{} [{}] {}",
        entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
        tag,
        entry.message
    );
}
