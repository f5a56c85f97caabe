//! Record maintenance command handlers
//!
//! The explicit re-fetch path: the only way a record marked permanently
//! unavailable re-enters the normal pipeline. Also surfaces enrichment job
//! counts for a quick health check.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;

use clippings_client::{EnrichmentApi, EnrichmentClient};
use clippings_orchestrator::config::Config as OrchestratorConfig;
use clippings_orchestrator::db;
use clippings_orchestrator::repository::{enrichment_repository, record_repository};

use crate::config::Config;

/// Record subcommands
#[derive(Subcommand)]
pub enum RecordCommands {
    /// List records marked permanently unavailable
    Unavailable,
    /// Clear the unavailable marker so the next digest re-requests content
    Refetch {
        /// Record ID to clear
        #[arg(long, conflicts_with = "all")]
        id: Option<i64>,

        /// Clear every unavailable record
        #[arg(long)]
        all: bool,
    },
    /// Resubmit failed enrichment batches that still have retry budget
    Resubmit,
    /// Enrichment job counts by status
    Stats,
}

/// Handle record commands
pub async fn handle_record_command(command: RecordCommands, config: &Config) -> Result<()> {
    let pool = db::create_pool(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    match command {
        RecordCommands::Unavailable => list_unavailable(pool).await,
        RecordCommands::Refetch { id, all } => refetch(pool, id, all).await,
        RecordCommands::Resubmit => resubmit(pool).await,
        RecordCommands::Stats => stats(pool).await,
    }
}

/// List records stuck in the unavailable state
async fn list_unavailable(pool: sqlx::PgPool) -> Result<()> {
    let records = record_repository::find_unavailable(&pool).await?;

    if records.is_empty() {
        println!("{}", "No unavailable records.".green());
        return Ok(());
    }

    println!(
        "{}",
        format!("{} unavailable record(s):", records.len()).bold()
    );
    for record in records {
        println!("  {} {} ({})", record.id, record.title, record.url);
    }

    Ok(())
}

/// Clear unavailable markers
async fn refetch(pool: sqlx::PgPool, id: Option<i64>, all: bool) -> Result<()> {
    match (id, all) {
        (Some(record_id), _) => {
            if record_repository::clear_unavailable(&pool, record_id).await? {
                println!("{}", format!("Record {record_id} will be re-fetched.").green());
            } else {
                println!(
                    "{}",
                    format!("Record {record_id} is not marked unavailable.").yellow()
                );
            }
        }
        (None, true) => {
            let records = record_repository::find_unavailable(&pool).await?;
            let mut cleared = 0;
            for record in &records {
                if record_repository::clear_unavailable(&pool, record.id).await? {
                    cleared += 1;
                }
            }
            println!("{}", format!("Cleared {cleared} record(s).").green());
        }
        (None, false) => {
            println!("{}", "Pass --id <record> or --all.".yellow());
        }
    }

    Ok(())
}

/// Resubmit failed enrichment batches with retry budget left
///
/// Each resubmission becomes a new enrichment job row with the retry count
/// incremented; the original terminal row is left untouched. Exhausted jobs
/// are skipped and stay abandoned.
async fn resubmit(pool: sqlx::PgPool) -> Result<()> {
    let settings = OrchestratorConfig::from_env()
        .context("Enrichment settings missing from environment")?;
    let client = EnrichmentClient::new(settings.enrichment_url, settings.enrichment_api_key);

    let retryable = enrichment_repository::find_retryable(&pool).await?;

    if retryable.is_empty() {
        println!("{}", "No failed enrichment jobs with retry budget.".green());
        return Ok(());
    }

    let mut resubmitted = 0;
    for job in &retryable {
        if !job.can_retry() {
            continue;
        }

        let records = record_repository::find_by_ids(&pool, &job.record_ids).await?;
        let urls: Vec<String> = records.into_iter().map(|record| record.url).collect();

        if urls.is_empty() {
            println!(
                "{}",
                format!("Skipping {}: its records no longer exist", job.external_id).yellow()
            );
            continue;
        }

        match client.submit_batch(&urls).await {
            Ok(accepted) => {
                enrichment_repository::create_retry(&pool, job, &accepted.job_id).await?;
                println!(
                    "{}",
                    format!(
                        "Resubmitted {} as {} (attempt {}/{})",
                        job.external_id,
                        accepted.job_id,
                        job.retry_count + 1,
                        job.max_retries
                    )
                    .green()
                );
                resubmitted += 1;
            }
            Err(err) => {
                println!(
                    "{}",
                    format!("Failed to resubmit {}: {err}", job.external_id).red()
                );
            }
        }
    }

    println!(
        "{}",
        format!("Resubmitted {resubmitted}/{} job(s).", retryable.len()).bold()
    );

    Ok(())
}

/// Show enrichment job counts
async fn stats(pool: sqlx::PgPool) -> Result<()> {
    let stats = enrichment_repository::stats(&pool).await?;

    println!("{}", "Enrichment jobs:".bold());
    println!("  pending: {}", stats.pending);
    println!("  running: {}", stats.running);
    println!("  success: {}", stats.success.to_string().green());
    println!("  failed:  {}", stats.failed.to_string().red());

    Ok(())
}
