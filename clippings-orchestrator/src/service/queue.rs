//! Job queue and admission control
//!
//! Entry point for digest jobs. `enqueue` validates the request, performs
//! the single-flight admission check and the insert inside one transaction,
//! and starts orchestration in its own task — the caller never waits on the
//! job. The execution wrapper catches every failure mode, panics included,
//! and persists the outcome; nothing escapes to the host process.

use std::collections::HashMap;
use std::sync::Arc;

use sqlx::PgPool;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

use clippings_core::domain::job::{DigestJob, JobStatus};
use clippings_core::domain::progress::EventType;
use clippings_core::dto::digest::{CreateDigest, normalize_keywords};

use crate::repository::job_repository::{self, Admission};
use crate::service::deliver::DigestDelivery;
use crate::service::pipeline::{PipelineOrchestrator, StageError};
use crate::service::progress::{DbProgressReporter, ProgressReporter};

/// Errors surfaced to the enqueue caller
///
/// Both variants reject the request before any job row exists.
#[derive(Debug)]
pub enum QueueError {
    /// Malformed request parameters
    Validation(String),
    /// Another job is already in flight
    Busy,
    Database(sqlx::Error),
}

impl From<sqlx::Error> for QueueError {
    fn from(err: sqlx::Error) -> Self {
        QueueError::Database(err)
    }
}

impl std::fmt::Display for QueueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueError::Validation(message) => f.write_str(message),
            QueueError::Busy => write!(f, "another digest job is already in flight"),
            QueueError::Database(err) => write!(f, "database error: {err}"),
        }
    }
}

enum RunOutcome {
    Completed(String),
    Cancelled,
    Failed(String),
}

pub struct JobQueue {
    pool: PgPool,
    orchestrator: Arc<PipelineOrchestrator>,
    delivery: Arc<dyn DigestDelivery>,
    /// Bookkeeping only — job state correctness lives in the store, which
    /// is what makes admission meaningful across processes.
    running: Mutex<HashMap<Uuid, JoinHandle<()>>>,
}

impl JobQueue {
    pub fn new(
        pool: PgPool,
        orchestrator: Arc<PipelineOrchestrator>,
        delivery: Arc<dyn DigestDelivery>,
    ) -> Self {
        Self {
            pool,
            orchestrator,
            delivery,
            running: Mutex::new(HashMap::new()),
        }
    }

    /// Accept a digest request and start it asynchronously
    ///
    /// Returns the job id as soon as the row is committed; the job itself
    /// runs in a spawned task.
    pub async fn enqueue(self: &Arc<Self>, req: CreateDigest) -> Result<Uuid, QueueError> {
        let job = build_job(req)?;
        let job_id = job.id;

        match job_repository::admit_and_create(&self.pool, &job).await? {
            Admission::Busy => return Err(QueueError::Busy),
            Admission::Admitted => {}
        }

        // Hold the registry lock across the spawn so the task's own cleanup
        // cannot run before its handle is registered.
        let mut running = self.running.lock().await;
        let queue = Arc::clone(self);
        let handle = tokio::spawn(async move {
            queue.execute(job).await;
            queue.running.lock().await.remove(&job_id);
        });
        running.insert(job_id, handle);

        info!("Enqueued digest job {job_id}");
        Ok(job_id)
    }

    /// Set the cancellation flag on an in-flight job
    ///
    /// The orchestrator observes the flag at its next stage boundary; the
    /// running task is never force-killed.
    pub async fn request_cancellation(&self, job_id: Uuid) -> Result<bool, sqlx::Error> {
        job_repository::request_cancellation(&self.pool, job_id).await
    }

    async fn execute(&self, job: DigestJob) {
        let job_id = job.id;

        if let Err(err) = job_repository::mark_processing(&self.pool, job_id).await {
            error!("Failed to move job {job_id} to processing: {err}");
            return;
        }

        let orchestrator = Arc::clone(&self.orchestrator);
        let delivery = Arc::clone(&self.delivery);
        let pool = self.pool.clone();

        // Inner task: a panic anywhere in the pipeline surfaces as a join
        // error here and is persisted like any other failure.
        let inner = tokio::spawn(async move {
            let reporter = DbProgressReporter::new(pool, job_id);

            match orchestrator.run(&job, &reporter).await {
                Ok(output) => match delivery.deliver(&job, &output, &reporter).await {
                    Ok(artifact_path) => RunOutcome::Completed(artifact_path),
                    Err(err) => RunOutcome::Failed(format!("delivery failed: {err:#}")),
                },
                Err(StageError::Cancelled) => RunOutcome::Cancelled,
                Err(err) => RunOutcome::Failed(err.to_string()),
            }
        });

        let outcome = match inner.await {
            Ok(outcome) => outcome,
            Err(err) => RunOutcome::Failed(format!("digest task aborted: {err}")),
        };

        match outcome {
            RunOutcome::Completed(artifact_path) => {
                if let Err(err) =
                    job_repository::mark_completed(&self.pool, job_id, &artifact_path).await
                {
                    error!("Failed to mark job {job_id} completed: {err}");
                }
                info!("Digest job {job_id} completed: {artifact_path}");
            }
            RunOutcome::Cancelled => {
                if let Err(err) = job_repository::mark_cancelled(&self.pool, job_id).await {
                    error!("Failed to mark job {job_id} cancelled: {err}");
                }
                info!("Digest job {job_id} cancelled");
            }
            RunOutcome::Failed(message) => {
                error!("Digest job {job_id} failed: {message}");
                if let Err(err) = job_repository::mark_failed(&self.pool, job_id, &message).await {
                    error!("Failed to mark job {job_id} failed: {err}");
                }

                let reporter = DbProgressReporter::new(self.pool.clone(), job_id);
                reporter.report_event(EventType::Error, &message, None).await;
            }
        }
    }
}

/// Validate a request and shape it into a pending job
///
/// Rejected requests never reach the store. A missing end date defaults to
/// today, a missing start date to two months before the end. Also used by
/// the synchronous CLI path, which runs the same pipeline without a row.
pub fn build_job(req: CreateDigest) -> Result<DigestJob, QueueError> {
    let keywords = normalize_keywords(&req.keywords);
    if keywords.is_empty() {
        return Err(QueueError::Validation(
            "at least one keyword is required".to_string(),
        ));
    }

    let today = chrono::Utc::now().date_naive();
    let date_end = req.date_end.unwrap_or(today);
    let date_start = req.date_start.unwrap_or_else(|| {
        date_end
            .checked_sub_months(chrono::Months::new(2))
            .unwrap_or(date_end)
    });

    if date_start > date_end {
        return Err(QueueError::Validation(format!(
            "date range start {date_start} is after end {date_end}"
        )));
    }

    let deliver_to = match req.deliver_to {
        Some(address) => {
            let address = address.trim().to_string();
            if address.is_empty() {
                None
            } else if !address.contains('@') {
                return Err(QueueError::Validation(format!(
                    "delivery address '{address}' is not an email address"
                )));
            } else {
                Some(address)
            }
        }
        None => None,
    };

    let now = chrono::Utc::now();

    Ok(DigestJob {
        id: Uuid::new_v4(),
        keywords,
        date_start,
        date_end,
        deliver_to,
        status: JobStatus::Pending,
        current_stage: None,
        current_percentage: 0,
        cancellation_requested: false,
        artifact_path: None,
        error_message: None,
        created_at: now,
        updated_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn request(keywords: &str) -> CreateDigest {
        CreateDigest {
            keywords: keywords.to_string(),
            date_start: None,
            date_end: None,
            deliver_to: None,
        }
    }

    #[test]
    fn test_empty_keywords_rejected() {
        assert!(matches!(
            build_job(request("  , ,\n")),
            Err(QueueError::Validation(_))
        ));
    }

    #[test]
    fn test_inverted_date_range_rejected() {
        let req = CreateDigest {
            date_start: NaiveDate::from_ymd_opt(2025, 8, 1),
            date_end: NaiveDate::from_ymd_opt(2025, 6, 1),
            ..request("rust")
        };
        assert!(matches!(build_job(req), Err(QueueError::Validation(_))));
    }

    #[test]
    fn test_defaults_cover_two_months_back() {
        let job = build_job(request("rust, async")).unwrap();
        let today = chrono::Utc::now().date_naive();

        assert_eq!(job.date_end, today);
        assert_eq!(
            job.date_start,
            today.checked_sub_months(chrono::Months::new(2)).unwrap()
        );
        assert_eq!(job.keywords, vec!["rust", "async"]);
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.current_percentage, 0);
    }

    #[test]
    fn test_bad_delivery_address_rejected() {
        let req = CreateDigest {
            deliver_to: Some("not-an-address".to_string()),
            ..request("rust")
        };
        assert!(matches!(build_job(req), Err(QueueError::Validation(_))));

        let req = CreateDigest {
            deliver_to: Some("   ".to_string()),
            ..request("rust")
        };
        assert_eq!(build_job(req).unwrap().deliver_to, None);
    }
}
