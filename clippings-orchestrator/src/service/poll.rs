//! Completion polling for external enrichment jobs
//!
//! Each external job is polled at a fixed interval against its own
//! deadline. The timeout is a hard ceiling on waiting, not on the external
//! job itself — a job may still complete later and simply go unobserved.
//! Ids are polled concurrently under a bounded semaphore so the worst-case
//! wait is one timeout, not one per job, while the request rate against the
//! service stays bounded.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use clippings_client::EnrichmentApi;
use clippings_core::dto::enrichment::ExternalStatus;

use crate::service::store::EnrichmentJobStore;

/// Result of one polling round
#[derive(Debug, Default)]
pub struct PollOutcome {
    /// Jobs observed completed within the timeout
    pub completed: Vec<String>,
    /// Jobs that never reached completed before the deadline
    pub timed_out: Vec<String>,
    /// Jobs the service reported as failed
    pub failed: Vec<String>,
}

enum PollResult {
    Completed,
    Failed,
    TimedOut,
}

pub struct CompletionPoller {
    api: Arc<dyn EnrichmentApi>,
    jobs: Arc<dyn EnrichmentJobStore>,
    timeout: Duration,
    interval: Duration,
    max_concurrent: usize,
}

impl CompletionPoller {
    pub fn new(
        api: Arc<dyn EnrichmentApi>,
        jobs: Arc<dyn EnrichmentJobStore>,
        timeout: Duration,
        interval: Duration,
        max_concurrent: usize,
    ) -> Self {
        Self {
            api,
            jobs,
            timeout,
            interval,
            max_concurrent,
        }
    }

    /// Poll every id until completion or its deadline, whichever first
    ///
    /// Never blocks a single id past `timeout + one interval`; the caller
    /// continues with whatever completed.
    pub async fn poll_until_complete(&self, external_ids: &[String]) -> PollOutcome {
        let mut outcome = PollOutcome::default();

        if external_ids.is_empty() {
            return outcome;
        }

        info!(
            "Polling {} enrichment job(s) (timeout {:?}, interval {:?})",
            external_ids.len(),
            self.timeout,
            self.interval
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut handles = Vec::new();

        for external_id in external_ids {
            let api = Arc::clone(&self.api);
            let jobs = Arc::clone(&self.jobs);
            let semaphore = Arc::clone(&semaphore);
            let external_id = external_id.clone();
            let timeout = self.timeout;
            let interval = self.interval;

            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                let result = poll_one(api, jobs, &external_id, timeout, interval).await;
                Some((external_id, result))
            }));
        }

        for handle in handles {
            match handle.await {
                Ok(Some((external_id, PollResult::Completed))) => {
                    outcome.completed.push(external_id);
                }
                Ok(Some((external_id, PollResult::Failed))) => {
                    outcome.failed.push(external_id);
                }
                Ok(Some((external_id, PollResult::TimedOut))) => {
                    outcome.timed_out.push(external_id);
                }
                Ok(None) => {}
                Err(err) => warn!("Poll task panicked: {err}"),
            }
        }

        info!(
            "Polling finished: {} completed, {} timed out, {} failed",
            outcome.completed.len(),
            outcome.timed_out.len(),
            outcome.failed.len()
        );

        outcome
    }
}

async fn poll_one(
    api: Arc<dyn EnrichmentApi>,
    jobs: Arc<dyn EnrichmentJobStore>,
    external_id: &str,
    timeout: Duration,
    interval: Duration,
) -> PollResult {
    let deadline = Instant::now() + timeout;

    if let Err(err) = jobs.mark_running(external_id).await {
        warn!("Failed to mark enrichment job {external_id} running: {err:#}");
    }

    loop {
        match api.get_status(external_id).await {
            Ok(status) => match status.status {
                ExternalStatus::Completed => {
                    debug!("Enrichment job {external_id} completed");
                    if let Err(err) = jobs.mark_success(external_id).await {
                        warn!("Failed to mark enrichment job {external_id} success: {err:#}");
                    }
                    return PollResult::Completed;
                }
                ExternalStatus::Failed => {
                    let message = status.error.as_deref().unwrap_or("reported failed");
                    warn!("Enrichment job {external_id} failed: {message}");
                    if let Err(err) = jobs.mark_failed(external_id, message).await {
                        warn!("Failed to mark enrichment job {external_id} failed: {err:#}");
                    }
                    return PollResult::Failed;
                }
                other => {
                    debug!("Enrichment job {external_id} status: {other:?}");
                }
            },
            // A status-check hiccup is not a verdict; keep polling
            Err(err) => warn!("Status check for enrichment job {external_id} failed: {err}"),
        }

        time::sleep(interval).await;

        if Instant::now() >= deadline {
            warn!("Enrichment job {external_id} timed out after {timeout:?}; continuing without it");
            return PollResult::TimedOut;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testing::{MemoryJobStore, MockEnrichment};
    use clippings_core::domain::enrichment::EnrichmentStatus;

    fn poller(api: Arc<MockEnrichment>, jobs: Arc<MemoryJobStore>) -> CompletionPoller {
        CompletionPoller::new(
            api,
            jobs,
            Duration::from_secs(10),
            Duration::from_secs(2),
            4,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_job_is_observed() {
        let api = Arc::new(MockEnrichment::with_statuses(&[(
            "ext-0",
            &[
                ExternalStatus::Pending,
                ExternalStatus::Running,
                ExternalStatus::Completed,
            ],
        )]));
        let jobs = Arc::new(MemoryJobStore::default());

        let outcome = poller(api, Arc::clone(&jobs))
            .poll_until_complete(&["ext-0".to_string()])
            .await;

        assert_eq!(outcome.completed, vec!["ext-0"]);
        assert!(outcome.timed_out.is_empty());
        assert_eq!(
            jobs.statuses.lock().unwrap().get("ext-0"),
            Some(&EnrichmentStatus::Success)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_job_times_out_within_bound() {
        let api = Arc::new(MockEnrichment::with_statuses(&[(
            "ext-0",
            &[ExternalStatus::Running],
        )]));
        let jobs = Arc::new(MemoryJobStore::default());
        let started = Instant::now();

        let outcome = poller(api, jobs)
            .poll_until_complete(&["ext-0".to_string()])
            .await;

        assert!(outcome.completed.is_empty());
        assert_eq!(outcome.timed_out, vec!["ext-0"]);

        // Never blocks past timeout + one poll interval
        assert!(started.elapsed() <= Duration::from_secs(12));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mixed_outcomes() {
        let api = Arc::new(MockEnrichment::with_statuses(&[
            ("ext-0", &[ExternalStatus::Running, ExternalStatus::Completed]),
            ("ext-1", &[ExternalStatus::Running]),
            ("ext-2", &[ExternalStatus::Failed]),
        ]));
        let jobs = Arc::new(MemoryJobStore::default());

        let outcome = poller(api, Arc::clone(&jobs))
            .poll_until_complete(&[
                "ext-0".to_string(),
                "ext-1".to_string(),
                "ext-2".to_string(),
            ])
            .await;

        assert_eq!(outcome.completed, vec!["ext-0"]);
        assert_eq!(outcome.timed_out, vec!["ext-1"]);
        assert_eq!(outcome.failed, vec!["ext-2"]);
        assert_eq!(
            jobs.statuses.lock().unwrap().get("ext-2"),
            Some(&EnrichmentStatus::Failed)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_input_returns_immediately() {
        let api = Arc::new(MockEnrichment::default());
        let jobs = Arc::new(MemoryJobStore::default());

        let outcome = poller(api, jobs).poll_until_complete(&[]).await;

        assert!(outcome.completed.is_empty());
        assert!(outcome.timed_out.is_empty());
    }
}
