//! Batch submission to the enrichment service
//!
//! Splits the records needing content into fixed-size batches, caps the
//! batch count so a single digest cannot run up unbounded enrichment cost,
//! and submits each batch independently. Records beyond the cap are dropped
//! for this run — a policy, not an error.

use std::sync::Arc;

use tracing::{info, warn};

use clippings_client::EnrichmentApi;
use clippings_core::domain::enrichment::{EnrichmentJob, EnrichmentStatus};
use clippings_core::domain::record::Record;

use crate::service::store::EnrichmentJobStore;

/// Result of one submission round
#[derive(Debug, Default)]
pub struct SubmitOutcome {
    /// Batches attempted (after the cap)
    pub batch_count: usize,
    /// External job ids actually created; shorter than `batch_count` when
    /// some submissions failed
    pub external_job_ids: Vec<String>,
    /// Records beyond the batch cap, not submitted this run
    pub dropped_records: usize,
}

pub struct BatchSubmitter {
    api: Arc<dyn EnrichmentApi>,
    jobs: Arc<dyn EnrichmentJobStore>,
    batch_size: usize,
    max_batches: usize,
    max_retries: i32,
}

impl BatchSubmitter {
    pub fn new(
        api: Arc<dyn EnrichmentApi>,
        jobs: Arc<dyn EnrichmentJobStore>,
        batch_size: usize,
        max_batches: usize,
        max_retries: i32,
    ) -> Self {
        Self {
            api,
            jobs,
            batch_size,
            max_batches,
            max_retries,
        }
    }

    /// Submit records in bounded batches
    ///
    /// A submission failure for one batch is logged and skipped; sibling
    /// batches proceed. Every accepted batch is recorded as a pending
    /// enrichment job.
    pub async fn submit(&self, records: &[Record]) -> SubmitOutcome {
        if records.is_empty() {
            return SubmitOutcome::default();
        }

        let batches = chunk(records, self.batch_size, self.max_batches);
        let submitted_records: usize = batches.iter().map(|batch| batch.len()).sum();
        let dropped_records = records.len() - submitted_records;

        if dropped_records > 0 {
            warn!(
                "{} records beyond the {}-batch cap were not submitted",
                dropped_records, self.max_batches
            );
        }

        let mut external_job_ids = Vec::new();

        for (index, batch) in batches.iter().enumerate() {
            let urls: Vec<String> = batch.iter().map(|record| record.url.clone()).collect();

            match self.api.submit_batch(&urls).await {
                Ok(accepted) => {
                    info!(
                        "Submitted enrichment batch {}/{} ({} records) as {}",
                        index + 1,
                        batches.len(),
                        batch.len(),
                        accepted.job_id
                    );

                    let now = chrono::Utc::now();
                    let job = EnrichmentJob {
                        external_id: accepted.job_id.clone(),
                        record_ids: batch.iter().map(|record| record.id).collect(),
                        status: EnrichmentStatus::Pending,
                        retry_count: 0,
                        max_retries: self.max_retries,
                        error_message: None,
                        created_at: now,
                        updated_at: now,
                        completed_at: None,
                    };

                    if let Err(err) = self.jobs.create(&job).await {
                        warn!("Failed to record enrichment job {}: {err:#}", accepted.job_id);
                    }

                    external_job_ids.push(accepted.job_id);
                }
                Err(err) => {
                    warn!(
                        "Enrichment batch {}/{} submission failed, skipping: {err}",
                        index + 1,
                        batches.len()
                    );
                }
            }
        }

        SubmitOutcome {
            batch_count: batches.len(),
            external_job_ids,
            dropped_records,
        }
    }
}

/// Fixed-size batches, capped at `max_batches`
fn chunk(records: &[Record], batch_size: usize, max_batches: usize) -> Vec<&[Record]> {
    records.chunks(batch_size).take(max_batches).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testing::{MemoryJobStore, MockEnrichment, record};

    fn records(count: usize) -> Vec<Record> {
        (0..count)
            .map(|i| {
                record(
                    i as i64,
                    &format!("https://example.com/{i}"),
                    &format!("post {i}"),
                )
            })
            .collect()
    }

    fn submitter(api: Arc<MockEnrichment>, jobs: Arc<MemoryJobStore>) -> BatchSubmitter {
        BatchSubmitter::new(api, jobs, 15, 10, 3)
    }

    #[tokio::test]
    async fn test_fifty_records_make_four_batches() {
        let api = Arc::new(MockEnrichment::default());
        let jobs = Arc::new(MemoryJobStore::default());

        let outcome = submitter(Arc::clone(&api), Arc::clone(&jobs))
            .submit(&records(50))
            .await;

        let sizes: Vec<usize> = api
            .submitted
            .lock()
            .unwrap()
            .iter()
            .map(|batch| batch.len())
            .collect();
        assert_eq!(sizes, vec![15, 15, 15, 5]);
        assert_eq!(outcome.batch_count, 4);
        assert_eq!(outcome.external_job_ids.len(), 4);
        assert_eq!(outcome.dropped_records, 0);
    }

    #[tokio::test]
    async fn test_batch_cap_drops_overflow() {
        let api = Arc::new(MockEnrichment::default());
        let jobs = Arc::new(MemoryJobStore::default());

        let outcome = submitter(Arc::clone(&api), Arc::clone(&jobs))
            .submit(&records(161))
            .await;

        assert_eq!(outcome.batch_count, 10);
        assert_eq!(outcome.external_job_ids.len(), 10);
        assert_eq!(outcome.dropped_records, 11);

        let submitted: usize = api
            .submitted
            .lock()
            .unwrap()
            .iter()
            .map(|batch| batch.len())
            .sum();
        assert_eq!(submitted, 150);
    }

    #[tokio::test]
    async fn test_failed_batch_is_skipped_not_fatal() {
        let api = Arc::new(MockEnrichment {
            fail_batches: vec![1],
            ..Default::default()
        });
        let jobs = Arc::new(MemoryJobStore::default());

        let outcome = submitter(Arc::clone(&api), Arc::clone(&jobs))
            .submit(&records(50))
            .await;

        assert_eq!(outcome.batch_count, 4);
        assert_eq!(outcome.external_job_ids.len(), 3);

        // Only accepted batches become enrichment job rows
        assert_eq!(jobs.created.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_empty_input_submits_nothing() {
        let api = Arc::new(MockEnrichment::default());
        let jobs = Arc::new(MemoryJobStore::default());

        let outcome = submitter(Arc::clone(&api), jobs).submit(&[]).await;

        assert_eq!(outcome.batch_count, 0);
        assert!(api.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_created_jobs_carry_record_ids() {
        let api = Arc::new(MockEnrichment::default());
        let jobs = Arc::new(MemoryJobStore::default());

        submitter(Arc::clone(&api), Arc::clone(&jobs))
            .submit(&records(20))
            .await;

        let created = jobs.created.lock().unwrap();
        assert_eq!(created.len(), 2);
        assert_eq!(created[0].record_ids.len(), 15);
        assert_eq!(created[1].record_ids.len(), 5);
        assert_eq!(created[0].status, EnrichmentStatus::Pending);
    }
}
