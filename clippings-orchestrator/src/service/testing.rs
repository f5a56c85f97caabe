//! In-memory test doubles for the service layer
//!
//! Shared by the batch/poll/merge/pipeline tests so each module does not
//! re-declare its own mocks.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;

use clippings_client::{ClientError, EnrichmentApi, GenerationApi};
use clippings_core::domain::enrichment::{EnrichmentJob, EnrichmentStatus};
use clippings_core::domain::progress::{EventType, StageDetails};
use clippings_core::domain::record::{ContentState, Record};
use clippings_core::domain::stage::Stage;
use clippings_core::dto::enrichment::{BatchAccepted, ExternalStatus, ResultItem, StatusResponse};

use crate::service::progress::ProgressReporter;
use crate::service::store::{EnrichmentJobStore, RecordStore};

pub(crate) fn record(id: i64, url: &str, title: &str) -> Record {
    Record {
        id,
        url: url.to_string(),
        title: title.to_string(),
        tags: Vec::new(),
        excerpt: None,
        saved_at: chrono::Utc::now(),
        content: ContentState::NotAttempted,
    }
}

// =============================================================================
// Enrichment API double
// =============================================================================

#[derive(Default)]
pub(crate) struct MockEnrichment {
    /// Batches received by submit_batch, in call order
    pub submitted: Mutex<Vec<Vec<String>>>,
    /// 0-based batch indexes whose submission fails
    pub fail_batches: Vec<usize>,
    /// Scripted status sequences per external id; the last entry repeats
    pub statuses: Mutex<HashMap<String, Vec<ExternalStatus>>>,
    /// Result items per external id
    pub results: HashMap<String, Vec<ResultItem>>,
    /// External ids whose get_result call errors
    pub failing_results: Vec<String>,
}

impl MockEnrichment {
    pub fn with_statuses(statuses: &[(&str, &[ExternalStatus])]) -> Self {
        Self {
            statuses: Mutex::new(
                statuses
                    .iter()
                    .map(|(id, seq)| (id.to_string(), seq.to_vec()))
                    .collect(),
            ),
            ..Default::default()
        }
    }
}

#[async_trait]
impl EnrichmentApi for MockEnrichment {
    async fn submit_batch(&self, urls: &[String]) -> Result<BatchAccepted, ClientError> {
        let mut submitted = self.submitted.lock().unwrap();
        let index = submitted.len();
        submitted.push(urls.to_vec());

        if self.fail_batches.contains(&index) {
            return Err(ClientError::api_error(500, "submission failed"));
        }

        Ok(BatchAccepted {
            job_id: format!("ext-{index}"),
        })
    }

    async fn get_status(&self, external_id: &str) -> Result<StatusResponse, ClientError> {
        let mut statuses = self.statuses.lock().unwrap();
        let status = match statuses.get_mut(external_id) {
            Some(sequence) if sequence.len() > 1 => sequence.remove(0),
            Some(sequence) => sequence.first().copied().unwrap_or(ExternalStatus::Running),
            None => ExternalStatus::Running,
        };

        Ok(StatusResponse {
            job_id: external_id.to_string(),
            status,
            error: None,
        })
    }

    async fn get_result(&self, external_id: &str) -> Result<Vec<ResultItem>, ClientError> {
        if self.failing_results.iter().any(|id| id == external_id) {
            return Err(ClientError::api_error(500, "result fetch failed"));
        }

        Ok(self.results.get(external_id).cloned().unwrap_or_default())
    }

    async fn cancel(&self, _external_id: &str) -> Result<(), ClientError> {
        Ok(())
    }
}

// =============================================================================
// Generation API double
// =============================================================================

/// Scripted generation responses, consumed in call order; once the queue is
/// empty the default applies.
pub(crate) struct MockGeneration {
    pub responses: Mutex<Vec<Result<String, ClientError>>>,
    pub default: Result<String, u16>,
}

impl MockGeneration {
    pub fn always(text: &str) -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            default: Ok(text.to_string()),
        }
    }

    pub fn always_failing(status: u16) -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            default: Err(status),
        }
    }
}

#[async_trait]
impl GenerationApi for MockGeneration {
    async fn complete(&self, _prompt: &str) -> Result<String, ClientError> {
        let mut responses = self.responses.lock().unwrap();
        if !responses.is_empty() {
            return responses.remove(0);
        }

        match &self.default {
            Ok(text) => Ok(text.clone()),
            Err(status) => Err(ClientError::api_error(*status, "generation failed")),
        }
    }
}

// =============================================================================
// Store doubles
// =============================================================================

#[derive(Default)]
pub(crate) struct MemoryJobStore {
    pub created: Mutex<Vec<EnrichmentJob>>,
    pub statuses: Mutex<HashMap<String, EnrichmentStatus>>,
}

#[async_trait]
impl EnrichmentJobStore for MemoryJobStore {
    async fn create(&self, job: &EnrichmentJob) -> anyhow::Result<()> {
        self.created.lock().unwrap().push(job.clone());
        self.statuses
            .lock()
            .unwrap()
            .insert(job.external_id.clone(), job.status);
        Ok(())
    }

    async fn mark_running(&self, external_id: &str) -> anyhow::Result<()> {
        self.statuses
            .lock()
            .unwrap()
            .insert(external_id.to_string(), EnrichmentStatus::Running);
        Ok(())
    }

    async fn mark_success(&self, external_id: &str) -> anyhow::Result<()> {
        self.statuses
            .lock()
            .unwrap()
            .insert(external_id.to_string(), EnrichmentStatus::Success);
        Ok(())
    }

    async fn mark_failed(&self, external_id: &str, _error_message: &str) -> anyhow::Result<()> {
        self.statuses
            .lock()
            .unwrap()
            .insert(external_id.to_string(), EnrichmentStatus::Failed);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct MemoryRecordStore {
    pub records: Mutex<Vec<Record>>,
    pub fetched: Mutex<Vec<i64>>,
    pub unavailable: Mutex<Vec<i64>>,
}

impl MemoryRecordStore {
    pub fn with_records(records: Vec<Record>) -> Self {
        Self {
            records: Mutex::new(records),
            ..Default::default()
        }
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn find_by_date_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> anyhow::Result<Vec<Record>> {
        let records = self.records.lock().unwrap();
        Ok(records
            .iter()
            .filter(|r| {
                let date = r.saved_at.date_naive();
                date >= start && date <= end
            })
            .cloned()
            .collect())
    }

    async fn mark_fetched(
        &self,
        record_id: i64,
        _text: &str,
        _fetched_at: chrono::DateTime<chrono::Utc>,
    ) -> anyhow::Result<()> {
        self.fetched.lock().unwrap().push(record_id);
        Ok(())
    }

    async fn mark_unavailable(&self, record_id: i64) -> anyhow::Result<()> {
        self.unavailable.lock().unwrap().push(record_id);
        Ok(())
    }
}

// =============================================================================
// Progress reporter double
// =============================================================================

#[derive(Default)]
pub(crate) struct TestReporter {
    pub stages: Mutex<Vec<(Stage, i16)>>,
    pub events: Mutex<Vec<(EventType, String)>>,
    pub cancel_flag: AtomicBool,
}

impl TestReporter {
    pub fn cancelled() -> Self {
        let reporter = Self::default();
        reporter.cancel_flag.store(true, Ordering::SeqCst);
        reporter
    }

    pub fn reported_percentages(&self) -> Vec<i16> {
        self.stages.lock().unwrap().iter().map(|(_, p)| *p).collect()
    }
}

#[async_trait]
impl ProgressReporter for TestReporter {
    async fn report_stage(&self, stage: Stage, percentage: i16, _details: StageDetails) {
        crate::service::progress::assert_valid_percentage(percentage);
        self.stages.lock().unwrap().push((stage, percentage));
    }

    async fn report_event(
        &self,
        event_type: EventType,
        message: &str,
        _details: Option<serde_json::Value>,
    ) {
        self.events
            .lock()
            .unwrap()
            .push((event_type, message.to_string()));
    }

    async fn cancellation_requested(&self) -> bool {
        self.cancel_flag.load(Ordering::SeqCst)
    }
}
