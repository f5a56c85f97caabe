//! Progress reporting
//!
//! Narrow interface pipeline stages use to emit progress without knowing
//! about persistence. The DB-backed reporter appends a log entry and
//! overwrites the job snapshot on every stage report; the no-op reporter
//! lets the identical pipeline code run in synchronous/CLI contexts where
//! no job row exists.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{error, warn};
use uuid::Uuid;

use clippings_core::domain::progress::{EventType, ProgressEntry, StageDetails};
use clippings_core::domain::stage::Stage;

use crate::repository::{job_repository, progress_repository};

/// Progress channel shared by core and handoff stages
///
/// Reporting is best-effort: a persistence hiccup is logged and swallowed
/// rather than failing the job it describes.
#[async_trait]
pub trait ProgressReporter: Send + Sync {
    /// Record a stage update and refresh the job's snapshot
    async fn report_stage(&self, stage: Stage, percentage: i16, details: StageDetails);

    /// Record a one-off event (retry, warning, info, error)
    async fn report_event(
        &self,
        event_type: EventType,
        message: &str,
        details: Option<serde_json::Value>,
    );

    /// Polled read of the job's cancellation flag
    async fn cancellation_requested(&self) -> bool;
}

/// Out-of-range percentages are programmer errors, not user input
pub(crate) fn assert_valid_percentage(percentage: i16) {
    assert!(
        (0..=100).contains(&percentage),
        "percentage must be within 0-100, got {percentage}"
    );
}

fn stage_message(stage: Stage, percentage: i16) -> String {
    let label = match stage {
        Stage::Filtering => "Filtering records",
        Stage::ContentFetching => "Fetching content",
        Stage::Summarization => "Generating summaries",
        Stage::PdfGeneration => "Rendering digest",
        Stage::EmailSending => "Sending email",
    };
    format!("{label} ({percentage}%)")
}

/// DB-backed reporter for one job
pub struct DbProgressReporter {
    pool: PgPool,
    job_id: Uuid,
}

impl DbProgressReporter {
    pub fn new(pool: PgPool, job_id: Uuid) -> Self {
        Self { pool, job_id }
    }
}

#[async_trait]
impl ProgressReporter for DbProgressReporter {
    async fn report_stage(&self, stage: Stage, percentage: i16, details: StageDetails) {
        assert_valid_percentage(percentage);

        let entry = ProgressEntry {
            job_id: self.job_id,
            stage: Some(stage),
            event_type: EventType::StageUpdate,
            percentage: Some(percentage),
            message: stage_message(stage, percentage),
            details: Some(details.into_value()),
            timestamp: chrono::Utc::now(),
        };

        if let Err(err) = progress_repository::append(&self.pool, &entry).await {
            error!("Failed to append progress entry for job {}: {}", self.job_id, err);
        }

        if let Err(err) =
            job_repository::update_snapshot(&self.pool, self.job_id, stage, percentage).await
        {
            error!("Failed to update snapshot for job {}: {}", self.job_id, err);
        }
    }

    async fn report_event(
        &self,
        event_type: EventType,
        message: &str,
        details: Option<serde_json::Value>,
    ) {
        let entry = ProgressEntry {
            job_id: self.job_id,
            stage: None,
            event_type,
            percentage: None,
            message: message.to_string(),
            details,
            timestamp: chrono::Utc::now(),
        };

        if let Err(err) = progress_repository::append(&self.pool, &entry).await {
            error!("Failed to append event for job {}: {}", self.job_id, err);
        }
    }

    async fn cancellation_requested(&self) -> bool {
        match job_repository::cancellation_requested(&self.pool, self.job_id).await {
            Ok(flag) => flag,
            Err(err) => {
                warn!("Failed to read cancellation flag for job {}: {}", self.job_id, err);
                false
            }
        }
    }
}

/// Reporter for contexts with no tracked job (CLI, tests)
pub struct NoopReporter;

#[async_trait]
impl ProgressReporter for NoopReporter {
    async fn report_stage(&self, _stage: Stage, percentage: i16, _details: StageDetails) {
        assert_valid_percentage(percentage);
    }

    async fn report_event(
        &self,
        _event_type: EventType,
        _message: &str,
        _details: Option<serde_json::Value>,
    ) {
    }

    async fn cancellation_requested(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_percentages_pass() {
        assert_valid_percentage(0);
        assert_valid_percentage(55);
        assert_valid_percentage(100);
    }

    #[test]
    #[should_panic(expected = "percentage must be within 0-100")]
    fn test_out_of_range_percentage_panics() {
        assert_valid_percentage(101);
    }

    #[tokio::test]
    async fn test_noop_reporter_never_cancels() {
        let reporter = NoopReporter;
        reporter
            .report_stage(
                Stage::Filtering,
                25,
                StageDetails::Filtering {
                    matched: 3,
                    missing_content: 1,
                },
            )
            .await;
        assert!(!reporter.cancellation_requested().await);
    }
}
