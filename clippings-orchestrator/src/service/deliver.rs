//! Digest delivery handoff
//!
//! The render/deliver stages (pdf_generation, email_sending) are external
//! collaborators: the core hands them the assembled digest and they report
//! the 80-100% band through the same progress channel as the core stages.
//! `ArtifactWriter` is the in-tree implementation; PDF layout and SMTP
//! transport plug in behind the same trait.

use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use tracing::info;

use clippings_core::domain::job::DigestJob;
use clippings_core::domain::progress::{EventType, StageDetails};
use clippings_core::domain::stage::Stage;

use crate::service::pipeline::DigestOutput;
use crate::service::progress::ProgressReporter;

/// Render/deliver collaborator seam
#[async_trait]
pub trait DigestDelivery: Send + Sync {
    /// Consume the digest, produce an artifact, and hand it to delivery
    ///
    /// Returns the artifact reference stored on the job row.
    async fn deliver(
        &self,
        job: &DigestJob,
        output: &DigestOutput,
        reporter: &dyn ProgressReporter,
    ) -> anyhow::Result<String>;
}

/// Writes the digest as a JSON artifact on local disk
pub struct ArtifactWriter {
    dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl DigestDelivery for ArtifactWriter {
    async fn deliver(
        &self,
        job: &DigestJob,
        output: &DigestOutput,
        reporter: &dyn ProgressReporter,
    ) -> anyhow::Result<String> {
        let filename = format!("digest_{}_{}.json", job.date_end, job.id);
        let path = self.dir.join(filename);
        let path_str = path.to_string_lossy().into_owned();

        reporter
            .report_stage(
                Stage::PdfGeneration,
                80,
                StageDetails::PdfGeneration {
                    artifact_path: path_str.clone(),
                },
            )
            .await;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create artifact dir {}", self.dir.display()))?;

        let body = serde_json::to_vec_pretty(output).context("Failed to serialize digest")?;
        tokio::fs::write(&path, body)
            .await
            .with_context(|| format!("Failed to write artifact {path_str}"))?;

        info!("Digest artifact written to {path_str}");
        reporter
            .report_stage(
                Stage::PdfGeneration,
                95,
                StageDetails::PdfGeneration {
                    artifact_path: path_str.clone(),
                },
            )
            .await;

        if let Some(recipient) = &job.deliver_to {
            reporter
                .report_stage(
                    Stage::EmailSending,
                    95,
                    StageDetails::EmailSending {
                        recipient: recipient.clone(),
                    },
                )
                .await;

            // The transport itself lives outside the core; the artifact is
            // handed off by reference.
            reporter
                .report_event(
                    EventType::Info,
                    &format!("Digest queued for delivery to {recipient}"),
                    None,
                )
                .await;

            reporter
                .report_stage(
                    Stage::EmailSending,
                    100,
                    StageDetails::EmailSending {
                        recipient: recipient.clone(),
                    },
                )
                .await;
        }

        Ok(path_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testing::TestReporter;
    use chrono::NaiveDate;
    use clippings_core::domain::job::JobStatus;
    use uuid::Uuid;

    fn job(deliver_to: Option<&str>) -> DigestJob {
        DigestJob {
            id: Uuid::new_v4(),
            keywords: vec!["rust".to_string()],
            date_start: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            date_end: NaiveDate::from_ymd_opt(2025, 8, 1).unwrap(),
            deliver_to: deliver_to.map(|s| s.to_string()),
            status: JobStatus::Processing,
            current_stage: None,
            current_percentage: 80,
            cancellation_requested: false,
            artifact_path: None,
            error_message: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    fn output() -> DigestOutput {
        DigestOutput {
            keywords: vec!["rust".to_string()],
            date_start: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            date_end: NaiveDate::from_ymd_opt(2025, 8, 1).unwrap(),
            overview: "an overview".to_string(),
            items: Vec::new(),
            fetched_count: 0,
            unavailable_count: 0,
        }
    }

    #[tokio::test]
    async fn test_artifact_written_and_path_returned() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ArtifactWriter::new(dir.path());
        let reporter = TestReporter::default();

        let path = writer
            .deliver(&job(None), &output(), &reporter)
            .await
            .unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("an overview"));

        // No recipient: the email stage is skipped entirely
        let stages = reporter.stages.lock().unwrap();
        assert!(stages.iter().all(|(stage, _)| *stage == Stage::PdfGeneration));
    }

    #[tokio::test]
    async fn test_delivery_reports_full_band_with_recipient() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ArtifactWriter::new(dir.path());
        let reporter = TestReporter::default();

        writer
            .deliver(&job(Some("reader@kindle.com")), &output(), &reporter)
            .await
            .unwrap();

        let percentages = reporter.reported_percentages();
        assert_eq!(*percentages.last().unwrap(), 100);
        assert!(percentages.windows(2).all(|w| w[0] <= w[1]));
    }
}
