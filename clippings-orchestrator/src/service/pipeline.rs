//! Pipeline orchestration
//!
//! Drives the stage sequence for one digest job:
//! filtering (0-25%) -> content_fetching (25-40%) -> summarization (40-80%),
//! then hands the assembled digest to the render/deliver collaborators for
//! the 80-100% band.
//!
//! Cancellation is cooperative: the flag is checked at every stage entry
//! and an in-flight network call is never aborted.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use clippings_client::GenerationApi;
use clippings_core::domain::job::DigestJob;
use clippings_core::domain::progress::{EventType, StageDetails};
use clippings_core::domain::record::Record;
use clippings_core::domain::stage::Stage;

use crate::service::batch::BatchSubmitter;
use crate::service::merge::ResultMerger;
use crate::service::poll::CompletionPoller;
use crate::service::progress::ProgressReporter;
use crate::service::retry::RetryPolicy;
use crate::service::store::RecordStore;

/// Placeholder carried by items whose summary could not be produced
pub const SUMMARY_UNAVAILABLE: &str = "summary unavailable";

/// Errors that abort a digest run
#[derive(Debug)]
pub enum StageError {
    /// Cancellation flag observed at a stage boundary
    Cancelled,
    /// Filtering matched no records
    NoMatches,
    /// Every per-record summary failed
    EmptySummaries,
    /// The required digest overview could not be generated
    OverviewFailed,
    /// Record source failure
    Store(anyhow::Error),
}

impl std::fmt::Display for StageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageError::Cancelled => write!(f, "cancelled at stage boundary"),
            StageError::NoMatches => write!(f, "no records matched the filter"),
            StageError::EmptySummaries => {
                write!(f, "summarization produced no usable summaries")
            }
            StageError::OverviewFailed => {
                write!(f, "digest overview generation failed after retries")
            }
            StageError::Store(err) => write!(f, "record store error: {err:#}"),
        }
    }
}

impl std::error::Error for StageError {}

/// Assembled digest handed to the render/deliver stages
#[derive(Debug, Clone, Serialize)]
pub struct DigestOutput {
    pub keywords: Vec<String>,
    pub date_start: NaiveDate,
    pub date_end: NaiveDate,
    pub overview: String,
    pub items: Vec<DigestItem>,
    pub fetched_count: usize,
    pub unavailable_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DigestItem {
    pub record_id: i64,
    pub url: String,
    pub title: String,
    pub summary: String,
}

pub struct PipelineOrchestrator {
    records: Arc<dyn RecordStore>,
    submitter: BatchSubmitter,
    poller: CompletionPoller,
    merger: ResultMerger,
    generation: Arc<dyn GenerationApi>,
    retry: RetryPolicy,
}

impl PipelineOrchestrator {
    pub fn new(
        records: Arc<dyn RecordStore>,
        submitter: BatchSubmitter,
        poller: CompletionPoller,
        merger: ResultMerger,
        generation: Arc<dyn GenerationApi>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            records,
            submitter,
            poller,
            merger,
            generation,
            retry,
        }
    }

    /// Drive the full stage sequence for one job
    pub async fn run(
        &self,
        job: &DigestJob,
        reporter: &dyn ProgressReporter,
    ) -> Result<DigestOutput, StageError> {
        self.ensure_not_cancelled(reporter).await?;
        let mut records = self.stage_filter(job, reporter).await?;

        self.ensure_not_cancelled(reporter).await?;
        self.stage_fetch_content(&mut records, reporter).await;

        self.ensure_not_cancelled(reporter).await?;
        self.stage_summarize(job, &records, reporter).await
    }

    async fn ensure_not_cancelled(
        &self,
        reporter: &dyn ProgressReporter,
    ) -> Result<(), StageError> {
        if reporter.cancellation_requested().await {
            info!("Cancellation requested; stopping before the next stage");
            reporter
                .report_event(
                    EventType::Info,
                    "Cancellation requested; stopping before the next stage",
                    None,
                )
                .await;
            return Err(StageError::Cancelled);
        }
        Ok(())
    }

    /// Filtering: 0-25%. Zero matches aborts the job.
    async fn stage_filter(
        &self,
        job: &DigestJob,
        reporter: &dyn ProgressReporter,
    ) -> Result<Vec<Record>, StageError> {
        reporter
            .report_stage(
                Stage::Filtering,
                0,
                StageDetails::Filtering {
                    matched: 0,
                    missing_content: 0,
                },
            )
            .await;

        let all = self
            .records
            .find_by_date_range(job.date_start, job.date_end)
            .await
            .map_err(StageError::Store)?;

        let matched: Vec<Record> = all
            .into_iter()
            .filter(|record| record.matches_keywords(&job.keywords))
            .collect();

        if matched.is_empty() {
            return Err(StageError::NoMatches);
        }

        let missing_content = matched
            .iter()
            .filter(|record| record.content.needs_fetch())
            .count();

        info!(
            "Filtered {} record(s) for keywords {:?} ({} without content)",
            matched.len(),
            job.keywords,
            missing_content
        );

        reporter
            .report_stage(
                Stage::Filtering,
                25,
                StageDetails::Filtering {
                    matched: matched.len(),
                    missing_content,
                },
            )
            .await;

        Ok(matched)
    }

    /// Content fetching: 25-40%. Failures here are non-fatal; records
    /// without content are carried forward unresolved.
    async fn stage_fetch_content(&self, records: &mut [Record], reporter: &dyn ProgressReporter) {
        let needing: Vec<Record> = records
            .iter()
            .filter(|record| record.content.needs_fetch())
            .cloned()
            .collect();

        reporter
            .report_stage(
                Stage::ContentFetching,
                25,
                StageDetails::ContentFetching {
                    batches: 0,
                    submitted: 0,
                    completed: 0,
                    timed_out: 0,
                },
            )
            .await;

        if needing.is_empty() {
            info!("All filtered records already have content");
            reporter
                .report_stage(
                    Stage::ContentFetching,
                    40,
                    StageDetails::ContentFetching {
                        batches: 0,
                        submitted: 0,
                        completed: 0,
                        timed_out: 0,
                    },
                )
                .await;
            return;
        }

        let submitted = self.submitter.submit(&needing).await;

        if submitted.dropped_records > 0 {
            reporter
                .report_event(
                    EventType::Warning,
                    &format!(
                        "{} record(s) beyond the batch cap were not submitted this run",
                        submitted.dropped_records
                    ),
                    None,
                )
                .await;
        }

        reporter
            .report_stage(
                Stage::ContentFetching,
                30,
                StageDetails::ContentFetching {
                    batches: submitted.batch_count,
                    submitted: submitted.external_job_ids.len(),
                    completed: 0,
                    timed_out: 0,
                },
            )
            .await;

        let polled = self.poller.poll_until_complete(&submitted.external_job_ids).await;

        for external_id in &polled.timed_out {
            reporter
                .report_event(
                    EventType::Warning,
                    &format!("Enrichment job {external_id} timed out; continuing without it"),
                    None,
                )
                .await;
        }

        reporter
            .report_stage(
                Stage::ContentFetching,
                35,
                StageDetails::ContentFetching {
                    batches: submitted.batch_count,
                    submitted: submitted.external_job_ids.len(),
                    completed: polled.completed.len(),
                    timed_out: polled.timed_out.len(),
                },
            )
            .await;

        self.merger.merge(&polled.completed, records, reporter).await;

        reporter
            .report_stage(
                Stage::ContentFetching,
                40,
                StageDetails::ContentFetching {
                    batches: submitted.batch_count,
                    submitted: submitted.external_job_ids.len(),
                    completed: polled.completed.len(),
                    timed_out: polled.timed_out.len(),
                },
            )
            .await;
    }

    /// Summarization: 40-80%. Per-record failures are tolerated with a
    /// placeholder; an entirely empty result set is a stage failure. The
    /// digest overview is required.
    async fn stage_summarize(
        &self,
        job: &DigestJob,
        records: &[Record],
        reporter: &dyn ProgressReporter,
    ) -> Result<DigestOutput, StageError> {
        let (span_start, span_end) = Stage::Summarization.span();
        let total = records.len();

        reporter
            .report_stage(
                Stage::Summarization,
                span_start,
                StageDetails::Summarization {
                    total,
                    done: 0,
                    failed: 0,
                },
            )
            .await;

        let mut items = Vec::with_capacity(total);
        let mut failed = 0;

        for (index, record) in records.iter().enumerate() {
            let summary = match record.content.text() {
                Some(text) => {
                    let prompt = item_prompt(record, text);
                    let generation = Arc::clone(&self.generation);

                    match self
                        .retry
                        .run("record summary", reporter, move || {
                            let generation = Arc::clone(&generation);
                            let prompt = prompt.clone();
                            async move { generation.complete(&prompt).await }
                        })
                        .await
                    {
                        Some(summary) => summary,
                        None => {
                            failed += 1;
                            SUMMARY_UNAVAILABLE.to_string()
                        }
                    }
                }
                None => {
                    failed += 1;
                    SUMMARY_UNAVAILABLE.to_string()
                }
            };

            items.push(DigestItem {
                record_id: record.id,
                url: record.url.clone(),
                title: record.title.clone(),
                summary,
            });

            let done = index + 1;
            let percentage =
                span_start + ((span_end - span_start) as usize * done / total) as i16;
            reporter
                .report_stage(
                    Stage::Summarization,
                    percentage,
                    StageDetails::Summarization {
                        total,
                        done,
                        failed,
                    },
                )
                .await;
        }

        if items.iter().all(|item| item.summary == SUMMARY_UNAVAILABLE) {
            return Err(StageError::EmptySummaries);
        }

        let overview_prompt = overview_prompt(&job.keywords, records);
        let generation = Arc::clone(&self.generation);
        let overview = self
            .retry
            .run("digest overview", reporter, move || {
                let generation = Arc::clone(&generation);
                let prompt = overview_prompt.clone();
                async move { generation.complete(&prompt).await }
            })
            .await
            .ok_or(StageError::OverviewFailed)?;

        let fetched_count = records
            .iter()
            .filter(|record| record.content.text().is_some())
            .count();
        let unavailable_count = records
            .iter()
            .filter(|record| !record.content.needs_fetch() && record.content.text().is_none())
            .count();

        info!(
            "Summarization finished: {}/{} summaries, {} failed",
            total - failed,
            total,
            failed
        );

        Ok(DigestOutput {
            keywords: job.keywords.clone(),
            date_start: job.date_start,
            date_end: job.date_end,
            overview,
            items,
            fetched_count,
            unavailable_count,
        })
    }
}

/// Per-record summary prompt; long content is truncated
fn item_prompt(record: &Record, text: &str) -> String {
    let truncated: String = text.chars().take(3000).collect();
    format!(
        "Summarize the following article in a few concise bullet points.\n\n\
         Title: {}\n\n---\n{}\n---\n\nSummary:",
        record.title, truncated
    )
}

/// Overview prompt over all filtered records
fn overview_prompt(keywords: &[String], records: &[Record]) -> String {
    let context: Vec<String> = records
        .iter()
        .map(|record| {
            let mut lines = vec![format!("Title: {}", record.title)];
            if let Some(excerpt) = &record.excerpt {
                lines.push(format!("Excerpt: {excerpt}"));
            }
            lines.push(format!("URL: {}", record.url));
            lines.join("\n")
        })
        .collect();

    format!(
        "Analyze the saved articles below for the \"{}\" topic area and write \
         a short overview covering the trends, key points, and practical \
         takeaways.\n\n{}",
        keywords.join(", "),
        context.join("\n---\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testing::{
        MemoryJobStore, MemoryRecordStore, MockEnrichment, MockGeneration, TestReporter, record,
    };
    use clippings_core::domain::job::JobStatus;
    use clippings_core::domain::record::ContentState;
    use clippings_core::dto::enrichment::{ExternalStatus, ResultBody, ResultItem};
    use std::collections::HashMap;
    use std::time::Duration;
    use uuid::Uuid;

    fn job() -> DigestJob {
        let today = chrono::Utc::now().date_naive();
        DigestJob {
            id: Uuid::new_v4(),
            keywords: vec!["rust".to_string()],
            date_start: today - chrono::Days::new(30),
            date_end: today,
            deliver_to: None,
            status: JobStatus::Processing,
            current_stage: None,
            current_percentage: 0,
            cancellation_requested: false,
            artifact_path: None,
            error_message: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    fn fetched(mut r: Record, text: &str) -> Record {
        r.content = ContentState::Fetched {
            text: text.to_string(),
            fetched_at: chrono::Utc::now(),
        };
        r
    }

    fn orchestrator(
        api: Arc<MockEnrichment>,
        records: Arc<MemoryRecordStore>,
        generation: Arc<MockGeneration>,
    ) -> PipelineOrchestrator {
        let jobs = Arc::new(MemoryJobStore::default());
        let submitter = BatchSubmitter::new(api.clone(), jobs.clone(), 15, 10, 3);
        let poller = CompletionPoller::new(
            api.clone(),
            jobs,
            Duration::from_secs(10),
            Duration::from_secs(2),
            4,
        );
        let merger = ResultMerger::new(api, records.clone());

        PipelineOrchestrator::new(
            records,
            submitter,
            poller,
            merger,
            generation,
            RetryPolicy::new(1, Duration::from_secs(1)),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_run_produces_digest() {
        let api = Arc::new(MockEnrichment {
            statuses: std::sync::Mutex::new(HashMap::from([(
                "ext-0".to_string(),
                vec![ExternalStatus::Completed],
            )])),
            results: HashMap::from([(
                "ext-0".to_string(),
                vec![ResultItem {
                    external_id: "https://example.com/rust-post".to_string(),
                    body: ResultBody {
                        content: Some("all about rust".to_string()),
                    },
                }],
            )]),
            ..Default::default()
        });
        let store = Arc::new(MemoryRecordStore::with_records(vec![
            record(1, "https://example.com/rust-post", "Learning Rust"),
            record(2, "https://example.com/gardening", "Gardening tips"),
        ]));
        let generation = Arc::new(MockGeneration::always("generated text"));
        let reporter = TestReporter::default();

        let output = orchestrator(api, store, generation)
            .run(&job(), &reporter)
            .await
            .unwrap();

        // Only the keyword match made it through filtering
        assert_eq!(output.items.len(), 1);
        assert_eq!(output.items[0].summary, "generated text");
        assert_eq!(output.overview, "generated text");
        assert_eq!(output.fetched_count, 1);

        // Percentages never move backwards while the job runs
        let percentages = reporter.reported_percentages();
        assert!(percentages.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*percentages.last().unwrap(), 80);
    }

    #[tokio::test]
    async fn test_no_matches_fails_the_job() {
        let api = Arc::new(MockEnrichment::default());
        let store = Arc::new(MemoryRecordStore::with_records(vec![record(
            1,
            "https://example.com/gardening",
            "Gardening tips",
        )]));
        let generation = Arc::new(MockGeneration::always("text"));
        let reporter = TestReporter::default();

        let result = orchestrator(api, store, generation)
            .run(&job(), &reporter)
            .await;

        assert!(matches!(result, Err(StageError::NoMatches)));
    }

    #[tokio::test]
    async fn test_cancellation_stops_before_any_stage() {
        let api = Arc::new(MockEnrichment::default());
        let store = Arc::new(MemoryRecordStore::with_records(vec![record(
            1,
            "https://example.com/rust",
            "Rust post",
        )]));
        let generation = Arc::new(MockGeneration::always("text"));
        let reporter = TestReporter::cancelled();

        let result = orchestrator(api, Arc::clone(&store), generation)
            .run(&job(), &reporter)
            .await;

        assert!(matches!(result, Err(StageError::Cancelled)));
        // No stage ever ran
        assert!(reporter.stages.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_records_with_content_skip_fetching() {
        let api = Arc::new(MockEnrichment::default());
        let store = Arc::new(MemoryRecordStore::with_records(vec![fetched(
            record(1, "https://example.com/rust", "Rust post"),
            "existing content",
        )]));
        let generation = Arc::new(MockGeneration::always("sum"));
        let reporter = TestReporter::default();

        let output = orchestrator(Arc::clone(&api), store, generation)
            .run(&job(), &reporter)
            .await
            .unwrap();

        assert!(api.submitted.lock().unwrap().is_empty());
        assert_eq!(output.items[0].summary, "sum");
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_summaries_failing_escalates() {
        let api = Arc::new(MockEnrichment::default());
        let store = Arc::new(MemoryRecordStore::with_records(vec![fetched(
            record(1, "https://example.com/rust", "Rust post"),
            "content",
        )]));
        // Non-transient failure: retry policy gives up immediately per item
        let generation = Arc::new(MockGeneration::always_failing(400));
        let reporter = TestReporter::default();

        let result = orchestrator(api, store, generation)
            .run(&job(), &reporter)
            .await;

        assert!(matches!(result, Err(StageError::EmptySummaries)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_overview_failure_escalates() {
        let api = Arc::new(MockEnrichment::default());
        let store = Arc::new(MemoryRecordStore::with_records(vec![fetched(
            record(1, "https://example.com/rust", "Rust post"),
            "content",
        )]));
        // First call (the item summary) succeeds, the overview call fails
        let generation = Arc::new(MockGeneration {
            responses: std::sync::Mutex::new(vec![Ok("item summary".to_string())]),
            default: Err(400),
        });
        let reporter = TestReporter::default();

        let result = orchestrator(api, store, generation)
            .run(&job(), &reporter)
            .await;

        assert!(matches!(result, Err(StageError::OverviewFailed)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_item_failure_substitutes_placeholder() {
        let api = Arc::new(MockEnrichment::default());
        let store = Arc::new(MemoryRecordStore::with_records(vec![
            fetched(record(1, "https://example.com/rust-a", "Rust A"), "content a"),
            fetched(record(2, "https://example.com/rust-b", "Rust B"), "content b"),
        ]));
        // First item fails permanently, second item and overview succeed
        let generation = Arc::new(MockGeneration {
            responses: std::sync::Mutex::new(vec![
                Err(clippings_client::ClientError::api_error(400, "nope")),
                Ok("summary b".to_string()),
                Ok("overview".to_string()),
            ]),
            default: Ok("unused".to_string()),
        });
        let reporter = TestReporter::default();

        let output = orchestrator(api, store, generation)
            .run(&job(), &reporter)
            .await
            .unwrap();

        assert_eq!(output.items[0].summary, SUMMARY_UNAVAILABLE);
        assert_eq!(output.items[1].summary, "summary b");
        assert_eq!(output.overview, "overview");
    }
}
