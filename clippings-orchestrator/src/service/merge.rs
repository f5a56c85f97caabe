//! Result merging
//!
//! Fetches the result items of completed enrichment jobs and merges the
//! extracted text back into the caller's records. A match with empty or
//! missing content gets the explicit unavailable marker — never left merely
//! blank — so it stays distinguishable from a record that was never
//! processed.

use std::sync::Arc;

use tracing::{info, warn};

use clippings_client::EnrichmentApi;
use clippings_core::domain::progress::EventType;
use clippings_core::domain::record::{ContentState, Record};

use crate::service::progress::ProgressReporter;
use crate::service::store::RecordStore;

/// Per-invocation merge counters
#[derive(Debug, Default)]
pub struct MergeOutcome {
    /// Records that received content
    pub success_count: usize,
    /// Records explicitly marked unavailable
    pub failure_count: usize,
}

pub struct ResultMerger {
    api: Arc<dyn EnrichmentApi>,
    records: Arc<dyn RecordStore>,
}

impl ResultMerger {
    pub fn new(api: Arc<dyn EnrichmentApi>, records: Arc<dyn RecordStore>) -> Self {
        Self { api, records }
    }

    /// Merge results of completed external jobs into `records`
    ///
    /// Items are matched to records by URL; unmatched items are ignored. A
    /// result-fetch error for one job skips that job only. Emits one
    /// summary event per invocation.
    pub async fn merge(
        &self,
        external_ids: &[String],
        records: &mut [Record],
        reporter: &dyn ProgressReporter,
    ) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();

        for external_id in external_ids {
            let items = match self.api.get_result(external_id).await {
                Ok(items) => items,
                Err(err) => {
                    warn!("Failed to fetch results for enrichment job {external_id}: {err}");
                    continue;
                }
            };

            if items.is_empty() {
                warn!("Enrichment job {external_id} returned no items");
                continue;
            }

            for item in items {
                let Some(record) = records
                    .iter_mut()
                    .find(|record| record.url == item.external_id)
                else {
                    continue;
                };

                match item.content() {
                    Some(text) => {
                        let fetched_at = chrono::Utc::now();
                        record.content = ContentState::Fetched {
                            text: text.to_string(),
                            fetched_at,
                        };

                        if let Err(err) =
                            self.records.mark_fetched(record.id, text, fetched_at).await
                        {
                            warn!("Failed to persist content for record {}: {err:#}", record.id);
                        }

                        outcome.success_count += 1;
                    }
                    None => {
                        record.content = ContentState::Unavailable;

                        if let Err(err) = self.records.mark_unavailable(record.id).await {
                            warn!(
                                "Failed to mark record {} unavailable: {err:#}",
                                record.id
                            );
                        }

                        outcome.failure_count += 1;
                    }
                }
            }
        }

        info!(
            "Merged enrichment results: {} fetched, {} unavailable",
            outcome.success_count, outcome.failure_count
        );
        reporter
            .report_event(
                EventType::Info,
                &format!(
                    "Merged enrichment results: {} fetched, {} unavailable",
                    outcome.success_count, outcome.failure_count
                ),
                None,
            )
            .await;

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testing::{MemoryRecordStore, MockEnrichment, TestReporter, record};
    use clippings_core::dto::enrichment::{ResultBody, ResultItem};
    use std::collections::HashMap;

    fn item(url: &str, content: Option<&str>) -> ResultItem {
        ResultItem {
            external_id: url.to_string(),
            body: ResultBody {
                content: content.map(|c| c.to_string()),
            },
        }
    }

    #[tokio::test]
    async fn test_content_merges_into_matching_record() {
        let api = Arc::new(MockEnrichment {
            results: HashMap::from([(
                "ext-0".to_string(),
                vec![item("https://example.com/a", Some("full article text"))],
            )]),
            ..Default::default()
        });
        let store = Arc::new(MemoryRecordStore::default());
        let reporter = TestReporter::default();

        let mut records = vec![record(1, "https://example.com/a", "a")];
        let outcome = ResultMerger::new(api, store.clone())
            .merge(&["ext-0".to_string()], &mut records, &reporter)
            .await;

        assert_eq!(outcome.success_count, 1);
        assert_eq!(outcome.failure_count, 0);
        assert_eq!(records[0].content.text(), Some("full article text"));
        assert_eq!(*store.fetched.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_empty_content_marks_unavailable() {
        let api = Arc::new(MockEnrichment {
            results: HashMap::from([(
                "ext-0".to_string(),
                vec![
                    item("https://example.com/a", Some("   ")),
                    item("https://example.com/b", None),
                ],
            )]),
            ..Default::default()
        });
        let store = Arc::new(MemoryRecordStore::default());
        let reporter = TestReporter::default();

        let mut records = vec![
            record(1, "https://example.com/a", "a"),
            record(2, "https://example.com/b", "b"),
        ];
        let outcome = ResultMerger::new(api, store.clone())
            .merge(&["ext-0".to_string()], &mut records, &reporter)
            .await;

        assert_eq!(outcome.success_count, 0);
        assert_eq!(outcome.failure_count, 2);

        // Unavailable, not merely blank: distinguishable from never-processed
        assert_eq!(records[0].content, ContentState::Unavailable);
        assert!(!records[0].content.needs_fetch());
        assert_eq!(*store.unavailable.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_unmatched_items_are_ignored() {
        let api = Arc::new(MockEnrichment {
            results: HashMap::from([(
                "ext-0".to_string(),
                vec![item("https://example.com/other", Some("text"))],
            )]),
            ..Default::default()
        });
        let store = Arc::new(MemoryRecordStore::default());
        let reporter = TestReporter::default();

        let mut records = vec![record(1, "https://example.com/a", "a")];
        let outcome = ResultMerger::new(api, store)
            .merge(&["ext-0".to_string()], &mut records, &reporter)
            .await;

        assert_eq!(outcome.success_count, 0);
        assert_eq!(outcome.failure_count, 0);
        assert!(records[0].content.needs_fetch());
    }

    #[tokio::test]
    async fn test_result_fetch_error_skips_that_job_only() {
        let api = Arc::new(MockEnrichment {
            results: HashMap::from([(
                "ext-1".to_string(),
                vec![item("https://example.com/a", Some("text"))],
            )]),
            failing_results: vec!["ext-0".to_string()],
            ..Default::default()
        });
        let store = Arc::new(MemoryRecordStore::default());
        let reporter = TestReporter::default();

        let mut records = vec![record(1, "https://example.com/a", "a")];
        let outcome = ResultMerger::new(api, store)
            .merge(
                &["ext-0".to_string(), "ext-1".to_string()],
                &mut records,
                &reporter,
            )
            .await;

        assert_eq!(outcome.success_count, 1);
    }

    #[tokio::test]
    async fn test_summary_event_emitted_once() {
        let api = Arc::new(MockEnrichment::default());
        let store = Arc::new(MemoryRecordStore::default());
        let reporter = TestReporter::default();

        let mut records = vec![record(1, "https://example.com/a", "a")];
        ResultMerger::new(api, store)
            .merge(&["ext-0".to_string()], &mut records, &reporter)
            .await;

        let events = reporter.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, EventType::Info);
    }
}
