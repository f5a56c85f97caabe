//! Wire types for the external enrichment service
//!
//! The service's request/response shapes are an opaque contract; only the
//! fields the core reads are modeled here.

use serde::{Deserialize, Serialize};

/// Request body for submitting one batch of URLs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitBatch {
    pub source_type: String,
    pub source_payload: SourcePayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcePayload {
    pub urls: Vec<String>,
}

impl SubmitBatch {
    pub fn for_urls(urls: Vec<String>) -> Self {
        Self {
            source_type: "blogs".to_string(),
            source_payload: SourcePayload { urls },
        }
    }
}

/// Acknowledgement for an accepted batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchAccepted {
    pub job_id: String,
}

/// Status of an external enrichment job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub job_id: String,
    pub status: ExternalStatus,
    pub error: Option<String>,
}

/// Lifecycle states reported by the enrichment service
///
/// `Unknown` absorbs states this client does not track; the poller treats
/// anything other than `Completed`/`Failed` as still in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExternalStatus {
    Pending,
    Running,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

/// Result payload for a completed external job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultResponse {
    pub items: Vec<ResultItem>,
}

/// One enriched item
///
/// `external_id` is the URL the batch was submitted with; the fetched text
/// is nested under `body.content` and may be null for pages the service
/// could not extract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultItem {
    pub external_id: String,
    pub body: ResultBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultBody {
    pub content: Option<String>,
}

impl ResultItem {
    /// Content with whitespace-only payloads treated as missing
    pub fn content(&self) -> Option<&str> {
        self.body
            .content
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_content_is_missing() {
        let item = ResultItem {
            external_id: "https://example.com".to_string(),
            body: ResultBody {
                content: Some("   \n".to_string()),
            },
        };
        assert_eq!(item.content(), None);

        let item = ResultItem {
            external_id: "https://example.com".to_string(),
            body: ResultBody { content: None },
        };
        assert_eq!(item.content(), None);
    }

    #[test]
    fn test_unknown_status_deserializes() {
        let status: ExternalStatus = serde_json::from_str("\"queued_remotely\"").unwrap();
        assert_eq!(status, ExternalStatus::Unknown);
    }
}
