//! Progress log domain types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::stage::Stage;

/// A single append-only progress log entry
///
/// The log is the job's history; the snapshot columns on the job row are the
/// cheap "where are we now" read path. Entries are never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub job_id: Uuid,
    /// `None` for generic events not tied to a stage
    pub stage: Option<Stage>,
    pub event_type: EventType,
    pub percentage: Option<i16>,
    pub message: String,
    pub details: Option<serde_json::Value>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Kind of progress event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    StageUpdate,
    Retry,
    Warning,
    Info,
    Error,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::StageUpdate => "stage_update",
            EventType::Retry => "retry",
            EventType::Warning => "warning",
            EventType::Info => "info",
            EventType::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<EventType> {
        match s {
            "stage_update" => Some(EventType::StageUpdate),
            "retry" => Some(EventType::Retry),
            "warning" => Some(EventType::Warning),
            "info" => Some(EventType::Info),
            "error" => Some(EventType::Error),
            _ => None,
        }
    }
}

/// Stage-specific detail payloads
///
/// Typed in code; flattened to an opaque JSON object only at the storage
/// boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageDetails {
    Filtering {
        matched: usize,
        missing_content: usize,
    },
    ContentFetching {
        batches: usize,
        submitted: usize,
        completed: usize,
        timed_out: usize,
    },
    Summarization {
        total: usize,
        done: usize,
        failed: usize,
    },
    PdfGeneration {
        artifact_path: String,
    },
    EmailSending {
        recipient: String,
    },
}

impl StageDetails {
    /// Opaque JSON for the storage boundary
    pub fn into_value(self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_roundtrip() {
        for event in [
            EventType::StageUpdate,
            EventType::Retry,
            EventType::Warning,
            EventType::Info,
            EventType::Error,
        ] {
            assert_eq!(EventType::parse(event.as_str()), Some(event));
        }
    }

    #[test]
    fn test_details_tagged_by_kind() {
        let value = StageDetails::Summarization {
            total: 12,
            done: 3,
            failed: 1,
        }
        .into_value();

        assert_eq!(value["kind"], "summarization");
        assert_eq!(value["total"], 12);
    }
}
