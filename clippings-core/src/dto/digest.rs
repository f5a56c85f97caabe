//! Digest request/response DTOs

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::job::{DigestJob, JobStatus};
use crate::domain::stage::Stage;

/// Request to enqueue a new digest generation job
///
/// `keywords` is the raw user input (comma or newline separated); dates are
/// optional and defaulted by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDigest {
    pub keywords: String,
    pub date_start: Option<NaiveDate>,
    pub date_end: Option<NaiveDate>,
    pub deliver_to: Option<String>,
}

/// Lightweight job snapshot for the status read path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestSnapshot {
    pub id: Uuid,
    pub status: JobStatus,
    pub current_stage: Option<Stage>,
    pub current_percentage: i16,
    pub artifact_path: Option<String>,
    pub error_message: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<DigestJob> for DigestSnapshot {
    fn from(job: DigestJob) -> Self {
        Self {
            id: job.id,
            status: job.status,
            current_stage: job.current_stage,
            current_percentage: job.current_percentage,
            artifact_path: job.artifact_path,
            error_message: job.error_message,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

/// Normalize a raw keyword string
///
/// Splits on commas and newlines, trims whitespace, drops empties, and
/// dedupes while preserving first-seen order. An empty result means the
/// request is invalid.
pub fn normalize_keywords(raw: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    raw.split([',', '\n'])
        .map(str::trim)
        .filter(|keyword| !keyword.is_empty())
        .filter(|keyword| seen.insert(keyword.to_lowercase()))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_splits_on_commas_and_newlines() {
        assert_eq!(
            normalize_keywords("rust, async\ntokio"),
            vec!["rust", "async", "tokio"]
        );
    }

    #[test]
    fn test_normalize_trims_and_drops_empties() {
        assert_eq!(normalize_keywords("  rust ,, ,\n  "), vec!["rust"]);
        assert!(normalize_keywords("   ").is_empty());
    }

    #[test]
    fn test_normalize_dedupes_case_insensitively() {
        assert_eq!(normalize_keywords("Rust, rust, RUST"), vec!["Rust"]);
    }

    #[test]
    fn test_snapshot_from_job() {
        let job = DigestJob {
            id: Uuid::new_v4(),
            keywords: vec!["rust".to_string()],
            date_start: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            date_end: NaiveDate::from_ymd_opt(2025, 8, 1).unwrap(),
            deliver_to: None,
            status: JobStatus::Processing,
            current_stage: Some(Stage::Summarization),
            current_percentage: 55,
            cancellation_requested: false,
            artifact_path: None,
            error_message: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };

        let snapshot = DigestSnapshot::from(job.clone());
        assert_eq!(snapshot.id, job.id);
        assert_eq!(snapshot.status, JobStatus::Processing);
        assert_eq!(snapshot.current_stage, Some(Stage::Summarization));
    }
}
