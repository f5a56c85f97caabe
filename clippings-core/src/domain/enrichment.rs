//! External enrichment job tracking

use serde::{Deserialize, Serialize};

/// One externally-submitted batch of records awaiting content enrichment
///
/// Created when a batch is accepted by the enrichment service, then driven
/// through `pending -> running -> {success | failed}` by the poller and
/// merger. Terminal rows are never mutated; a retry creates a new row with
/// `retry_count + 1`, and exhausted jobs are abandoned in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentJob {
    /// Job id assigned by the external service
    pub external_id: String,
    /// Records covered by this batch
    pub record_ids: Vec<i64>,
    pub status: EnrichmentStatus,
    pub retry_count: i32,
    pub max_retries: i32,
    pub error_message: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Enrichment batch status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentStatus {
    Pending,
    Running,
    Success,
    Failed,
}

impl EnrichmentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

impl EnrichmentJob {
    /// A failed batch with retries left is eligible for resubmission
    pub fn can_retry(&self) -> bool {
        self.status == EnrichmentStatus::Failed && self.retry_count < self.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(status: EnrichmentStatus, retry_count: i32) -> EnrichmentJob {
        EnrichmentJob {
            external_id: "ext-1".to_string(),
            record_ids: vec![1, 2],
            status,
            retry_count,
            max_retries: 3,
            error_message: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
            completed_at: None,
        }
    }

    #[test]
    fn test_can_retry_only_failed_with_budget() {
        assert!(job(EnrichmentStatus::Failed, 0).can_retry());
        assert!(job(EnrichmentStatus::Failed, 2).can_retry());
        assert!(!job(EnrichmentStatus::Failed, 3).can_retry());
        assert!(!job(EnrichmentStatus::Success, 0).can_retry());
        assert!(!job(EnrichmentStatus::Running, 0).can_retry());
    }
}
