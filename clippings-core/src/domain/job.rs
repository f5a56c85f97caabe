//! Digest job domain types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::stage::Stage;

/// One user-initiated digest generation request
///
/// Structure shared between the orchestrator (persists, mutates) and the
/// CLI/API read paths. The owning orchestrator task is the only writer once
/// the job is processing; cancellation requests set a flag and never force a
/// status change themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestJob {
    pub id: Uuid,
    pub keywords: Vec<String>,
    pub date_start: NaiveDate,
    pub date_end: NaiveDate,
    pub deliver_to: Option<String>,
    pub status: JobStatus,
    pub current_stage: Option<Stage>,
    pub current_percentage: i16,
    pub cancellation_requested: bool,
    pub artifact_path: Option<String>,
    pub error_message: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Digest job lifecycle status
///
/// Transitions: `pending -> processing -> {completed | failed | cancelled}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Terminal statuses are never overwritten once reached
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// A job that is pending or processing holds the admission gate
    pub fn is_in_flight(self) -> bool {
        !self.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_in_flight_is_non_terminal() {
        assert!(JobStatus::Pending.is_in_flight());
        assert!(JobStatus::Processing.is_in_flight());
        assert!(!JobStatus::Cancelled.is_in_flight());
    }
}
