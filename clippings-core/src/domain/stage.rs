//! Pipeline stage definitions

use serde::{Deserialize, Serialize};

/// One named phase of the digest pipeline
///
/// The first three stages run inside the orchestrator. The last two belong
/// to the render/deliver collaborators, which report through the same
/// progress channel as the core stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Filtering,
    ContentFetching,
    Summarization,
    PdfGeneration,
    EmailSending,
}

impl Stage {
    /// All stages in pipeline order
    pub const ALL: [Stage; 5] = [
        Stage::Filtering,
        Stage::ContentFetching,
        Stage::Summarization,
        Stage::PdfGeneration,
        Stage::EmailSending,
    ];

    /// The percentage span `(start, end)` this stage covers
    ///
    /// Spans are contiguous across `ALL`, so a job's `current_percentage`
    /// is non-decreasing as long as stages run in order.
    pub fn span(self) -> (i16, i16) {
        match self {
            Stage::Filtering => (0, 25),
            Stage::ContentFetching => (25, 40),
            Stage::Summarization => (40, 80),
            Stage::PdfGeneration => (80, 95),
            Stage::EmailSending => (95, 100),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Filtering => "filtering",
            Stage::ContentFetching => "content_fetching",
            Stage::Summarization => "summarization",
            Stage::PdfGeneration => "pdf_generation",
            Stage::EmailSending => "email_sending",
        }
    }

    pub fn parse(s: &str) -> Option<Stage> {
        match s {
            "filtering" => Some(Stage::Filtering),
            "content_fetching" => Some(Stage::ContentFetching),
            "summarization" => Some(Stage::Summarization),
            "pdf_generation" => Some(Stage::PdfGeneration),
            "email_sending" => Some(Stage::EmailSending),
            _ => None,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spans_are_contiguous() {
        let mut expected_start = 0;
        for stage in Stage::ALL {
            let (start, end) = stage.span();
            assert_eq!(start, expected_start, "{stage} starts where the previous ended");
            assert!(end > start);
            expected_start = end;
        }
        assert_eq!(expected_start, 100);
    }

    #[test]
    fn test_parse_roundtrip() {
        for stage in Stage::ALL {
            assert_eq!(Stage::parse(stage.as_str()), Some(stage));
        }
        assert_eq!(Stage::parse("rendering"), None);
    }
}
