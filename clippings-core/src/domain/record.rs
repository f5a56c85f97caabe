//! Corpus records and their enrichment state

use serde::{Deserialize, Serialize};

/// A single saved item from the content corpus
///
/// The record store is owned by the caller; the orchestration core reads
/// records for filtering and only the result merger (or an explicit
/// re-fetch) writes the content state back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub tags: Vec<String>,
    pub excerpt: Option<String>,
    pub saved_at: chrono::DateTime<chrono::Utc>,
    pub content: ContentState,
}

/// Three-way enrichment outcome for a record
///
/// `Unavailable` is distinct from `NotAttempted` so downstream stages never
/// re-request content the service already failed to produce. Only an
/// explicit re-fetch operation clears the marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ContentState {
    NotAttempted,
    Fetched {
        text: String,
        fetched_at: chrono::DateTime<chrono::Utc>,
    },
    Unavailable,
}

impl ContentState {
    /// Whether the normal pipeline should request content for this record
    pub fn needs_fetch(&self) -> bool {
        matches!(self, Self::NotAttempted)
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Fetched { text, .. } => Some(text),
            _ => None,
        }
    }
}

impl Record {
    /// Case-insensitive OR-match of any keyword against title, tags, excerpt
    ///
    /// The same keyword definition is used for filtering and for the digest
    /// output, so the two never disagree.
    pub fn matches_keywords(&self, keywords: &[String]) -> bool {
        let haystack = format!(
            "{} {} {}",
            self.title,
            self.tags.join(" "),
            self.excerpt.as_deref().unwrap_or("")
        )
        .to_lowercase();

        keywords
            .iter()
            .any(|keyword| haystack.contains(&keyword.to_lowercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str, tags: &[&str], excerpt: Option<&str>) -> Record {
        Record {
            id: 1,
            url: "https://example.com/post".to_string(),
            title: title.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            excerpt: excerpt.map(|e| e.to_string()),
            saved_at: chrono::Utc::now(),
            content: ContentState::NotAttempted,
        }
    }

    #[test]
    fn test_keyword_match_is_case_insensitive() {
        let r = record("Understanding Async Rust", &[], None);
        assert!(r.matches_keywords(&["async".to_string()]));
        assert!(r.matches_keywords(&["RUST".to_string()]));
        assert!(!r.matches_keywords(&["python".to_string()]));
    }

    #[test]
    fn test_keyword_match_covers_tags_and_excerpt() {
        let r = record("Weekly roundup", &["databases"], Some("notes on sqlite"));
        assert!(r.matches_keywords(&["database".to_string()]));
        assert!(r.matches_keywords(&["sqlite".to_string()]));
    }

    #[test]
    fn test_unavailable_is_not_refetched() {
        let mut r = record("a", &[], None);
        assert!(r.content.needs_fetch());

        r.content = ContentState::Unavailable;
        assert!(!r.content.needs_fetch());
        assert_eq!(r.content.text(), None);
    }
}
