//! Clippings external-service clients
//!
//! Type-safe HTTP clients for the two collaborators the orchestration core
//! depends on: the batch content-enrichment service (submit a batch of URLs,
//! poll job status, fetch extracted content) and the text-generation API
//! (chat-style completions for summaries).
//!
//! Both are consumed through `async_trait` seams (`EnrichmentApi`,
//! `GenerationApi`) so orchestration code can be exercised without a network.
//!
//! # Example
//!
//! ```no_run
//! use clippings_client::{EnrichmentApi, EnrichmentClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), clippings_client::ClientError> {
//!     let client = EnrichmentClient::new("http://localhost:3002", "secret");
//!
//!     let accepted = client
//!         .submit_batch(&["https://example.com/post".to_string()])
//!         .await?;
//!
//!     println!("Submitted batch: {}", accepted.job_id);
//!     Ok(())
//! }
//! ```

pub mod enrichment;
pub mod error;
pub mod generation;

// Re-export commonly used types
pub use enrichment::{EnrichmentApi, EnrichmentClient};
pub use error::{ClientError, Result};
pub use generation::{GenerationApi, GenerationClient};

use serde::de::DeserializeOwned;

/// Handle an API response and deserialize JSON
///
/// Checks the status code and returns an appropriate error if the request
/// failed, or deserializes the response body if successful.
pub(crate) async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();

    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(ClientError::api_error(status.as_u16(), error_text));
    }

    response
        .json()
        .await
        .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
}

/// Handle an API response that returns no interesting body
pub(crate) async fn handle_empty_response(response: reqwest::Response) -> Result<()> {
    let status = response.status();

    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(ClientError::api_error(status.as_u16(), error_text));
    }

    Ok(())
}
