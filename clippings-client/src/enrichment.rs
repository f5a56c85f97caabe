//! Batch content-enrichment service client
//!
//! The enrichment service accepts a batch of URLs, crawls them in the
//! background, and exposes the extracted text per URL once the job
//! completes. This client covers the four calls the core needs: submit,
//! status, result, cancel.

use async_trait::async_trait;
use reqwest::Client;

use clippings_core::dto::enrichment::{BatchAccepted, ResultItem, ResultResponse, StatusResponse, SubmitBatch};

use crate::error::{ClientError, Result};
use crate::{handle_empty_response, handle_response};

/// Seam for the enrichment service
///
/// The batch submitter, completion poller, and result merger all talk to the
/// service through this trait; tests substitute in-memory implementations.
#[async_trait]
pub trait EnrichmentApi: Send + Sync {
    /// Submit one batch of URLs; returns the external job id on acceptance
    async fn submit_batch(&self, urls: &[String]) -> Result<BatchAccepted>;

    /// Current status of an external job
    async fn get_status(&self, external_id: &str) -> Result<StatusResponse>;

    /// Result items of a completed external job
    async fn get_result(&self, external_id: &str) -> Result<Vec<ResultItem>>;

    /// Ask the service to abandon a job
    async fn cancel(&self, external_id: &str) -> Result<()>;
}

/// HTTP client for the enrichment service
#[derive(Debug, Clone)]
pub struct EnrichmentClient {
    /// Base URL of the service (e.g., "http://localhost:3002")
    base_url: String,
    /// Bearer token for the Authorization header
    api_key: String,
    /// HTTP client instance
    client: Client,
}

impl EnrichmentClient {
    /// Create a new enrichment client
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: Client::new(),
        }
    }

    /// Create a client with a custom HTTP client
    ///
    /// Allows configuring timeouts, proxies, TLS settings, etc.
    pub fn with_client(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        client: Client,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Get the base URL of the service
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl EnrichmentApi for EnrichmentClient {
    async fn submit_batch(&self, urls: &[String]) -> Result<BatchAccepted> {
        if urls.is_empty() {
            return Err(ClientError::InvalidRequest(
                "URL batch is empty".to_string(),
            ));
        }

        let url = format!("{}/api/v1/crawl_jobs", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&SubmitBatch::for_urls(urls.to_vec()))
            .send()
            .await?;

        handle_response(response).await
    }

    async fn get_status(&self, external_id: &str) -> Result<StatusResponse> {
        let url = format!("{}/api/v1/crawl_jobs/{}", self.base_url, external_id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        handle_response(response).await
    }

    async fn get_result(&self, external_id: &str) -> Result<Vec<ResultItem>> {
        let url = format!("{}/api/v1/crawl_jobs/{}/items", self.base_url, external_id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let result: ResultResponse = handle_response(response).await?;
        Ok(result.items)
    }

    async fn cancel(&self, external_id: &str) -> Result<()> {
        let url = format!(
            "{}/api/v1/crawl_jobs/{}/cancel",
            self.base_url, external_id
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        handle_empty_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = EnrichmentClient::new("http://localhost:3002", "key");
        assert_eq!(client.base_url(), "http://localhost:3002");
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = EnrichmentClient::new("http://localhost:3002/", "key");
        assert_eq!(client.base_url(), "http://localhost:3002");
    }

    #[tokio::test]
    async fn test_empty_batch_rejected_without_request() {
        let client = EnrichmentClient::new("http://localhost:3002", "key");
        let result = client.submit_batch(&[]).await;
        assert!(matches!(result, Err(ClientError::InvalidRequest(_))));
    }
}
