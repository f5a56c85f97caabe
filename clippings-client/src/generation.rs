//! Text-generation API client
//!
//! Minimal chat-completions client for the summarization stage. Prompt
//! construction lives with the callers; this module only moves text across
//! the wire. The generation API is flaky under load, so callers wrap these
//! calls in the orchestrator's retry policy.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};
use crate::handle_response;

/// Seam for the text-generation API
#[async_trait]
pub trait GenerationApi: Send + Sync {
    /// Complete a prompt and return the generated text
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// HTTP client for a chat-completions style generation endpoint
#[derive(Debug, Clone)]
pub struct GenerationClient {
    /// Full completions endpoint URL
    endpoint: String,
    /// Bearer token for the Authorization header
    api_key: String,
    /// Model identifier sent with every request
    model: String,
    /// HTTP client instance
    client: Client,
}

impl GenerationClient {
    /// Create a new generation client
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
            client: Client::new(),
        }
    }

    /// Create a client with a custom HTTP client
    pub fn with_client(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        client: Client,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl GenerationApi for GenerationClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: "You summarize saved web content accurately and concisely."
                        .to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: prompt.to_string(),
                },
            ],
            temperature: 0.7,
            max_tokens: 1500,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let completion: ChatResponse = handle_response(response).await?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(ClientError::EmptyCompletion)
    }
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = GenerationClient::new(
            "https://api.example.com/v1/chat/completions",
            "key",
            "small-model",
        );
        assert_eq!(client.model(), "small-model");
    }

    #[test]
    fn test_response_parsing() {
        let raw = r#"{"choices":[{"message":{"content":" a summary "}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        let text = parsed.choices[0].message.content.as_deref();
        assert_eq!(text, Some(" a summary "));
    }
}
