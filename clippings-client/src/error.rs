//! Error types for the external-service clients

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when talking to an external collaborator
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed before a response arrived
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// API returned an error status code
    #[error("API error (status {status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Completion response carried no usable text
    #[error("Completion response contained no content")]
    EmptyCompletion,

    /// Invalid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    /// Create an API error from status code and message
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
        }
    }

    /// Check if this error is a server error (5xx status)
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::ApiError { status, .. } if *status >= 500)
    }

    /// Transient failures are worth retrying: request timeouts, connection
    /// drops, 5xx responses, and rate limiting. Everything else fails fast.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RequestFailed(err) => err.is_timeout() || err.is_connect(),
            Self::ApiError { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_errors_are_transient() {
        assert!(ClientError::api_error(500, "boom").is_transient());
        assert!(ClientError::api_error(503, "unavailable").is_transient());
        assert!(ClientError::api_error(429, "slow down").is_transient());
    }

    #[test]
    fn test_client_errors_are_not_transient() {
        assert!(!ClientError::api_error(400, "bad request").is_transient());
        assert!(!ClientError::api_error(404, "missing").is_transient());
        assert!(!ClientError::EmptyCompletion.is_transient());
        assert!(!ClientError::ParseError("bad json".to_string()).is_transient());
    }
}
