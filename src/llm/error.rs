//! Error types for model collaborators.

use thiserror::Error;

/// Errors produced while talking to a chat model.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Transport-level failure.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Non-success status from the provider.
    #[error("model api error ({status}): {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },
    /// Response body could not be decoded.
    #[error("malformed model response: {0}")]
    Json(#[from] serde_json::Error),
    /// Endpoint URL could not be parsed.
    #[error("invalid endpoint url: {0}")]
    Url(#[from] url::ParseError),
    /// The model returned no text at all.
    #[error("Empty response generated by LLM")]
    EmptyResponse,
    /// Request was built from an invalid configuration.
    #[error("invalid model configuration: {0}")]
    InvalidConfig(String),
}

/// Convenience result alias for model operations.
pub type LlmResult<T> = Result<T, LlmError>;
