//! Error types for widget enrichment.

use thiserror::Error;

use crate::llm::error::LlmError;

/// Errors that can occur while enriching a widget.
#[derive(Debug, Error)]
pub enum WidgetError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// Non-success status from a data source.
    #[error("{source_name} returned status {status}")]
    Status {
        /// Data source name.
        source_name: &'static str,
        /// HTTP status code.
        status: u16,
    },

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON parsing error.
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// The source answered but carried no usable data.
    #[error("No data from {0}")]
    NoData(&'static str),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded, retry after {0} seconds")]
    RateLimited(u64),

    /// Timeout waiting for response.
    #[error("Request timed out")]
    Timeout,

    /// Source not configured.
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    /// Model-rendered chart failed.
    #[error("chart rendering failed: {0}")]
    Render(#[from] LlmError),

    /// Model-rendered chart was not a usable page.
    #[error("rendered chart rejected: {0}")]
    InvalidMarkup(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl WidgetError {
    /// Check if this error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::RateLimited(_) => true,
            Self::HttpRequest(err) => !err.is_builder() && !err.is_decode(),
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Get retry delay in seconds if applicable.
    #[must_use]
    pub const fn retry_delay(&self) -> Option<u64> {
        match self {
            Self::RateLimited(seconds) => Some(*seconds),
            Self::Timeout => Some(2),
            Self::HttpRequest(_) | Self::Status { .. } => Some(1),
            _ => None,
        }
    }
}

/// Convenience result alias for widget operations.
pub type WidgetResult<T> = Result<T, WidgetError>;
