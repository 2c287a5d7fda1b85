//! Model collaborator: request types, configuration and backends.
//!
//! - `types`: wire-level messages, finish reasons and stream events
//! - `config`: generation settings and endpoint settings
//! - `client`: the `ChatModel` trait every backend implements
//! - `openai`: HTTP backend for OpenAI-compatible servers

pub mod client;
pub mod config;
pub mod error;
pub mod openai;
pub mod types;

pub use client::{ChatModel, CompletionStream};
pub use config::{CacheType, DEFAULT_API_URL, EndpointConfig, LlmConfig};
pub use error::{LlmError, LlmResult};
pub use openai::OpenAiClient;
pub use types::{
    Completion, ContentPart, Dimension, FinishReason, ImageUrl, MessageContent, RequestMessage,
    Role, StreamEvent, Usage,
};
