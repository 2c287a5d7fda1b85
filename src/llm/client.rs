//! Model collaborator abstraction.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::llm::config::LlmConfig;
use crate::llm::error::LlmResult;
use crate::llm::types::{Completion, RequestMessage, StreamEvent};

/// Boxed stream of completion events.
pub type CompletionStream = Pin<Box<dyn Stream<Item = LlmResult<StreamEvent>> + Send>>;

/// Trait abstraction over chat-completion backends.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Run a single-shot completion.
    ///
    /// # Errors
    /// Returns an error on transport failure or an empty reply.
    async fn complete(
        &self,
        messages: &[RequestMessage],
        config: &LlmConfig,
    ) -> LlmResult<Completion>;

    /// Start a streamed completion.
    ///
    /// # Errors
    /// Returns an error if the request cannot be started; later failures are
    /// yielded through the stream.
    async fn stream(
        &self,
        messages: &[RequestMessage],
        config: &LlmConfig,
    ) -> LlmResult<CompletionStream>;

    /// Human-readable backend name for logs.
    fn name(&self) -> &str;
}
