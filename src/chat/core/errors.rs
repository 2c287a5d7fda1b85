//! Error types for the chat subsystem.

use thiserror::Error;

use crate::chat::core::ids::{DeletionToken, MessageId, SessionId};
use crate::llm::error::LlmError;
use crate::widgets::error::WidgetError;

/// Chat subsystem error type.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// No session with this id.
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),
    /// No message with this id in the session.
    #[error("message not found: {0}")]
    MessageNotFound(MessageId),
    /// Positional session operation out of range.
    #[error("session index {index} out of range (len {len})")]
    InvalidIndex {
        /// Requested index.
        index: usize,
        /// Number of sessions.
        len: usize,
    },
    /// A reply is already being generated for this session.
    #[error("session {0} is already generating a reply")]
    AlreadyGenerating(SessionId),
    /// User input was empty after trimming.
    #[error("user input is empty")]
    EmptyInput,
    /// The undo token is unknown or its window has elapsed.
    #[error("nothing to restore for token {0}")]
    NothingToRestore(DeletionToken),
    /// Model collaborator failure.
    #[error("model error: {0}")]
    Llm(#[from] LlmError),
    /// Widget service could not be built.
    #[error("widget setup failed: {0}")]
    Widget(#[from] WidgetError),
    /// Marker pattern failed to compile.
    #[error("invalid marker pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Convenience result alias for chat operations.
pub type ChatResult<T> = Result<T, ChatError>;
