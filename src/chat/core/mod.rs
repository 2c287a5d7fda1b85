//! Core chat types and identifiers.

pub mod config;
pub mod errors;
pub mod ids;
pub mod message;
pub mod session;

pub use config::{
    ChatConfig, DEFAULT_INPUT_TEMPLATE, DEFAULT_SYSTEM_TEMPLATE, HistoryConfig, PromptConfig,
    SessionConfig,
};
pub use errors::{ChatError, ChatResult};
pub use ids::{DEFAULT_MODEL, DeletionToken, MessageId, ModelId, ModelIdError, SessionId};
pub use message::ChatMessage;
pub use session::{ChatSession, ChatStat, DEFAULT_TOPIC, SessionTemplate};
