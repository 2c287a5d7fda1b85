//! Chat sessions, prompt construction and long-term memory.
//!
//! - `core`: configuration, identifiers, messages and sessions
//! - `prompt`: token estimates, templates and prompt assembly
//! - `summarization`: memory compression and session titles
//! - `engine`: the store that runs turns and manages sessions

pub mod core;
pub mod engine;
pub mod prompt;
pub mod summarization;

pub use core::{
    ChatConfig, ChatError, ChatMessage, ChatResult, ChatSession, ChatStat, DeletionToken,
    MessageId, ModelId, SessionId, SessionTemplate,
};
pub use engine::{BackgroundTasks, ChatStore, PendingTurn, TurnOutcome};
