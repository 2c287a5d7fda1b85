//! Session topic derivation.

use crate::chat::core::config::ChatConfig;
use crate::chat::core::message::ChatMessage;
use crate::chat::core::session::{ChatSession, DEFAULT_TOPIC};
use crate::chat::prompt::token::count_messages;

/// Instruction asking the model for a short title.
pub const TOPIC_PROMPT: &str = "Please generate a four to five word title summarizing our conversation without any lead-in, punctuation, quotation marks, periods, symbols, bold text, or additional text. Remove enclosing quotation marks.";

/// Minimum token estimate before a title is generated.
pub const SUMMARIZE_MIN_LEN: f64 = 50.0;

const QUOTES: &[char] = &['"', '\u{201c}', '\u{201d}', '*'];
const TRAILING: &[char] = &[
    '\u{ff0c}', '\u{3002}', '\u{ff01}', '\u{ff1f}', '\u{201d}', '\u{201c}', '"', '\u{3001}', ',',
    '.', '!', '?', '*',
];

/// Whether the session should get a generated title now.
#[must_use]
pub fn should_generate_topic(session: &ChatSession, config: &ChatConfig) -> bool {
    config.session.enable_auto_generate_title
        && session.has_default_topic()
        && count_messages(&session.messages) >= SUMMARIZE_MIN_LEN
}

/// Conversation followed by the title instruction.
#[must_use]
pub fn build_topic_request(session: &ChatSession) -> Vec<ChatMessage> {
    let mut messages: Vec<ChatMessage> = session
        .messages
        .iter()
        .filter(|m| !m.is_error)
        .cloned()
        .collect();
    messages.push(ChatMessage::user(TOPIC_PROMPT));
    messages
}

/// Strip enclosing quotes and asterisks and trailing punctuation.
#[must_use]
pub fn trim_topic(topic: &str) -> String {
    topic
        .trim()
        .trim_matches(QUOTES)
        .trim_end_matches(TRAILING)
        .trim()
        .to_string()
}

/// Topic to store for a model reply; empty replies keep the placeholder.
#[must_use]
pub fn topic_from_reply(reply: &str) -> String {
    let topic = trim_topic(reply);
    if topic.is_empty() {
        DEFAULT_TOPIC.to_string()
    } else {
        topic
    }
}
