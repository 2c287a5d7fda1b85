//! Long-term memory compression requests.

use tracing::debug;

use crate::chat::core::config::ChatConfig;
use crate::chat::core::message::ChatMessage;
use crate::chat::core::session::ChatSession;
use crate::chat::prompt::prompt_builder::memory_message;
use crate::chat::prompt::token::count_messages;
use crate::llm::types::{MessageContent, Role};

/// Instruction merged into the leading system message of a summary request.
pub const SUMMARIZE_PROMPT: &str =
    "Summarize the discussion briefly in 200 words or less to use as a prompt for future context.";

/// Token budget assumed when the model config has no `max_tokens`.
const DEFAULT_MAX_TOKENS: u64 = 4000;

/// A ready-to-send summarization call.
#[derive(Clone, Debug)]
pub struct SummaryRequest {
    /// Messages to send, instruction first.
    pub messages: Vec<ChatMessage>,
    /// Message count captured when the request was built.
    pub last_summarize_index: usize,
    /// Token estimate of the summarized span.
    pub history_len: f64,
}

/// Decide whether the session needs compressing and build the request.
///
/// Candidates are the non-error messages at or after
/// `max(last_summarize_index, clear_context_index)`. When their estimate
/// exceeds the model token budget only the last `history_message_count`
/// are kept. Returns `None` unless memory is enabled and the estimate exceeds
/// the compression threshold.
#[must_use]
pub fn build_summary_request(session: &ChatSession, config: &ChatConfig) -> Option<SummaryRequest> {
    let summarize_index = session
        .last_summarize_index
        .max(session.clear_context_start());

    let mut candidates: Vec<&ChatMessage> = session
        .messages
        .iter()
        .enumerate()
        .filter(|(i, m)| *i >= summarize_index && !m.is_error)
        .map(|(_, m)| m)
        .collect();

    let history_len = count_messages(candidates.iter().copied());

    #[allow(clippy::cast_precision_loss)]
    let max_tokens = config.llm.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS) as f64;
    if history_len > max_tokens {
        let keep_from = candidates
            .len()
            .saturating_sub(config.history.history_message_count);
        candidates.drain(..keep_from);
    }

    #[allow(clippy::cast_precision_loss)]
    let threshold = config.history.compress_message_length_threshold as f64;

    debug!(
        session = %session.id,
        candidates = candidates.len(),
        history_len,
        threshold,
        "chat history"
    );

    if !(history_len > threshold && config.history.send_memory) {
        return None;
    }

    let mut messages = Vec::with_capacity(candidates.len() + 2);
    let mut head = memory_message(&session.memory_prompt);
    let merged = format!("{SUMMARIZE_PROMPT}{}", head.text());
    head.content = MessageContent::Text(merged);
    messages.push(head);
    messages.extend(candidates.into_iter().cloned());

    if messages.last().is_some_and(|m| m.role() == Role::System) {
        let mut blank = ChatMessage::user(String::new());
        blank.date.clear();
        messages.push(blank);
    }

    Some(SummaryRequest {
        messages,
        last_summarize_index: session.messages.len(),
        history_len,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ChatConfig {
        ChatConfig::default().with_compress_threshold(10)
    }

    fn long_session(n: usize) -> ChatSession {
        let mut session = ChatSession::new();
        for i in 0..n {
            session
                .messages
                .push(ChatMessage::user(format!("{i} {}", "word ".repeat(10))));
        }
        session
    }

    #[test]
    fn short_history_is_not_summarized() {
        let mut session = ChatSession::new();
        session.messages.push(ChatMessage::user("hi"));
        assert!(build_summary_request(&session, &config()).is_none());
    }

    #[test]
    fn disabled_memory_is_not_summarized() {
        let session = long_session(6);
        let cfg = config().with_send_memory(false);
        assert!(build_summary_request(&session, &cfg).is_none());
    }

    #[test]
    fn request_starts_with_instruction_and_captures_length() {
        let mut session = long_session(6);
        session.memory_prompt = "old recap".to_string();
        let request = build_summary_request(&session, &config());
        let Some(request) = request else {
            panic!("expected a summary request");
        };

        assert_eq!(request.last_summarize_index, 6);
        assert_eq!(request.messages.len(), 7);
        assert_eq!(request.messages[0].role(), Role::System);
        assert!(request.messages[0].text().starts_with(SUMMARIZE_PROMPT));
        assert!(request.messages[0].text().ends_with("recap: old recap"));
    }

    #[test]
    fn only_unsummarized_non_error_messages_are_candidates() {
        let mut session = long_session(6);
        session.last_summarize_index = 2;
        session.messages[0].is_error = true;
        session.messages[4].is_error = true;
        let Some(request) = build_summary_request(&session, &config()) else {
            panic!("expected a summary request");
        };
        let texts: Vec<&str> = request.messages[1..].iter().map(ChatMessage::text).collect();
        assert_eq!(texts.len(), 3);
        assert!(texts[0].starts_with("2 "));
        assert!(texts[1].starts_with("3 "));
        assert!(texts[2].starts_with("5 "));
    }

    #[test]
    fn over_budget_history_keeps_recent_window() {
        let session = long_session(12);
        let mut cfg = config();
        cfg.llm.max_tokens = Some(20);
        let Some(request) = build_summary_request(&session, &cfg) else {
            panic!("expected a summary request");
        };
        assert_eq!(request.messages.len(), 1 + 4);
        assert!(request.messages[1].text().starts_with("8 "));
    }

    #[test]
    fn trailing_system_message_gets_empty_user_turn() {
        let mut session = ChatSession::new();
        session.messages.push(ChatMessage::system("x".repeat(200)));
        let Some(request) = build_summary_request(&session, &config()) else {
            panic!("expected a summary request");
        };
        let last = request.messages.last().map(ChatMessage::role);
        assert_eq!(last, Some(Role::User));
        assert_eq!(request.messages.len(), 3);
    }
}
