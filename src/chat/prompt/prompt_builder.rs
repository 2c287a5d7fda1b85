//! Bounded prompt construction for a session.

use tracing::debug;

use crate::chat::core::config::ChatConfig;
use crate::chat::core::message::ChatMessage;
use crate::chat::core::session::ChatSession;
use crate::chat::prompt::template::{TemplateVars, append_marker_guide, fill_template_with};
use crate::chat::prompt::token::estimate_token_length;
use crate::llm::types::{RequestMessage, Role};

/// Recap prefix of the long-term memory message.
pub const HISTORY_PREFIX: &str = "This is a summary of the chat history as a recap: ";

/// Long-term memory as a system message.
#[must_use]
pub fn memory_message(memory_prompt: &str) -> ChatMessage {
    if memory_prompt.is_empty() {
        ChatMessage::system(String::new())
    } else {
        ChatMessage::system(format!("{HISTORY_PREFIX}{memory_prompt}"))
    }
}

/// Build the messages sent to the model for the next reply.
///
/// Order: injected system prompt, long-term memory, template context, then
/// the most recent non-error messages in chronological order. Recent messages
/// are collected from the newest backwards until the token estimate reaches
/// `max_tokens` or the lower bound is hit; the lower bound never goes below
/// the clear-context index.
#[must_use]
pub fn build_prompt_messages(session: &ChatSession, config: &ChatConfig) -> Vec<ChatMessage> {
    let total = session.messages.len();
    let clear_context_index = session.clear_context_start();

    let system_prompts = if config.prompt.enable_inject_system_prompts {
        let vars = TemplateVars::now(
            &config.prompt.provider,
            config.llm.model.as_str(),
            &config.prompt.lang,
        );
        let content = fill_template_with("", &config.prompt.system_template, &vars);
        debug!("global system prompt: {content}");
        vec![ChatMessage::system(content)]
    } else {
        Vec::new()
    };

    let send_long_term_memory = config.history.send_memory
        && !session.memory_prompt.is_empty()
        && session.last_summarize_index > clear_context_index;

    let short_term_start = total.saturating_sub(config.history.history_message_count);
    let memory_start = if send_long_term_memory {
        session.last_summarize_index.min(short_term_start)
    } else {
        short_term_start
    };
    let context_start = clear_context_index.max(memory_start).min(total);

    #[allow(clippy::cast_precision_loss)]
    let max_tokens = config.llm.max_tokens.map_or(f64::INFINITY, |t| t as f64);

    let mut token_count = 0.0;
    let mut recent = Vec::new();
    for message in session.messages[context_start..].iter().rev() {
        if token_count >= max_tokens {
            break;
        }
        if message.is_error {
            continue;
        }
        token_count += estimate_token_length(message.text());
        recent.push(message.clone());
    }
    recent.reverse();

    if config.prompt.inject_marker_guide {
        if let Some(newest_user) = recent.iter_mut().rev().find(|m| m.role() == Role::User) {
            append_marker_guide(&mut newest_user.content);
        }
    }

    debug!(
        session = %session.id,
        context_start,
        recent = recent.len(),
        memory = send_long_term_memory,
        "built prompt"
    );

    let mut out = Vec::with_capacity(
        system_prompts.len() + 1 + session.template.context.len() + recent.len(),
    );
    out.extend(system_prompts);
    if send_long_term_memory {
        out.push(memory_message(&session.memory_prompt));
    }
    out.extend(session.template.context.iter().cloned());
    out.extend(recent);
    out
}

/// Wire form of a prompt.
#[must_use]
pub fn to_request_messages(messages: &[ChatMessage]) -> Vec<RequestMessage> {
    messages.iter().map(ChatMessage::to_request).collect()
}
