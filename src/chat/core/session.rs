//! Chat session model.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::chat::core::ids::{MessageId, SessionId};
use crate::chat::core::message::ChatMessage;

/// Topic of a session that has not been titled yet.
pub const DEFAULT_TOPIC: &str = "New Conversation";

/// Running statistics of a session.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ChatStat {
    /// Reported completion tokens.
    pub token_count: u64,
    /// Whitespace-separated words in finished messages.
    pub word_count: u64,
    /// Characters in finished messages.
    pub char_count: u64,
}

/// Session template: a name and fixed context messages sent before history.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionTemplate {
    /// Template name; becomes the topic of sessions created from it.
    #[serde(default)]
    pub name: String,
    /// Messages always sent ahead of the conversation.
    #[serde(default)]
    pub context: Vec<ChatMessage>,
}

/// One conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    /// Stable identifier.
    pub id: SessionId,
    /// Short title.
    pub topic: String,
    /// Running summary of older history.
    pub memory_prompt: String,
    /// Ordered messages.
    pub messages: Vec<ChatMessage>,
    /// Statistics.
    pub stat: ChatStat,
    /// Last mutation, milliseconds since the epoch.
    pub last_update: i64,
    /// Number of leading messages already covered by `memory_prompt`.
    pub last_summarize_index: usize,
    /// Messages below this index are never sent again.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clear_context_index: Option<usize>,
    /// True between send and finish/error of the in-flight reply.
    pub is_generating: bool,
    /// Fixed context.
    #[serde(default)]
    pub template: SessionTemplate,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    /// Empty session with the default topic.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: SessionId::new(),
            topic: DEFAULT_TOPIC.to_string(),
            memory_prompt: String::new(),
            messages: Vec::new(),
            stat: ChatStat::default(),
            last_update: Utc::now().timestamp_millis(),
            last_summarize_index: 0,
            clear_context_index: None,
            is_generating: false,
            template: SessionTemplate::default(),
        }
    }

    /// Empty session seeded from a template; a named template titles the session.
    #[must_use]
    pub fn from_template(template: SessionTemplate) -> Self {
        let topic = if template.name.trim().is_empty() {
            DEFAULT_TOPIC.to_string()
        } else {
            template.name.clone()
        };
        Self {
            topic,
            template,
            ..Self::new()
        }
    }

    /// Whether the topic is still the placeholder.
    #[must_use]
    pub fn has_default_topic(&self) -> bool {
        self.topic == DEFAULT_TOPIC
    }

    /// Effective clear-context boundary.
    #[must_use]
    pub fn clear_context_start(&self) -> usize {
        self.clear_context_index.unwrap_or(0)
    }

    /// Find a message by id.
    #[must_use]
    pub fn message(&self, id: MessageId) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Find a message by id, mutably.
    pub fn message_mut(&mut self, id: MessageId) -> Option<&mut ChatMessage> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    /// Bump `last_update`.
    pub fn touch(&mut self) {
        self.last_update = Utc::now().timestamp_millis();
    }

    /// Account a finished message in the statistics.
    pub fn record_stat(&mut self, message: &ChatMessage) {
        let text = message.text();
        self.stat.char_count += text.chars().count() as u64;
        self.stat.word_count += text.split_whitespace().count() as u64;
        if let Some(usage) = message.usage {
            self.stat.token_count += usage.completion_tokens;
        }
    }

    /// Drop messages and memory, resetting every boundary.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.memory_prompt.clear();
        self.last_summarize_index = 0;
        self.clear_context_index = None;
        self.stat = ChatStat::default();
        self.touch();
    }

    /// Exclude every current message from future prompts.
    pub fn clear_context(&mut self) {
        self.clear_context_index = Some(self.messages.len());
        self.touch();
    }
}
