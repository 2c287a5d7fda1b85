//! Chat message model.

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::chat::core::ids::{MessageId, ModelId};
use crate::llm::types::{FinishReason, MessageContent, RequestMessage, Role, Usage};
use crate::widgets::types::{Widget, WidgetFlags};

/// Display format for message timestamps.
const DATE_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// One turn in a conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Stable identifier.
    pub id: MessageId,
    role: Role,
    /// Body.
    pub content: MessageContent,
    /// Creation time as a display string.
    #[serde(default)]
    pub date: String,
    /// True while an assistant reply is still being written.
    #[serde(default)]
    pub streaming: bool,
    /// True if generation failed.
    #[serde(default)]
    pub is_error: bool,
    /// Widget detected in the reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widget: Option<Widget>,
    /// Finish signal from the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<FinishReason>,
    /// Token usage reported by the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    /// Model that produced an assistant message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelId>,
}

impl ChatMessage {
    /// Create a message stamped with the current local time.
    #[must_use]
    pub fn new(role: Role, content: impl Into<MessageContent>) -> Self {
        Self {
            id: MessageId::new(),
            role,
            content: content.into(),
            date: Local::now().format(DATE_FORMAT).to_string(),
            streaming: false,
            is_error: false,
            widget: None,
            stop_reason: None,
            usage: None,
            model: None,
        }
    }

    /// User message.
    #[must_use]
    pub fn user(content: impl Into<MessageContent>) -> Self {
        Self::new(Role::User, content)
    }

    /// System message without a date, as used for synthetic prompt parts.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        let content: String = content.into();
        Self {
            date: String::new(),
            ..Self::new(Role::System, content)
        }
    }

    /// Empty assistant message waiting for its first chunk.
    #[must_use]
    pub fn assistant_placeholder(model: ModelId) -> Self {
        Self {
            streaming: true,
            model: Some(model),
            ..Self::new(Role::Assistant, String::new())
        }
    }

    /// Author role; fixed at creation.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Text content used for display and token estimation.
    #[must_use]
    pub fn text(&self) -> &str {
        self.content.text()
    }

    /// Legacy per-kind flags derived from the widget.
    #[must_use]
    pub fn flags(&self) -> WidgetFlags {
        WidgetFlags::of(self.widget.as_ref())
    }

    /// Wire form sent to the model.
    #[must_use]
    pub fn to_request(&self) -> RequestMessage {
        RequestMessage {
            role: self.role,
            content: self.content.clone(),
        }
    }
}
