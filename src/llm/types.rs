//! Wire types shared by every model collaborator.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Author of a message.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// System instructions.
    System,
    /// End user.
    User,
    /// Model reply.
    Assistant,
}

impl Role {
    /// Stable string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pixel dimensions attached to an image part.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Image reference inside a multimodal message.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    /// Remote URL or `data:` URL.
    pub url: String,
}

/// One segment of a multimodal message.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Plain text segment.
    Text {
        /// Segment text.
        text: String,
    },
    /// Image segment.
    ImageUrl {
        /// Image location.
        image_url: ImageUrl,
        /// Optional pixel size.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dimension: Option<Dimension>,
    },
}

/// Message body: either plain text or a list of parts.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text.
    Text(String),
    /// Multimodal parts.
    Parts(Vec<ContentPart>),
}

impl Default for MessageContent {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl From<String> for MessageContent {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for MessageContent {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl MessageContent {
    /// Text used for display and token estimation.
    ///
    /// For multimodal content this is the first text part, or empty if the
    /// message only carries images.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::Parts(parts) => parts
                .iter()
                .find_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .unwrap_or_default(),
        }
    }

    /// Whether there is no visible text.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text().is_empty()
    }

    /// Append text to the first text segment (or as a new segment).
    pub fn push_str(&mut self, suffix: &str) {
        match self {
            Self::Text(text) => text.push_str(suffix),
            Self::Parts(parts) => {
                let first_text = parts.iter_mut().find_map(|part| match part {
                    ContentPart::Text { text } => Some(text),
                    ContentPart::ImageUrl { .. } => None,
                });
                if let Some(text) = first_text {
                    text.push_str(suffix);
                } else {
                    parts.push(ContentPart::Text {
                        text: suffix.to_string(),
                    });
                }
            }
        }
    }
}

/// Message as sent to a model collaborator.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RequestMessage {
    /// Author role.
    pub role: Role,
    /// Body.
    pub content: MessageContent,
}

impl RequestMessage {
    /// Build a plain-text message.
    #[must_use]
    pub fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: MessageContent::Text(content.into()),
        }
    }
}

/// Why the model stopped producing tokens.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of the reply.
    #[default]
    Stop,
    /// Token limit reached.
    Length,
    /// The model requested a tool call.
    ToolCalls,
    /// Output filtered by the provider.
    ContentFilter,
    /// Generation interrupted by the caller.
    Abort,
    /// Anything else reported by the provider.
    #[serde(other)]
    Other,
}

/// Token accounting reported by the provider.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    /// Prompt tokens.
    #[serde(default)]
    pub prompt_tokens: u64,
    /// Generated tokens.
    #[serde(default)]
    pub completion_tokens: u64,
    /// Sum of both.
    #[serde(default)]
    pub total_tokens: u64,
}

/// Result of a single-shot completion.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Completion {
    /// Full reply text.
    pub text: String,
    /// Finish signal.
    pub stop_reason: Option<FinishReason>,
    /// Token usage.
    pub usage: Option<Usage>,
}

/// Incremental event of a streamed completion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    /// Newly generated text.
    Delta(String),
    /// Final signal; no further events follow.
    Finish {
        /// Finish signal.
        stop_reason: Option<FinishReason>,
        /// Token usage.
        usage: Option<Usage>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multimodal_text_is_first_text_part() {
        let content = MessageContent::Parts(vec![
            ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: "data:image/png;base64,AAAA".to_string(),
                },
                dimension: Some(Dimension {
                    width: 64,
                    height: 32,
                }),
            },
            ContentPart::Text {
                text: "what is this?".to_string(),
            },
        ]);
        assert_eq!(content.text(), "what is this?");
    }

    #[test]
    fn push_str_appends_to_text_segment() {
        let mut content = MessageContent::Parts(vec![ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: "https://example.com/a.png".to_string(),
            },
            dimension: None,
        }]);
        content.push_str("error");
        assert_eq!(content.text(), "error");

        let mut plain = MessageContent::from("partial");
        plain.push_str("\n\nboom");
        assert_eq!(plain.text(), "partial\n\nboom");
    }

    #[test]
    fn request_message_serializes_openai_shape() {
        let msg = RequestMessage::text(Role::User, "hi");
        let json = serde_json::to_value(&msg).unwrap_or_default();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "hi");
    }

    #[test]
    fn unknown_finish_reason_maps_to_other() {
        let reason: FinishReason =
            serde_json::from_str("\"function_call\"").unwrap_or(FinishReason::Stop);
        assert_eq!(reason, FinishReason::Other);
    }
}
