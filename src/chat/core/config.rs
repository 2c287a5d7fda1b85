//! Configuration for the chat subsystem.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::chat::core::errors::{ChatError, ChatResult};
use crate::llm::config::{EndpointConfig, LlmConfig};

/// Template applied to the injected system prompt.
pub const DEFAULT_SYSTEM_TEMPLATE: &str = "You are a helpful assistant served by {{provider}}.
Current model: {{model}}
Current time: {{time}}
Reply in the user's language (interface language: {{lang}}).";

/// Default template for the newest user input.
pub const DEFAULT_INPUT_TEMPLATE: &str = "{{input}}";

/// Top-level configuration for the chat store.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Generation settings.
    pub llm: LlmConfig,
    /// Completion endpoint.
    pub endpoint: EndpointConfig,
    /// History and memory settings.
    pub history: HistoryConfig,
    /// Prompt construction settings.
    pub prompt: PromptConfig,
    /// Session lifecycle settings.
    pub session: SessionConfig,
}

impl ChatConfig {
    /// Replace the generation settings.
    #[must_use]
    pub fn with_llm(mut self, llm: LlmConfig) -> Self {
        self.llm = llm;
        self
    }

    /// Replace the endpoint settings.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: EndpointConfig) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Set the number of recent messages always considered for the prompt.
    #[must_use]
    pub fn with_history_message_count(mut self, count: usize) -> Self {
        self.history.history_message_count = count;
        self
    }

    /// Set the compression threshold.
    #[must_use]
    pub fn with_compress_threshold(mut self, threshold: usize) -> Self {
        self.history.compress_message_length_threshold = threshold;
        self
    }

    /// Toggle long-term memory.
    #[must_use]
    pub fn with_send_memory(mut self, enabled: bool) -> Self {
        self.history.send_memory = enabled;
        self
    }

    /// Toggle the injected system prompt.
    #[must_use]
    pub fn with_inject_system_prompts(mut self, enabled: bool) -> Self {
        self.prompt.enable_inject_system_prompts = enabled;
        self
    }

    /// Toggle the widget marker guide.
    #[must_use]
    pub fn with_marker_guide(mut self, enabled: bool) -> Self {
        self.prompt.inject_marker_guide = enabled;
        self
    }

    /// Toggle automatic title generation.
    #[must_use]
    pub fn with_auto_title(mut self, enabled: bool) -> Self {
        self.session.enable_auto_generate_title = enabled;
        self
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> ChatResult<()> {
        self.llm
            .validate()
            .map_err(|e| ChatError::InvalidConfig(e.to_string()))?;

        Url::parse(&self.endpoint.base_url).map_err(|e| {
            ChatError::InvalidConfig(format!("endpoint.base_url is not a valid url: {e}"))
        })?;

        if self.endpoint.request_timeout_secs == 0 {
            return Err(ChatError::InvalidConfig(
                "endpoint.request_timeout_secs must be > 0".to_string(),
            ));
        }

        if self.history.history_message_count == 0 {
            return Err(ChatError::InvalidConfig(
                "history.history_message_count must be > 0".to_string(),
            ));
        }

        if self.prompt.lang.trim().is_empty() {
            return Err(ChatError::InvalidConfig(
                "prompt.lang must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// History and long-term memory settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Number of most recent messages attached to every request.
    pub history_message_count: usize,
    /// Estimated token count above which unsummarized history is compressed.
    pub compress_message_length_threshold: usize,
    /// Whether to maintain and send the long-term memory summary.
    pub send_memory: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            history_message_count: 4,
            compress_message_length_threshold: 1000,
            send_memory: true,
        }
    }
}

/// Prompt construction settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// Whether to prepend the rendered system template.
    pub enable_inject_system_prompts: bool,
    /// System template with `{{provider}} {{model}} {{time}} {{lang}}` variables.
    pub system_template: String,
    /// Template applied to the newest user input; must mention `{{input}}`.
    pub input_template: String,
    /// Provider label used for `{{provider}}`.
    pub provider: String,
    /// Interface language used for `{{lang}}`.
    pub lang: String,
    /// Whether to append widget marker instructions to the newest user turn.
    pub inject_marker_guide: bool,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            enable_inject_system_prompts: true,
            system_template: DEFAULT_SYSTEM_TEMPLATE.to_string(),
            input_template: DEFAULT_INPUT_TEMPLATE.to_string(),
            provider: "OpenAI".to_string(),
            lang: "en".to_string(),
            inject_marker_guide: true,
        }
    }
}

/// Session lifecycle settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Whether to derive a topic once the conversation is long enough.
    pub enable_auto_generate_title: bool,
    /// How long a deleted session can be restored, in seconds.
    pub undo_window_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            enable_auto_generate_title: true,
            undo_window_secs: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ChatConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_history_window_is_rejected() {
        let config = ChatConfig::default().with_history_message_count(0);
        assert!(matches!(
            config.validate(),
            Err(ChatError::InvalidConfig(msg)) if msg.contains("history_message_count")
        ));
    }

    #[test]
    fn bad_endpoint_is_rejected() {
        let config = ChatConfig::default().with_endpoint(EndpointConfig {
            base_url: "::nope".to_string(),
            ..EndpointConfig::default()
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: ChatConfig =
            serde_json::from_str(r#"{"history":{"history_message_count":8}}"#)
                .unwrap_or_default();
        assert_eq!(config.history.history_message_count, 8);
        assert_eq!(config.history.compress_message_length_threshold, 1000);
        assert!(config.prompt.enable_inject_system_prompts);
    }
}
