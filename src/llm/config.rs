//! Configuration records for model collaborators.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::chat::core::ids::ModelId;
use crate::llm::error::{LlmError, LlmResult};

/// Default OpenAI-compatible endpoint.
pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1";

/// Local weight cache used by in-browser runtimes; carried for compatibility.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheType {
    /// Browser Cache API.
    #[default]
    Cache,
    /// `IndexedDB` storage.
    IndexDb,
}

/// Per-request generation settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Model name.
    pub model: ModelId,
    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Nucleus sampling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Presence penalty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    /// Frequency penalty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    /// Token budget, used both for generation and for history trimming.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    /// Whether to stream.
    #[serde(default)]
    pub stream: bool,
    /// Context window for local runtimes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_window_size: Option<u32>,
    /// Weight cache selector.
    #[serde(default)]
    pub cache: CacheType,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: ModelId::default(),
            temperature: Some(0.7),
            top_p: Some(1.0),
            presence_penalty: Some(0.0),
            frequency_penalty: Some(0.0),
            max_tokens: Some(4000),
            stream: true,
            context_window_size: None,
            cache: CacheType::default(),
        }
    }
}

impl LlmConfig {
    /// Copy of this config with streaming toggled.
    #[must_use]
    pub fn streaming(&self, stream: bool) -> Self {
        Self {
            stream,
            ..self.clone()
        }
    }

    /// Copy of this config without a token limit.
    #[must_use]
    pub fn without_max_tokens(&self) -> Self {
        Self {
            max_tokens: None,
            ..self.clone()
        }
    }

    /// Minimal config carrying only the model, used for title generation.
    #[must_use]
    pub fn bare(&self) -> Self {
        Self {
            model: self.model.clone(),
            temperature: None,
            top_p: None,
            presence_penalty: None,
            frequency_penalty: None,
            max_tokens: None,
            stream: false,
            context_window_size: None,
            cache: self.cache,
        }
    }

    /// Validate numeric ranges.
    ///
    /// # Errors
    /// Returns an error if a sampling parameter is out of range.
    pub fn validate(&self) -> LlmResult<()> {
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(LlmError::InvalidConfig(format!(
                    "temperature must be within 0..=2, got {t}"
                )));
            }
        }
        if let Some(p) = self.top_p {
            if !(0.0..=1.0).contains(&p) {
                return Err(LlmError::InvalidConfig(format!(
                    "top_p must be within 0..=1, got {p}"
                )));
            }
        }
        for (name, value) in [
            ("presence_penalty", self.presence_penalty),
            ("frequency_penalty", self.frequency_penalty),
        ] {
            if let Some(v) = value {
                if !(-2.0..=2.0).contains(&v) {
                    return Err(LlmError::InvalidConfig(format!(
                        "{name} must be within -2..=2, got {v}"
                    )));
                }
            }
        }
        if self.max_tokens == Some(0) {
            return Err(LlmError::InvalidConfig("max_tokens must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Where and how to reach the completion endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Base URL; `/chat/completions` is appended.
    pub base_url: String,
    /// Bearer token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Whole-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            request_timeout_secs: 120,
            connect_timeout_secs: 10,
        }
    }
}

impl EndpointConfig {
    /// Full chat-completions URL.
    ///
    /// # Errors
    /// Returns an error if the base URL is not a valid URL.
    pub fn completions_url(&self) -> LlmResult<Url> {
        let base = self.base_url.trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/chat/completions"))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(LlmConfig::default().validate().is_ok());
    }

    #[test]
    fn out_of_range_temperature_is_rejected() {
        let config = LlmConfig {
            temperature: Some(3.5),
            ..LlmConfig::default()
        };
        assert!(matches!(config.validate(), Err(LlmError::InvalidConfig(_))));
    }

    #[test]
    fn summarization_config_drops_max_tokens() {
        let config = LlmConfig::default().without_max_tokens().streaming(true);
        assert_eq!(config.max_tokens, None);
        assert!(config.stream);
    }

    #[test]
    fn completions_url_joins_without_double_slash() {
        let endpoint = EndpointConfig {
            base_url: "http://127.0.0.1:8000/v1/".to_string(),
            ..EndpointConfig::default()
        };
        let url = endpoint.completions_url().map(|u| u.to_string());
        assert_eq!(
            url.ok().as_deref(),
            Some("http://127.0.0.1:8000/v1/chat/completions")
        );
    }
}
