//! Startup helpers for the chat widgets server.
//!
//! Configuration comes from an optional JSON file named by
//! `CHAT_WIDGETS_CONFIG`, then environment overrides. Credentials are never
//! built in.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::chat::{ChatConfig, ModelId};
use crate::server::{self, AppState};
use crate::widgets::WidgetConfig;

/// Environment variable naming the JSON configuration file.
pub const CONFIG_ENV: &str = "CHAT_WIDGETS_CONFIG";

/// Everything the server needs to boot.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Chat store settings.
    pub chat: ChatConfig,
    /// Widget service settings.
    pub widgets: WidgetConfig,
    /// Listening port.
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            chat: ChatConfig::default(),
            widgets: WidgetConfig::default(),
            port: server::DEFAULT_PORT,
        }
    }
}

impl AppConfig {
    /// Read a JSON configuration file; missing fields take defaults.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Apply overrides from a variable lookup.
    ///
    /// # Errors
    /// Returns an error if an override has an invalid value.
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("CHAT_WIDGETS_API_URL") {
            self.chat.endpoint.base_url = url;
        }
        if let Some(key) = lookup("CHAT_WIDGETS_API_KEY") {
            self.chat.endpoint.api_key = Some(key);
        }
        if let Some(model) = lookup("CHAT_WIDGETS_MODEL") {
            self.chat.llm.model =
                ModelId::new(&model).with_context(|| format!("CHAT_WIDGETS_MODEL={model}"))?;
        }
        if let Some(port) = lookup("CHAT_WIDGETS_PORT") {
            self.port = port
                .parse()
                .with_context(|| format!("CHAT_WIDGETS_PORT={port}"))?;
        }
        if let Some(key) = lookup("CHAT_WIDGETS_STOCK_API_KEY") {
            self.widgets.api_keys.stock = Some(key);
        }
        if let Some(url) = lookup("CHAT_WIDGETS_BANK_URL") {
            self.widgets.endpoints.bank_url = Some(url);
        }
        Ok(self)
    }

    /// Load the file named by `CHAT_WIDGETS_CONFIG` (if any), then the
    /// environment overrides.
    ///
    /// # Errors
    /// Returns an error if the file or an override is invalid.
    pub fn load() -> Result<Self> {
        let base = match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        base.apply_overrides(|name| std::env::var(name).ok())
    }
}

/// Build application state from configuration.
///
/// # Errors
/// Returns an error if configuration is invalid or a client cannot be built.
pub fn initialize(config: AppConfig) -> Result<Arc<AppState>> {
    tracing::info!("completion endpoint: {}", config.chat.endpoint.base_url);
    AppState::new(config.chat, config.widgets).context("creating application state")
}

fn boot() -> Result<()> {
    let config = AppConfig::load()?;
    let port = config.port;
    let state = initialize(config)?;

    let rt = tokio::runtime::Runtime::new().context("creating runtime")?;
    rt.block_on(server::run_server_with_shutdown(state, port, shutdown_signal()))
        .context("server error")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

/// Run the server (used by the `chat-widgets-server` binary).
///
/// # Returns
/// `ExitCode::SUCCESS` on graceful shutdown, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting chat widgets v{}", env!("CARGO_PKG_VERSION"));

    match boot() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_file_values() {
        let vars = |name: &str| match name {
            "CHAT_WIDGETS_PORT" => Some("8080".to_string()),
            "CHAT_WIDGETS_BANK_URL" => Some("https://bank.example/records".to_string()),
            "CHAT_WIDGETS_API_KEY" => Some("secret".to_string()),
            _ => None,
        };
        let Ok(config) = AppConfig::default().apply_overrides(vars) else {
            panic!("overrides should apply");
        };
        assert_eq!(config.port, 8080);
        assert_eq!(config.chat.endpoint.api_key.as_deref(), Some("secret"));
        assert_eq!(
            config.widgets.endpoints.bank_url.as_deref(),
            Some("https://bank.example/records")
        );
    }

    #[test]
    fn bad_port_is_rejected() {
        let vars = |name: &str| (name == "CHAT_WIDGETS_PORT").then(|| "http".to_string());
        assert!(AppConfig::default().apply_overrides(vars).is_err());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let Ok(config) = serde_json::from_str::<AppConfig>(r#"{"port": 4000}"#) else {
            panic!("partial config should parse");
        };
        assert_eq!(config.port, 4000);
        assert!(config.widgets.endpoints.bank_url.is_none());
    }
}
