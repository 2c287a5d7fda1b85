//! Configuration for widget enrichment.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::widgets::error::{WidgetError, WidgetResult};

/// Default chart API for stock quotes.
pub const DEFAULT_STOCK_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// Default hourly forecast API.
pub const DEFAULT_WEATHER_URL: &str = "https://api.open-meteo.com/v1/forecast";

/// How stock and weather charts are produced.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartRendering {
    /// Fixed data template.
    #[default]
    Template,
    /// A second model call writes the chart page.
    Model,
}

/// Configuration for the widget service.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetConfig {
    /// Request timeout.
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,
    /// Connection timeout.
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,
    /// Maximum retries for transient failures.
    pub max_retries: u32,
    /// Delay between retries in milliseconds.
    pub retry_delay_ms: u64,
    /// User agents to rotate.
    pub user_agents: Vec<String>,
    /// Cache configuration.
    pub cache_config: CacheConfig,
    /// Data source locations.
    pub endpoints: Endpoints,
    /// API keys for data sources.
    pub api_keys: ApiKeys,
    /// Number of most recent stock points charted.
    pub stock_points: usize,
    /// Days of forecast requested.
    pub forecast_days: u8,
    /// Chart rendering mode.
    pub chart_rendering: ChartRendering,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(15),
            connect_timeout: Duration::from_secs(5),
            max_retries: 2,
            retry_delay_ms: 500,
            user_agents: default_user_agents(),
            cache_config: CacheConfig::default(),
            endpoints: Endpoints::default(),
            api_keys: ApiKeys::default(),
            stock_points: 30,
            forecast_days: 7,
            chart_rendering: ChartRendering::Template,
        }
    }
}

impl WidgetConfig {
    /// Create a new config with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the bank records location.
    #[must_use]
    pub fn with_bank_url(mut self, url: impl Into<String>) -> Self {
        self.endpoints.bank_url = Some(url.into());
        self
    }

    /// Set the stock API key.
    #[must_use]
    pub fn with_stock_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_keys.stock = Some(key.into());
        self
    }

    /// Set the chart rendering mode.
    #[must_use]
    pub const fn with_chart_rendering(mut self, mode: ChartRendering) -> Self {
        self.chart_rendering = mode;
        self
    }

    /// Set how many stock points are charted.
    #[must_use]
    pub const fn with_stock_points(mut self, points: usize) -> Self {
        self.stock_points = points;
        self
    }

    /// Get a random user agent from the rotation list.
    #[must_use]
    pub fn random_user_agent(&self) -> String {
        if self.user_agents.is_empty() {
            return default_user_agents().swap_remove(0);
        }
        let mut rng = rand::thread_rng();
        let idx = rng.gen_range(0..self.user_agents.len());
        self.user_agents[idx].clone()
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if a count is zero or an endpoint is not a URL.
    pub fn validate(&self) -> WidgetResult<()> {
        if self.stock_points == 0 {
            return Err(WidgetError::Config("stock_points must be > 0".to_string()));
        }
        if self.forecast_days == 0 || self.forecast_days > 16 {
            return Err(WidgetError::Config(
                "forecast_days must be within 1..=16".to_string(),
            ));
        }
        url::Url::parse(&self.endpoints.stock_url)?;
        url::Url::parse(&self.endpoints.weather_url)?;
        if let Some(bank) = &self.endpoints.bank_url {
            url::Url::parse(bank)?;
        }
        Ok(())
    }
}

/// Cache configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether caching is enabled.
    pub enabled: bool,
    /// TTL for bank records (seconds).
    pub bank_ttl_seconds: u64,
    /// TTL for stock series (seconds).
    pub stock_ttl_seconds: u64,
    /// TTL for forecasts (seconds).
    pub weather_ttl_seconds: u64,
    /// Maximum cache size (number of entries).
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bank_ttl_seconds: 300,
            stock_ttl_seconds: 300,
            weather_ttl_seconds: 1800,
            max_entries: 300,
        }
    }
}

/// Data source locations.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    /// Delimited bank records resource; no default.
    pub bank_url: Option<String>,
    /// Chart API base; symbol is appended as a path segment.
    pub stock_url: String,
    /// Forecast API.
    pub weather_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            bank_url: None,
            stock_url: DEFAULT_STOCK_URL.to_string(),
            weather_url: DEFAULT_WEATHER_URL.to_string(),
        }
    }
}

/// API keys for data sources.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiKeys {
    /// Stock API key, sent as `x-rapidapi-key` when set.
    pub stock: Option<String>,
    /// Host header paired with the stock key.
    pub stock_host: Option<String>,
}

/// Default user agents for rotation.
fn default_user_agents() -> Vec<String> {
    vec![
        // Chrome on Windows
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36".to_string(),
        // Firefox on Linux
        "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0".to_string(),
        // Safari on macOS
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15".to_string(),
    ]
}

/// Serde module for Duration serialization.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid_without_bank() {
        let config = WidgetConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.endpoints.bank_url, None);
        assert_eq!(config.stock_points, 30);
    }

    #[test]
    fn builder_sets_sources() {
        let config = WidgetConfig::new()
            .with_bank_url("https://bank.example.com/accounts.csv")
            .with_stock_api_key("k")
            .with_chart_rendering(ChartRendering::Model)
            .with_timeout(Duration::from_secs(3));
        assert_eq!(
            config.endpoints.bank_url.as_deref(),
            Some("https://bank.example.com/accounts.csv")
        );
        assert_eq!(config.api_keys.stock.as_deref(), Some("k"));
        assert_eq!(config.chart_rendering, ChartRendering::Model);
        assert_eq!(config.request_timeout, Duration::from_secs(3));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(WidgetConfig::new().with_stock_points(0).validate().is_err());
        assert!(WidgetConfig::new().with_bank_url("not a url").validate().is_err());
    }

    #[test]
    fn durations_serialize_as_seconds() {
        let json = serde_json::to_value(WidgetConfig::default()).unwrap_or_default();
        assert_eq!(json["request_timeout"], 15);
        let back: WidgetConfig =
            serde_json::from_str(r#"{"request_timeout": 2}"#).unwrap_or_default();
        assert_eq!(back.request_timeout, Duration::from_secs(2));
    }

    #[test]
    fn random_user_agent_is_from_list() {
        let config = WidgetConfig::default();
        assert!(config.random_user_agent().contains("Mozilla"));
    }
}
