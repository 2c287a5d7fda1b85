//! Widget payloads and the enrichment service behind them.
//!
//! This module provides:
//! - Widget kinds, payloads and legacy flags (`types`)
//! - Fixed templates with escaped placeholders (`templates`)
//! - Bank, stock and weather data sources (`sources`)
//! - TTL caching of fetched data (`cache`)
//! - Optional model-rendered charts (`chart`)

pub mod cache;
pub mod chart;
pub mod config;
pub mod error;
pub mod sources;
pub mod templates;
pub mod types;

pub use cache::{CacheStats, WidgetCache};
pub use config::{CacheConfig, ChartRendering, WidgetConfig};
pub use error::{WidgetError, WidgetResult};
pub use sources::{BankSource, ForecastSource, QuoteSource};
pub use types::{
    BankRecord, DailyForecast, StockInterval, StockPoint, Widget, WidgetFlags, WidgetKind,
};

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::llm::{ChatModel, LlmConfig};
use sources::{HttpBankSource, HttpForecastSource, HttpQuoteSource};

/// Coordinates the data-backed widgets: bank, stock and weather.
///
/// Fetch failures never escape. A bank failure yields no widget, while stock
/// and weather failures yield their fixed fallback chart.
#[derive(Clone)]
pub struct WidgetService {
    config: WidgetConfig,
    cache: WidgetCache,
    bank: Arc<dyn BankSource>,
    quotes: Arc<dyn QuoteSource>,
    forecast: Arc<dyn ForecastSource>,
    chart_model: Option<(Arc<dyn ChatModel>, LlmConfig)>,
}

impl WidgetService {
    /// Create a service backed by the HTTP data sources.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be created.
    pub fn new(config: WidgetConfig) -> WidgetResult<Self> {
        config.validate()?;
        let client = sources::build_client(&config)?;

        let bank = HttpBankSource::new(client.clone(), config.endpoints.bank_url.clone());
        let quotes = HttpQuoteSource::new(
            client.clone(),
            config.endpoints.stock_url.clone(),
            config.stock_points,
        )
        .with_api_key(
            config.api_keys.stock.clone(),
            config.api_keys.stock_host.clone(),
        );
        let forecast = HttpForecastSource::new(
            client,
            config.endpoints.weather_url.clone(),
            config.forecast_days,
        );

        Ok(Self::with_sources(
            config,
            Arc::new(bank),
            Arc::new(quotes),
            Arc::new(forecast),
        ))
    }

    /// Create a service over explicit data sources.
    #[must_use]
    pub fn with_sources(
        config: WidgetConfig,
        bank: Arc<dyn BankSource>,
        quotes: Arc<dyn QuoteSource>,
        forecast: Arc<dyn ForecastSource>,
    ) -> Self {
        let cache = WidgetCache::new(config.cache_config.clone());
        Self {
            config,
            cache,
            bank,
            quotes,
            forecast,
            chart_model: None,
        }
    }

    /// Model used when charts are rendered in `ChartRendering::Model` mode.
    #[must_use]
    pub fn with_chart_model(mut self, model: Arc<dyn ChatModel>, config: LlmConfig) -> Self {
        self.chart_model = Some((model, config));
        self
    }

    /// Bank table, or `None` when records cannot be fetched.
    pub async fn bank(&self) -> Option<Widget> {
        const KEY: &str = "records";

        let rows = if let Some(rows) = self.cache.get_bank(KEY) {
            debug!("Cache hit for bank records");
            rows
        } else {
            let fetched = self.retry(|| self.bank.fetch_records()).await;
            match fetched {
                Ok(rows) => {
                    self.cache.set_bank(KEY, &rows);
                    rows
                }
                Err(e) => {
                    warn!(error = %e, "bank widget dropped");
                    return None;
                }
            }
        };

        let html = templates::render_bank(&rows);
        Some(Widget::Bank { rows, html })
    }

    /// Stock chart, or the fixed fallback when quotes cannot be fetched.
    pub async fn stock(&self, symbol: &str, interval: StockInterval) -> Widget {
        let key = format!("{symbol}:{interval}");

        let points = if let Some(points) = self.cache.get_stock(&key) {
            debug!(symbol, "Cache hit for stock series");
            Ok(points)
        } else {
            self.retry(|| self.quotes.fetch_quotes(symbol, interval))
                .await
                .inspect(|points| self.cache.set_stock(&key, points))
        };

        match points {
            Ok(points) => {
                let title = format!("{symbol} ({interval})");
                let html = match self.render_chart(&title, &points).await {
                    Some(html) => html,
                    None => templates::render_stock(symbol, interval, &points),
                };
                Widget::Stock {
                    symbol: symbol.to_string(),
                    interval,
                    html,
                    fallback: false,
                }
            }
            Err(e) => {
                warn!(symbol, %interval, error = %e, "stock fetch failed, using fallback chart");
                Widget::Stock {
                    symbol: symbol.to_string(),
                    interval,
                    html: templates::render_stock_fallback(symbol, interval),
                    fallback: true,
                }
            }
        }
    }

    /// Weather chart, or the fixed fallback when the forecast cannot be fetched.
    pub async fn weather(&self, latitude: f64, longitude: f64) -> Widget {
        let key = format!("{latitude:.4},{longitude:.4}");

        let days = if let Some(days) = self.cache.get_weather(&key) {
            debug!(latitude, longitude, "Cache hit for forecast");
            Ok(days)
        } else {
            self.retry(|| self.forecast.fetch_forecast(latitude, longitude))
                .await
                .inspect(|days| self.cache.set_weather(&key, days))
        };

        match days {
            Ok(days) => {
                let title = format!("Forecast for {latitude}, {longitude}");
                let html = match self.render_chart(&title, &days).await {
                    Some(html) => html,
                    None => templates::render_weather(latitude, longitude, &days),
                };
                Widget::Weather {
                    latitude,
                    longitude,
                    html,
                    fallback: false,
                }
            }
            Err(e) => {
                warn!(latitude, longitude, error = %e, "forecast fetch failed, using fallback chart");
                Widget::Weather {
                    latitude,
                    longitude,
                    html: templates::render_weather_fallback(latitude, longitude),
                    fallback: true,
                }
            }
        }
    }

    /// Cache statistics.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop every cached entry.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    async fn retry<T, F, Fut>(&self, op: F) -> WidgetResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = WidgetResult<T>>,
    {
        sources::fetch_with_retry(self.config.max_retries, self.config.retry_delay_ms, op).await
    }

    /// Model-rendered chart when that mode is on; `None` means use the template.
    async fn render_chart<T>(&self, title: &str, data: &T) -> Option<String>
    where
        T: Serialize + ?Sized + Sync,
    {
        if self.config.chart_rendering != ChartRendering::Model {
            return None;
        }
        let (model, llm) = self.chart_model.as_ref()?;
        match chart::render_with_model(model.as_ref(), llm, title, data).await {
            Ok(html) => Some(html),
            Err(e) => {
                warn!(title, error = %e, "model chart rejected, using template");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use chrono::NaiveDate;

    use crate::llm::{Completion, CompletionStream, LlmError, LlmResult, RequestMessage};

    struct StaticBank;

    #[async_trait]
    impl BankSource for StaticBank {
        async fn fetch_records(&self) -> WidgetResult<Vec<BankRecord>> {
            Ok(vec![BankRecord {
                account: "1001".to_string(),
                name: "Alice".to_string(),
                product: "Checking".to_string(),
                date: "2021-03-04".to_string(),
                balance: 10.0,
            }])
        }
    }

    #[derive(Default)]
    struct CountingQuotes {
        calls: AtomicU32,
    }

    #[async_trait]
    impl QuoteSource for CountingQuotes {
        async fn fetch_quotes(
            &self,
            _symbol: &str,
            _interval: StockInterval,
        ) -> WidgetResult<Vec<StockPoint>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![StockPoint {
                date: "2025-01-06 14:30".to_string(),
                open: None,
                high: None,
                low: None,
                close: 245.0,
                volume: None,
                adjclose: None,
            }])
        }
    }

    struct StaticForecast;

    #[async_trait]
    impl ForecastSource for StaticForecast {
        async fn fetch_forecast(
            &self,
            _latitude: f64,
            _longitude: f64,
        ) -> WidgetResult<Vec<DailyForecast>> {
            Ok(vec![DailyForecast {
                date: NaiveDate::from_ymd_opt(2025, 1, 6).unwrap_or_default(),
                high: 4.0,
                low: -1.0,
            }])
        }
    }

    struct Failing;

    #[async_trait]
    impl BankSource for Failing {
        async fn fetch_records(&self) -> WidgetResult<Vec<BankRecord>> {
            Err(WidgetError::NotConfigured("bank"))
        }
    }

    #[async_trait]
    impl QuoteSource for Failing {
        async fn fetch_quotes(&self, _: &str, _: StockInterval) -> WidgetResult<Vec<StockPoint>> {
            Err(WidgetError::Timeout)
        }
    }

    #[async_trait]
    impl ForecastSource for Failing {
        async fn fetch_forecast(&self, _: f64, _: f64) -> WidgetResult<Vec<DailyForecast>> {
            Err(WidgetError::NoData("weather"))
        }
    }

    struct SvgModel;

    #[async_trait]
    impl ChatModel for SvgModel {
        async fn complete(&self, _: &[RequestMessage], _: &LlmConfig) -> LlmResult<Completion> {
            Ok(Completion {
                text: "<svg id=\"model\"></svg>".to_string(),
                ..Completion::default()
            })
        }

        async fn stream(
            &self,
            _: &[RequestMessage],
            _: &LlmConfig,
        ) -> LlmResult<CompletionStream> {
            Err(LlmError::EmptyResponse)
        }

        fn name(&self) -> &str {
            "svg"
        }
    }

    fn fast_config() -> WidgetConfig {
        WidgetConfig {
            retry_delay_ms: 1,
            ..WidgetConfig::default()
        }
    }

    fn working() -> WidgetService {
        WidgetService::with_sources(
            fast_config(),
            Arc::new(StaticBank),
            Arc::new(CountingQuotes::default()),
            Arc::new(StaticForecast),
        )
    }

    fn failing() -> WidgetService {
        WidgetService::with_sources(
            fast_config(),
            Arc::new(Failing),
            Arc::new(Failing),
            Arc::new(Failing),
        )
    }

    #[tokio::test]
    async fn data_widgets_render_from_sources() {
        let service = working();
        let Some(Widget::Bank { rows, html }) = service.bank().await else {
            panic!("expected bank widget");
        };
        assert_eq!(rows.len(), 1);
        assert!(html.contains("Alice"));

        let stock = service.stock("AAPL", StockInterval::Day).await;
        assert!(matches!(stock, Widget::Stock { fallback: false, .. }));
        let weather = service.weather(40.7143, -74.006).await;
        assert!(matches!(weather, Widget::Weather { fallback: false, .. }));
    }

    #[tokio::test]
    async fn failures_degrade_per_kind() {
        let service = failing();
        assert!(service.bank().await.is_none());
        assert!(matches!(
            service.stock("AAPL", StockInterval::Day).await,
            Widget::Stock { fallback: true, .. }
        ));
        assert!(matches!(
            service.weather(1.0, 2.0).await,
            Widget::Weather { fallback: true, .. }
        ));
    }

    #[tokio::test]
    async fn repeated_quotes_come_from_cache() {
        let quotes = Arc::new(CountingQuotes::default());
        let service = WidgetService::with_sources(
            fast_config(),
            Arc::new(StaticBank),
            quotes.clone(),
            Arc::new(StaticForecast),
        );
        service.stock("AAPL", StockInterval::Day).await;
        service.stock("AAPL", StockInterval::Day).await;
        assert_eq!(quotes.calls.load(Ordering::SeqCst), 1);
        assert_eq!(service.cache_stats().stock_entries, 1);
    }

    #[tokio::test]
    async fn model_mode_uses_model_page() {
        let config = fast_config().with_chart_rendering(ChartRendering::Model);
        let service = WidgetService::with_sources(
            config,
            Arc::new(StaticBank),
            Arc::new(CountingQuotes::default()),
            Arc::new(StaticForecast),
        )
        .with_chart_model(Arc::new(SvgModel), LlmConfig::default());

        let widget = service.stock("AAPL", StockInterval::Day).await;
        assert_eq!(widget.html(), Some("<svg id=\"model\"></svg>"));
    }
}
