//! Stock price series from a chart API.
//!
//! The API answers `{base}/{symbol}?interval=..&range=..` with parallel
//! arrays of timestamps and OHLC values. Points whose close is null are
//! dropped and only the most recent `points` entries are kept.

use async_trait::async_trait;
use chrono::DateTime;
use serde::Deserialize;
use tracing::debug;

use crate::widgets::error::{WidgetError, WidgetResult};
use crate::widgets::sources::{send_checked, QuoteSource};
use crate::widgets::types::{StockInterval, StockPoint};

const SOURCE: &str = "stock";

/// Fetches quote series over HTTP.
pub struct HttpQuoteSource {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    api_host: Option<String>,
    points: usize,
}

impl HttpQuoteSource {
    /// Create a source against `base_url` keeping the last `points` points.
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, points: usize) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: None,
            api_host: None,
            points,
        }
    }

    /// Send an API key and host with each request.
    #[must_use]
    pub fn with_api_key(mut self, key: Option<String>, host: Option<String>) -> Self {
        self.api_key = key;
        self.api_host = host;
        self
    }

    fn build_url(&self, symbol: &str, interval: StockInterval) -> WidgetResult<url::Url> {
        let mut url = url::Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|()| WidgetError::Config(format!("{} cannot take a path", self.base_url)))?
            .pop_if_empty()
            .push(symbol);
        url.query_pairs_mut()
            .append_pair("interval", interval.as_str())
            .append_pair("range", interval.range());
        Ok(url)
    }
}

#[async_trait]
impl QuoteSource for HttpQuoteSource {
    async fn fetch_quotes(
        &self,
        symbol: &str,
        interval: StockInterval,
    ) -> WidgetResult<Vec<StockPoint>> {
        let url = self.build_url(symbol, interval)?;
        let mut request = self.client.get(url);
        if let Some(key) = &self.api_key {
            request = request.header("x-rapidapi-key", key);
        }
        if let Some(host) = &self.api_host {
            request = request.header("x-rapidapi-host", host);
        }

        let body: ChartResponse = send_checked(request, SOURCE).await?.json().await?;
        let points = parse_chart(body, self.points);
        debug!(symbol, %interval, count = points.len(), "parsed stock series");
        if points.is_empty() {
            return Err(WidgetError::NoData(SOURCE));
        }
        Ok(points)
    }
}

/// Flatten a chart response into points, keeping the last `keep`.
fn parse_chart(response: ChartResponse, keep: usize) -> Vec<StockPoint> {
    let Some(result) = response.chart.result.and_then(|r| r.into_iter().next()) else {
        return Vec::new();
    };
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let adjclose = result
        .indicators
        .adjclose
        .into_iter()
        .next()
        .map(|a| a.adjclose)
        .unwrap_or_default();

    let at = |values: &[Option<f64>], i: usize| values.get(i).copied().flatten();

    let mut points: Vec<StockPoint> = result
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(i, ts)| {
            let close = at(&quote.close, i)?;
            let date = DateTime::from_timestamp(*ts, 0)?
                .format("%Y-%m-%d %H:%M")
                .to_string();
            Some(StockPoint {
                date,
                open: at(&quote.open, i),
                high: at(&quote.high, i),
                low: at(&quote.low, i),
                close,
                volume: quote.volume.get(i).copied().flatten(),
                adjclose: at(&adjclose, i),
            })
        })
        .collect();

    if points.len() > keep {
        points.drain(..points.len() - keep);
    }
    points
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
    #[serde(default)]
    adjclose: Vec<AdjClose>,
}

#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{
        "chart": {
            "result": [{
                "timestamp": [1736173800, 1736260200, 1736346600, 1736433000],
                "indicators": {
                    "quote": [{
                        "open": [243.3, 242.9, null, 240.0],
                        "high": [247.3, 245.5, null, 241.1],
                        "low": [242.5, 241.3, null, 238.0],
                        "close": [245.0, 242.2, null, 240.5],
                        "volume": [40000000, 38000000, null, 1000]
                    }],
                    "adjclose": [{"adjclose": [244.5, 241.9, null, 240.3]}]
                }
            }],
            "error": null
        }
    }"#;

    fn response() -> Option<ChartResponse> {
        serde_json::from_str(BODY).ok()
    }

    #[test]
    fn drops_null_closes_and_keeps_last_points() {
        let Some(body) = response() else {
            panic!("fixture should parse");
        };
        let points = parse_chart(body, 2);
        assert_eq!(points.len(), 2);
        assert!((points[0].close - 242.2).abs() < 1e-9);
        assert!((points[1].close - 240.5).abs() < 1e-9);
        assert_eq!(points[1].volume, Some(1000));
        assert_eq!(points[0].date, "2025-01-07 14:30");
    }

    #[test]
    fn missing_result_is_empty() {
        let body: Option<ChartResponse> =
            serde_json::from_str(r#"{"chart":{"result":null,"error":{"code":"Not Found"}}}"#).ok();
        assert!(body.map(|b| parse_chart(b, 30)).unwrap_or_default().is_empty());
    }

    #[test]
    fn url_carries_symbol_interval_and_range() {
        let source = HttpQuoteSource::new(
            reqwest::Client::new(),
            "https://query1.finance.yahoo.com/v8/finance/chart/",
            30,
        );
        let url = source
            .build_url("BRK-B", StockInterval::Week)
            .map(|u| u.to_string())
            .unwrap_or_default();
        assert_eq!(
            url,
            "https://query1.finance.yahoo.com/v8/finance/chart/BRK-B?interval=1wk&range=1y"
        );
    }
}
