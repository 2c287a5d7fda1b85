//! Data sources behind the bank, stock and weather widgets.
//!
//! Each source is a trait so the widget service can run against fakes in
//! tests; the HTTP implementations live in the submodules.

pub mod bank;
pub mod stock;
pub mod weather;

pub use bank::HttpBankSource;
pub use stock::HttpQuoteSource;
pub use weather::HttpForecastSource;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, RETRY_AFTER, USER_AGENT};
use tracing::debug;

use crate::widgets::config::WidgetConfig;
use crate::widgets::error::{WidgetError, WidgetResult};
use crate::widgets::types::{BankRecord, DailyForecast, StockInterval, StockPoint};

/// Longest wait honored from a rate-limit answer, in seconds.
const MAX_RETRY_WAIT_SECS: u64 = 5;

/// Source of bank account records.
#[async_trait]
pub trait BankSource: Send + Sync {
    /// Fetch every parsable record.
    ///
    /// # Errors
    /// Returns an error if the source is missing, unreachable or empty.
    async fn fetch_records(&self) -> WidgetResult<Vec<BankRecord>>;
}

/// Source of stock price series.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Fetch the most recent points for `symbol` sampled at `interval`.
    ///
    /// # Errors
    /// Returns an error if the request fails or no point has a close.
    async fn fetch_quotes(
        &self,
        symbol: &str,
        interval: StockInterval,
    ) -> WidgetResult<Vec<StockPoint>>;
}

/// Source of daily temperature forecasts.
#[async_trait]
pub trait ForecastSource: Send + Sync {
    /// Fetch per-day high/low for a coordinate pair.
    ///
    /// # Errors
    /// Returns an error if the request fails or carries no temperatures.
    async fn fetch_forecast(&self, latitude: f64, longitude: f64)
    -> WidgetResult<Vec<DailyForecast>>;
}

/// Build the HTTP client shared by the data sources.
///
/// # Errors
/// Returns an error if the client cannot be created.
pub fn build_client(config: &WidgetConfig) -> WidgetResult<reqwest::Client> {
    let mut headers = HeaderMap::new();

    let ua = config.random_user_agent();
    if let Ok(ua_value) = HeaderValue::from_str(&ua) {
        headers.insert(USER_AGENT, ua_value);
    }
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/json,text/csv,text/plain;q=0.9,*/*;q=0.8"),
    );

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(config.request_timeout)
        .connect_timeout(config.connect_timeout)
        .gzip(true)
        .brotli(true)
        .deflate(true)
        .build()
        .map_err(WidgetError::HttpRequest)
}

/// Send a request and map failure statuses onto `WidgetError`.
pub(crate) async fn send_checked(
    request: reqwest::RequestBuilder,
    source_name: &'static str,
) -> WidgetResult<reqwest::Response> {
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            WidgetError::Timeout
        } else {
            WidgetError::HttpRequest(e)
        }
    })?;

    let status = response.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let wait = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(1);
        return Err(WidgetError::RateLimited(wait));
    }
    if !status.is_success() {
        return Err(WidgetError::Status {
            source_name,
            status: status.as_u16(),
        });
    }
    Ok(response)
}

/// Run `op`, retrying retryable failures up to `max_retries` times.
///
/// # Errors
/// Returns the last error once retries are exhausted or on a permanent error.
pub async fn fetch_with_retry<T, F, Fut>(
    max_retries: u32,
    retry_delay_ms: u64,
    mut op: F,
) -> WidgetResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = WidgetResult<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < max_retries => {
                attempt += 1;
                let delay = match err {
                    WidgetError::RateLimited(secs) => {
                        Duration::from_secs(secs.min(MAX_RETRY_WAIT_SECS))
                    }
                    _ => Duration::from_millis(retry_delay_ms * u64::from(attempt)),
                };
                debug!(attempt, ?delay, error = %err, "retrying widget fetch");
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_transient_errors() {
        let calls = AtomicU32::new(0);
        let result = fetch_with_retry(2, 1, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(WidgetError::Timeout)
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.ok(), Some(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: WidgetResult<()> = fetch_with_retry(1, 1, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(WidgetError::Timeout) }
        })
        .await;
        assert!(matches!(result, Err(WidgetError::Timeout)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: WidgetResult<()> = fetch_with_retry(3, 1, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(WidgetError::NotConfigured("bank")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn client_builds_from_defaults() {
        assert!(build_client(&WidgetConfig::default()).is_ok());
    }
}
