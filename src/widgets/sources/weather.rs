//! Hourly forecast aggregated into daily high/low.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::debug;

use crate::widgets::error::{WidgetError, WidgetResult};
use crate::widgets::sources::{send_checked, ForecastSource};
use crate::widgets::types::DailyForecast;

const SOURCE: &str = "weather";

/// Fetches hourly temperatures over HTTP.
pub struct HttpForecastSource {
    client: reqwest::Client,
    url: String,
    days: u8,
}

impl HttpForecastSource {
    /// Create a source against `url` requesting `days` days.
    #[must_use]
    pub fn new(client: reqwest::Client, url: impl Into<String>, days: u8) -> Self {
        Self {
            client,
            url: url.into(),
            days,
        }
    }
}

#[async_trait]
impl ForecastSource for HttpForecastSource {
    async fn fetch_forecast(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> WidgetResult<Vec<DailyForecast>> {
        let mut url = url::Url::parse(&self.url)?;
        url.query_pairs_mut()
            .append_pair("latitude", &latitude.to_string())
            .append_pair("longitude", &longitude.to_string())
            .append_pair("hourly", "temperature_2m")
            .append_pair("forecast_days", &self.days.to_string())
            .append_pair("timezone", "auto");

        let body: ForecastResponse = send_checked(self.client.get(url), SOURCE)
            .await?
            .json()
            .await?;
        let days = aggregate_daily(&body.hourly);
        debug!(latitude, longitude, count = days.len(), "aggregated forecast");
        if days.is_empty() {
            return Err(WidgetError::NoData(SOURCE));
        }
        Ok(days)
    }
}

/// Fold hourly readings into one high/low pair per calendar day.
fn aggregate_daily(hourly: &Hourly) -> Vec<DailyForecast> {
    let mut by_day: BTreeMap<NaiveDate, (f64, f64)> = BTreeMap::new();
    for (time, temp) in hourly.time.iter().zip(&hourly.temperature_2m) {
        let Some(temp) = *temp else { continue };
        let Some(day) = time
            .get(..10)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        else {
            continue;
        };
        by_day
            .entry(day)
            .and_modify(|(high, low)| {
                *high = high.max(temp);
                *low = low.min(temp);
            })
            .or_insert((temp, temp));
    }
    by_day
        .into_iter()
        .map(|(date, (high, low))| DailyForecast { date, high, low })
        .collect()
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    hourly: Hourly,
}

#[derive(Debug, Default, Deserialize)]
struct Hourly {
    #[serde(default)]
    time: Vec<String>,
    #[serde(default)]
    temperature_2m: Vec<Option<f64>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregates_hours_into_days() {
        let hourly = Hourly {
            time: vec![
                "2025-01-06T00:00".to_string(),
                "2025-01-06T12:00".to_string(),
                "2025-01-06T18:00".to_string(),
                "2025-01-07T00:00".to_string(),
                "bogus".to_string(),
            ],
            temperature_2m: vec![Some(-1.5), Some(4.0), None, Some(2.0), Some(9.9)],
        };
        let days = aggregate_daily(&hourly);
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date.to_string(), "2025-01-06");
        assert!((days[0].high - 4.0).abs() < f64::EPSILON);
        assert!((days[0].low + 1.5).abs() < f64::EPSILON);
        assert!((days[1].high - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn parses_forecast_body() {
        let body: Option<ForecastResponse> = serde_json::from_str(
            r#"{"latitude":40.71,"hourly":{"time":["2025-01-06T00:00"],"temperature_2m":[3.2]}}"#,
        )
        .ok();
        let days = body.map(|b| aggregate_daily(&b.hourly)).unwrap_or_default();
        assert_eq!(days.len(), 1);
    }
}
