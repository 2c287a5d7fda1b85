//! Reply classification into cleaned content plus at most one widget.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classifier::marker::{Marker, MarkerParser};
use crate::widgets::templates;
use crate::widgets::types::{Widget, WidgetFlags, WidgetKind};
use crate::widgets::WidgetService;

/// A reply split into display text and an optional widget.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedResponse {
    /// Text shown to the user, marker removed.
    pub content: String,
    /// Kind named by the marker, kept even when enrichment yields no widget.
    pub kind: Option<WidgetKind>,
    /// Widget to display.
    pub widget: Option<Widget>,
}

impl ClassifiedResponse {
    /// Reply without any marker.
    #[must_use]
    pub fn plain(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            kind: None,
            widget: None,
        }
    }

    /// Legacy per-kind flags.
    #[must_use]
    pub fn flags(&self) -> WidgetFlags {
        WidgetFlags::of(self.widget.as_ref())
    }
}

/// Turns raw model replies into [`ClassifiedResponse`]s.
pub struct ResponseClassifier {
    markers: MarkerParser,
    widgets: WidgetService,
}

impl ResponseClassifier {
    /// Create a classifier enriching data widgets through `widgets`.
    ///
    /// # Errors
    /// Returns an error if the marker table fails to compile.
    pub fn new(widgets: WidgetService) -> Result<Self, regex::Error> {
        Ok(Self {
            markers: MarkerParser::new()?,
            widgets,
        })
    }

    /// Classify a reply. Never fails: enrichment problems are logged and
    /// degrade to a missing or fallback widget.
    pub async fn classify(&self, reply: &str) -> ClassifiedResponse {
        let Some(found) = self.markers.find(reply) else {
            return ClassifiedResponse::plain(reply);
        };

        let kind = found.kind();
        let widget = self.enrich(found.marker).await;
        debug!(kind = %kind, shown = widget.is_some(), "classified reply");

        ClassifiedResponse {
            content: found.content.to_string(),
            kind: Some(kind),
            widget,
        }
    }

    /// Widget service used for data-backed kinds.
    #[must_use]
    pub const fn widgets(&self) -> &WidgetService {
        &self.widgets
    }

    async fn enrich(&self, marker: Marker) -> Option<Widget> {
        let widget = match marker {
            Marker::Stock { symbol, interval } => self.widgets.stock(&symbol, interval).await,
            Marker::Weather {
                latitude,
                longitude,
            } => self.widgets.weather(latitude, longitude).await,
            Marker::Bank => return self.widgets.bank().await,
            Marker::Hotel {
                check_in,
                check_out,
                location,
            } => Widget::Hotel {
                html: templates::render_hotel(check_in, check_out, &location),
                check_in,
                check_out,
                location,
            },
            Marker::Flight { from, to, date } => Widget::Flight {
                html: templates::render_flight(&from, &to, date),
                from,
                to,
                date,
            },
            Marker::Map { locations } => Widget::Map {
                html: templates::render_map(&locations),
                locations,
            },
            Marker::Calendar { date } => Widget::Calendar {
                html: templates::render_calendar(date),
                date,
            },
            Marker::Calculator => Widget::Calculator,
        };
        Some(widget)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;

    use crate::widgets::error::{WidgetError, WidgetResult};
    use crate::widgets::sources::{BankSource, ForecastSource, QuoteSource};
    use crate::widgets::types::{BankRecord, DailyForecast, StockInterval, StockPoint};
    use crate::widgets::WidgetConfig;

    struct Offline;

    #[async_trait]
    impl BankSource for Offline {
        async fn fetch_records(&self) -> WidgetResult<Vec<BankRecord>> {
            Err(WidgetError::NotConfigured("bank"))
        }
    }

    #[async_trait]
    impl QuoteSource for Offline {
        async fn fetch_quotes(&self, _: &str, _: StockInterval) -> WidgetResult<Vec<StockPoint>> {
            Err(WidgetError::NoData("stock"))
        }
    }

    #[async_trait]
    impl ForecastSource for Offline {
        async fn fetch_forecast(&self, _: f64, _: f64) -> WidgetResult<Vec<DailyForecast>> {
            Err(WidgetError::NoData("weather"))
        }
    }

    fn classifier() -> ResponseClassifier {
        let service = WidgetService::with_sources(
            WidgetConfig::default(),
            Arc::new(Offline),
            Arc::new(Offline),
            Arc::new(Offline),
        );
        match ResponseClassifier::new(service) {
            Ok(classifier) => classifier,
            Err(e) => panic!("classifier should build: {e}"),
        }
    }

    #[tokio::test]
    async fn plain_reply_is_untouched() {
        let reply = "  Hello there!  ";
        let result = classifier().classify(reply).await;
        assert_eq!(result, ClassifiedResponse::plain(reply));
        assert_eq!(result.flags().count(), 0);
    }

    #[tokio::test]
    async fn calendar_reply_sets_only_its_flag() {
        let result = classifier()
            .classify("The first Monday of 2025 is January 6th._calendar_2025-01-06")
            .await;
        assert_eq!(result.content, "The first Monday of 2025 is January 6th.");
        let flags = result.flags();
        assert!(flags.show_calendar);
        assert_eq!(flags.count(), 1);
        let html = result.widget.as_ref().and_then(Widget::html).unwrap_or_default();
        assert_eq!(html.matches("2025-01-06").count(), 1);
    }

    #[tokio::test]
    async fn map_reply_embeds_locations() {
        let result = classifier()
            .classify("Here is the route between both cities._map_New_York_City__Los_Angeles")
            .await;
        assert!(result.flags().show_map);
        let html = result.widget.as_ref().and_then(Widget::html).unwrap_or_default();
        assert!(html.contains(r#"["New York City","Los Angeles"]"#));
    }

    #[tokio::test]
    async fn calculator_is_flag_only() {
        let result = classifier().classify("25% of 100 is 25._calculator").await;
        assert_eq!(result.content, "25% of 100 is 25.");
        assert!(result.flags().show_calculator);
        assert!(result.widget.as_ref().and_then(Widget::data_url).is_none());
    }

    #[tokio::test]
    async fn failed_bank_keeps_kind_without_widget() {
        let result = classifier().classify("Here are your accounts._bank").await;
        assert_eq!(result.content, "Here are your accounts.");
        assert_eq!(result.kind, Some(WidgetKind::Bank));
        assert!(result.widget.is_none());
        assert!(!result.flags().show_bank);
    }

    #[tokio::test]
    async fn failed_stock_uses_fallback() {
        let result = classifier().classify("Apple today._stock_AAPL_1d").await;
        assert!(matches!(
            result.widget,
            Some(Widget::Stock { fallback: true, .. })
        ));
        assert!(result.flags().show_stock);
    }

    #[tokio::test]
    async fn malformed_marker_leaves_reply_as_is() {
        let c = classifier();
        for reply in [
            "Sure._calendar_2025-13-01",
            "Hmm._weather_123.0_10.0",
            "Rooms._hotel__2025-04-22__2025-04-20__Paris",
        ] {
            assert_eq!(c.classify(reply).await, ClassifiedResponse::plain(reply));
        }
    }

    #[tokio::test]
    async fn classification_is_idempotent() {
        let c = classifier();
        let first = c.classify("Math time: 2+2 is 4._calculator").await;
        let second = c.classify(&first.content).await;
        assert_eq!(second, ClassifiedResponse::plain(first.content.clone()));
        let third = c.classify(&second.content).await;
        assert_eq!(third, second);
    }
}
