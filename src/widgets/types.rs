//! Widget kinds, payloads and the data records behind them.
//!
//! A reply carries at most one [`Widget`]. The legacy per-kind flags
//! (`show_map`, `show_bank`, ...) are derived from it through [`WidgetFlags`],
//! so a flag is set exactly when its payload exists.

use std::fmt;
use std::str::FromStr;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Discriminant of a widget, in marker priority order.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetKind {
    /// Stock price chart.
    Stock,
    /// Weather forecast chart.
    Weather,
    /// Hotel search panel.
    Hotel,
    /// Flight search panel.
    Flight,
    /// Map with one or more locations.
    Map,
    /// Bank account table.
    Bank,
    /// Calendar highlighting a date.
    Calendar,
    /// Calculator, flag only.
    Calculator,
}

impl WidgetKind {
    /// All kinds in marker priority order.
    pub const ALL: [Self; 8] = [
        Self::Stock,
        Self::Weather,
        Self::Hotel,
        Self::Flight,
        Self::Map,
        Self::Bank,
        Self::Calendar,
        Self::Calculator,
    ];

    /// Stable string form, identical to the marker tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stock => "stock",
            Self::Weather => "weather",
            Self::Hotel => "hotel",
            Self::Flight => "flight",
            Self::Map => "map",
            Self::Bank => "bank",
            Self::Calendar => "calendar",
            Self::Calculator => "calculator",
        }
    }
}

impl fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sampling interval accepted by the stock marker.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum StockInterval {
    /// Five minutes.
    #[serde(rename = "5m")]
    FiveMinutes,
    /// Fifteen minutes.
    #[serde(rename = "15m")]
    FifteenMinutes,
    /// Thirty minutes.
    #[serde(rename = "30m")]
    ThirtyMinutes,
    /// One hour.
    #[serde(rename = "1h")]
    Hour,
    /// One day.
    #[serde(rename = "1d")]
    Day,
    /// One week.
    #[serde(rename = "1wk")]
    Week,
    /// One month.
    #[serde(rename = "1mo")]
    Month,
    /// Three months.
    #[serde(rename = "3mo")]
    Quarter,
}

impl StockInterval {
    /// Token used in markers and quote API queries.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FiveMinutes => "5m",
            Self::FifteenMinutes => "15m",
            Self::ThirtyMinutes => "30m",
            Self::Hour => "1h",
            Self::Day => "1d",
            Self::Week => "1wk",
            Self::Month => "1mo",
            Self::Quarter => "3mo",
        }
    }

    /// History range requested from the quote API for this interval.
    #[must_use]
    pub const fn range(self) -> &'static str {
        match self {
            Self::FiveMinutes => "1d",
            Self::FifteenMinutes | Self::ThirtyMinutes => "5d",
            Self::Hour => "1mo",
            Self::Day => "3mo",
            Self::Week => "1y",
            Self::Month => "5y",
            Self::Quarter => "10y",
        }
    }
}

impl fmt::Display for StockInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StockInterval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "5m" => Ok(Self::FiveMinutes),
            "15m" => Ok(Self::FifteenMinutes),
            "30m" => Ok(Self::ThirtyMinutes),
            "1h" => Ok(Self::Hour),
            "1d" => Ok(Self::Day),
            "1wk" => Ok(Self::Week),
            "1mo" => Ok(Self::Month),
            "3mo" => Ok(Self::Quarter),
            other => Err(format!("unknown stock interval: {other}")),
        }
    }
}

/// One row of the bank records resource.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BankRecord {
    /// Account number.
    pub account: String,
    /// Account holder.
    pub name: String,
    /// Product label.
    pub product: String,
    /// Opening date as given by the source.
    pub date: String,
    /// Current balance.
    pub balance: f64,
}

/// One point of a stock price series.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StockPoint {
    /// Point timestamp, UTC, formatted `YYYY-MM-DD HH:MM`.
    pub date: String,
    /// Open price.
    pub open: Option<f64>,
    /// High price.
    pub high: Option<f64>,
    /// Low price.
    pub low: Option<f64>,
    /// Close price; points without one are dropped.
    pub close: f64,
    /// Traded volume.
    pub volume: Option<u64>,
    /// Adjusted close.
    pub adjclose: Option<f64>,
}

/// Daily temperature range derived from an hourly forecast.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    /// Calendar day.
    pub date: NaiveDate,
    /// Highest hourly temperature.
    pub high: f64,
    /// Lowest hourly temperature.
    pub low: f64,
}

/// Rendered widget attached to an assistant message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Widget {
    /// Map with markers for each location.
    Map {
        /// Locations in reply order, underscores already turned into spaces.
        locations: Vec<String>,
        /// Rendered markup.
        html: String,
    },
    /// Bank account table.
    Bank {
        /// Parsed records.
        rows: Vec<BankRecord>,
        /// Rendered markup.
        html: String,
    },
    /// Calendar focused on one date.
    Calendar {
        /// Highlighted date.
        date: NaiveDate,
        /// Rendered markup.
        html: String,
    },
    /// Calculator panel.
    Calculator,
    /// Flight search panel.
    Flight {
        /// Departure airport code.
        from: String,
        /// Arrival airport code.
        to: String,
        /// Departure date.
        date: NaiveDate,
        /// Rendered markup.
        html: String,
    },
    /// Hotel search panel.
    Hotel {
        /// Check-in date.
        check_in: NaiveDate,
        /// Check-out date.
        check_out: NaiveDate,
        /// Location, underscores already turned into spaces.
        location: String,
        /// Rendered markup.
        html: String,
    },
    /// Stock chart.
    Stock {
        /// Ticker symbol.
        symbol: String,
        /// Sampling interval.
        interval: StockInterval,
        /// Rendered markup.
        html: String,
        /// True when the fixed fallback chart is shown.
        fallback: bool,
    },
    /// Weather chart.
    Weather {
        /// Latitude in degrees.
        latitude: f64,
        /// Longitude in degrees.
        longitude: f64,
        /// Rendered markup.
        html: String,
        /// True when the fixed fallback chart is shown.
        fallback: bool,
    },
}

impl Widget {
    /// Kind of this widget.
    #[must_use]
    pub const fn kind(&self) -> WidgetKind {
        match self {
            Self::Map { .. } => WidgetKind::Map,
            Self::Bank { .. } => WidgetKind::Bank,
            Self::Calendar { .. } => WidgetKind::Calendar,
            Self::Calculator => WidgetKind::Calculator,
            Self::Flight { .. } => WidgetKind::Flight,
            Self::Hotel { .. } => WidgetKind::Hotel,
            Self::Stock { .. } => WidgetKind::Stock,
            Self::Weather { .. } => WidgetKind::Weather,
        }
    }

    /// Rendered markup, if the kind has any.
    #[must_use]
    pub fn html(&self) -> Option<&str> {
        match self {
            Self::Map { html, .. }
            | Self::Bank { html, .. }
            | Self::Calendar { html, .. }
            | Self::Flight { html, .. }
            | Self::Hotel { html, .. }
            | Self::Stock { html, .. }
            | Self::Weather { html, .. } => Some(html),
            Self::Calculator => None,
        }
    }

    /// Markup as a `data:` URL suitable for an iframe `src`.
    #[must_use]
    pub fn data_url(&self) -> Option<String> {
        self.html()
            .map(|html| format!("data:text/html;base64,{}", BASE64.encode(html)))
    }
}

/// Flat boolean view of an optional widget.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct WidgetFlags {
    /// Map shown.
    pub show_map: bool,
    /// Bank table shown.
    pub show_bank: bool,
    /// Calendar shown.
    pub show_calendar: bool,
    /// Calculator shown.
    pub show_calculator: bool,
    /// Flight panel shown.
    pub show_flight: bool,
    /// Hotel panel shown.
    pub show_hotel: bool,
    /// Stock chart shown.
    pub show_stock: bool,
    /// Weather chart shown.
    pub show_weather: bool,
}

impl WidgetFlags {
    /// Flags for a (possibly absent) widget.
    #[must_use]
    pub fn of(widget: Option<&Widget>) -> Self {
        let mut flags = Self::default();
        match widget.map(Widget::kind) {
            Some(WidgetKind::Map) => flags.show_map = true,
            Some(WidgetKind::Bank) => flags.show_bank = true,
            Some(WidgetKind::Calendar) => flags.show_calendar = true,
            Some(WidgetKind::Calculator) => flags.show_calculator = true,
            Some(WidgetKind::Flight) => flags.show_flight = true,
            Some(WidgetKind::Hotel) => flags.show_hotel = true,
            Some(WidgetKind::Stock) => flags.show_stock = true,
            Some(WidgetKind::Weather) => flags.show_weather = true,
            None => {}
        }
        flags
    }

    /// Number of flags set; at most one by construction.
    #[must_use]
    pub fn count(&self) -> usize {
        [
            self.show_map,
            self.show_bank,
            self.show_calendar,
            self.show_calculator,
            self.show_flight,
            self.show_hotel,
            self.show_stock,
            self.show_weather,
        ]
        .into_iter()
        .filter(|f| *f)
        .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_tokens_round_trip() {
        for token in ["5m", "15m", "30m", "1h", "1d", "1wk", "1mo", "3mo"] {
            let interval: Result<StockInterval, _> = token.parse();
            assert_eq!(interval.map(StockInterval::as_str), Ok(token));
        }
        assert!("2h".parse::<StockInterval>().is_err());
    }

    #[test]
    fn interval_range_grows_with_granularity() {
        assert_eq!(StockInterval::FiveMinutes.range(), "1d");
        assert_eq!(StockInterval::Day.range(), "3mo");
        assert_eq!(StockInterval::Quarter.range(), "10y");
    }

    #[test]
    fn flags_follow_widget_kind() {
        let widget = Widget::Calculator;
        let flags = WidgetFlags::of(Some(&widget));
        assert!(flags.show_calculator);
        assert_eq!(flags.count(), 1);
        assert_eq!(WidgetFlags::of(None).count(), 0);
    }

    #[test]
    fn data_url_encodes_markup() {
        let widget = Widget::Map {
            locations: vec!["Paris".to_string()],
            html: "<p>hi</p>".to_string(),
        };
        assert_eq!(
            widget.data_url().as_deref(),
            Some("data:text/html;base64,PHA+aGk8L3A+")
        );
        assert_eq!(Widget::Calculator.data_url(), None);
    }

    #[test]
    fn widget_serializes_with_kind_tag() {
        let widget = Widget::Stock {
            symbol: "AAPL".to_string(),
            interval: StockInterval::Day,
            html: String::new(),
            fallback: true,
        };
        let json = serde_json::to_value(&widget).unwrap_or_default();
        assert_eq!(json["kind"], "stock");
        assert_eq!(json["interval"], "1d");
    }
}
