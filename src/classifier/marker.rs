//! Trailing widget markers in assistant replies.
//!
//! A marker is a `._<tag>` suffix at the very end of a reply. Rules are tried
//! in priority order and only the first match counts. A matching tag whose
//! arguments do not parse (impossible date, out-of-range coordinates) is not
//! a marker, and the reply is left as it is.

use chrono::NaiveDate;
use regex::{Captures, Regex};
use tracing::debug;

use crate::widgets::types::{StockInterval, WidgetKind};

/// Separator between multiple marker arguments.
const ARG_SEPARATOR: &str = "__";

/// Parsed marker with typed arguments.
#[derive(Clone, Debug, PartialEq)]
pub enum Marker {
    /// `._stock_<SYMBOL>_<interval>`
    Stock {
        /// Ticker symbol.
        symbol: String,
        /// Sampling interval.
        interval: StockInterval,
    },
    /// `._weather_<lat>_<lon>`
    Weather {
        /// Latitude in degrees.
        latitude: f64,
        /// Longitude in degrees.
        longitude: f64,
    },
    /// `._hotel__<in>__<out>__<location>`
    Hotel {
        /// Check-in date.
        check_in: NaiveDate,
        /// Check-out date.
        check_out: NaiveDate,
        /// Location with spaces restored.
        location: String,
    },
    /// `._flight__<from>__<to>__<date>`
    Flight {
        /// Departure airport id.
        from: String,
        /// Arrival airport id.
        to: String,
        /// Departure date.
        date: NaiveDate,
    },
    /// `._map_<loc>[__<loc>...]`
    Map {
        /// Locations with spaces restored, in reply order.
        locations: Vec<String>,
    },
    /// `._bank`
    Bank,
    /// `._calendar_<YYYY-MM-DD>`
    Calendar {
        /// Target date.
        date: NaiveDate,
    },
    /// `._calculator`
    Calculator,
}

impl Marker {
    /// Widget kind requested by this marker.
    #[must_use]
    pub const fn kind(&self) -> WidgetKind {
        match self {
            Self::Stock { .. } => WidgetKind::Stock,
            Self::Weather { .. } => WidgetKind::Weather,
            Self::Hotel { .. } => WidgetKind::Hotel,
            Self::Flight { .. } => WidgetKind::Flight,
            Self::Map { .. } => WidgetKind::Map,
            Self::Bank => WidgetKind::Bank,
            Self::Calendar { .. } => WidgetKind::Calendar,
            Self::Calculator => WidgetKind::Calculator,
        }
    }
}

/// Outcome of scanning a reply that ends with a well-formed tag.
#[derive(Clone, Debug, PartialEq)]
pub struct MarkerMatch<'a> {
    /// Reply text before the tag, trimmed; the separator dot stays.
    pub content: &'a str,
    /// Parsed marker.
    pub marker: Marker,
}

impl MarkerMatch<'_> {
    /// Kind named by the tag.
    #[must_use]
    pub const fn kind(&self) -> WidgetKind {
        self.marker.kind()
    }
}

struct MarkerRule {
    kind: WidgetKind,
    pattern: Regex,
}

/// Ordered marker matcher table.
pub struct MarkerParser {
    rules: Vec<MarkerRule>,
}

impl MarkerParser {
    /// Compile the marker table.
    ///
    /// # Errors
    /// Returns an error if any pattern is invalid.
    pub fn new() -> Result<Self, regex::Error> {
        let table: [(WidgetKind, &str); 8] = [
            (
                WidgetKind::Stock,
                r"\._stock_([A-Z0-9.\-^=]+)_(5m|15m|30m|1h|1d|1wk|1mo|3mo)\s*$",
            ),
            (
                WidgetKind::Weather,
                r"\._weather_(-?\d+(?:\.\d+)?)_(-?\d+(?:\.\d+)?)\s*$",
            ),
            (
                WidgetKind::Hotel,
                r"\._hotel__(\d{4}-\d{2}-\d{2})__(\d{4}-\d{2}-\d{2})__(\S+)\s*$",
            ),
            (
                WidgetKind::Flight,
                r"\._flight__([A-Za-z0-9.]+)__([A-Za-z0-9.]+)__(\d{4}-\d{2}-\d{2})\s*$",
            ),
            (WidgetKind::Map, r"\._map_+(\S+)\s*$"),
            (WidgetKind::Bank, r"\._bank\s*$"),
            (WidgetKind::Calendar, r"\._calendar_(\d{4}-\d{2}-\d{2})\s*$"),
            (WidgetKind::Calculator, r"\._calculator\s*$"),
        ];

        let rules = table
            .into_iter()
            .map(|(kind, pattern)| Regex::new(pattern).map(|pattern| MarkerRule { kind, pattern }))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    /// Find the first trailing marker in priority order.
    ///
    /// Returns `None` when no tag matches or when the first matching tag has
    /// malformed arguments.
    #[must_use]
    pub fn find<'a>(&self, reply: &'a str) -> Option<MarkerMatch<'a>> {
        let (rule, caps) = self
            .rules
            .iter()
            .find_map(|rule| rule.pattern.captures(reply).map(|caps| (rule, caps)))?;
        let tag = caps.get(0)?;
        let Some(marker) = parse_args(rule.kind, &caps) else {
            debug!(kind = %rule.kind, tag = tag.as_str(), "malformed marker arguments");
            return None;
        };
        Some(MarkerMatch {
            // Keep the separator dot with the sentence.
            content: reply[..=tag.start()].trim(),
            marker,
        })
    }
}

fn parse_args(kind: WidgetKind, caps: &Captures<'_>) -> Option<Marker> {
    let arg = |i: usize| caps.get(i).map(|m| m.as_str());

    match kind {
        WidgetKind::Stock => Some(Marker::Stock {
            symbol: arg(1)?.to_string(),
            interval: arg(2)?.parse().ok()?,
        }),
        WidgetKind::Weather => {
            let latitude: f64 = arg(1)?.parse().ok()?;
            let longitude: f64 = arg(2)?.parse().ok()?;
            ((-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude))
                .then_some(Marker::Weather {
                    latitude,
                    longitude,
                })
        }
        WidgetKind::Hotel => {
            let check_in = parse_date(arg(1)?)?;
            let check_out = parse_date(arg(2)?)?;
            let location = spaced(arg(3)?);
            (check_out > check_in && !location.is_empty()).then_some(Marker::Hotel {
                check_in,
                check_out,
                location,
            })
        }
        WidgetKind::Flight => Some(Marker::Flight {
            from: arg(1)?.to_string(),
            to: arg(2)?.to_string(),
            date: parse_date(arg(3)?)?,
        }),
        WidgetKind::Map => {
            let locations: Vec<String> = arg(1)?
                .split(ARG_SEPARATOR)
                .map(spaced)
                .filter(|l| !l.is_empty())
                .collect();
            (!locations.is_empty()).then_some(Marker::Map { locations })
        }
        WidgetKind::Bank => Some(Marker::Bank),
        WidgetKind::Calendar => Some(Marker::Calendar {
            date: parse_date(arg(1)?)?,
        }),
        WidgetKind::Calculator => Some(Marker::Calculator),
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

/// Underscores stand for spaces inside an argument.
fn spaced(raw: &str) -> String {
    raw.replace('_', " ").trim().to_string()
}
