//! Fixed widget templates and their typed renderers.
//!
//! Each template carries uppercase placeholder tokens. Rendering is a single
//! pass over the template, so a substituted value is never scanned for
//! further placeholders. Every value is escaped for where it lands: HTML text
//! and attributes get entity escaping, script data is JSON with `<`, `>` and
//! `&` written as unicode escapes, and search links are URL-encoded.

use std::cmp::Reverse;

use chrono::NaiveDate;
use serde::Serialize;

use crate::widgets::types::{BankRecord, DailyForecast, StockInterval, StockPoint};

/// Map page; `LOCATIONS_ARRAY` is a JSON array of place names.
pub const MAP_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Route Map</title>
  <link rel="stylesheet" href="https://unpkg.com/leaflet/dist/leaflet.css" />
  <link rel="stylesheet" href="https://unpkg.com/leaflet-routing-machine/dist/leaflet-routing-machine.css" />
</head>
<body style="margin:0">
  <div id="map" style="width:100%;height:100vh;"></div>
  <script src="https://unpkg.com/leaflet/dist/leaflet.js"></script>
  <script src="https://unpkg.com/leaflet-routing-machine/dist/leaflet-routing-machine.js"></script>
  <script>
    const locations = LOCATIONS_ARRAY;
    const map = L.map("map").setView([20, 0], 2);
    L.tileLayer("https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png", {
      attribution: "&copy; OpenStreetMap contributors"
    }).addTo(map);
    const geocode = (name) =>
      fetch("https://nominatim.openstreetmap.org/search?format=json&limit=1&q=" + encodeURIComponent(name))
        .then((r) => r.json())
        .then((rows) => (rows.length ? L.latLng(+rows[0].lat, +rows[0].lon) : null));
    Promise.all(locations.map(geocode)).then((points) => {
      const found = points.filter(Boolean);
      if (found.length === 1) {
        L.marker(found[0]).addTo(map).bindPopup(locations[0]).openPopup();
        map.setView(found[0], 10);
      } else if (found.length > 1) {
        L.Routing.control({ waypoints: found, routeWhileDragging: true }).addTo(map);
      }
    });
  </script>
</body>
</html>"#;

/// Month calendar; `TARGET_DATE` is a JSON string `YYYY-MM-DD`.
pub const CALENDAR_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <style>
    .calendar { font-family: Arial, sans-serif; max-width: 400px; margin: 20px auto; }
    .header { text-align: center; padding: 10px; background: #f0f0f0; font-size: 18px; }
    .grid { display: grid; grid-template-columns: repeat(7, 1fr); gap: 1px; background: #ddd; }
    .cell { background: white; padding: 10px; text-align: center; }
    .weekday { background: #f0f0f0; font-weight: bold; }
    .highlight { background: #ffeb3b; font-weight: bold; }
  </style>
</head>
<body>
  <div class="calendar">
    <div class="header" id="monthYear"></div>
    <div class="grid">
      <div class="cell weekday">Sun</div><div class="cell weekday">Mon</div>
      <div class="cell weekday">Tue</div><div class="cell weekday">Wed</div>
      <div class="cell weekday">Thu</div><div class="cell weekday">Fri</div>
      <div class="cell weekday">Sat</div>
    </div>
    <div class="grid" id="dates"></div>
  </div>
  <script>
    const [year, month, targetDay] = TARGET_DATE.split("-").map(Number);
    document.getElementById("monthYear").textContent =
      new Date(year, month - 1).toLocaleDateString("en-US", { month: "long", year: "numeric" });
    const firstDay = new Date(year, month - 1, 1).getDay();
    const daysInMonth = new Date(year, month, 0).getDate();
    const grid = document.getElementById("dates");
    for (let i = 0; i < 42; i++) {
      const cell = document.createElement("div");
      cell.className = "cell";
      const day = i - firstDay + 1;
      if (day > 0 && day <= daysInMonth) {
        cell.textContent = day;
        if (day === targetDay) cell.className = "cell highlight";
      }
      grid.appendChild(cell);
    }
  </script>
</body>
</html>"#;

/// Account table; `BANK_DATA_ROWS` is a run of `<tr>` elements.
pub const BANK_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <style>
    table { font-family: Arial, sans-serif; border-collapse: collapse; width: 100%; }
    th, td { border: 1px solid #ddd; padding: 8px; }
    th { background: #f0f0f0; text-align: left; }
    td.amount { text-align: right; font-variant-numeric: tabular-nums; }
  </style>
</head>
<body>
  <table>
    <thead>
      <tr><th>Account</th><th>Name</th><th>Product</th><th>Opened</th><th>Balance</th></tr>
    </thead>
    <tbody>
BANK_DATA_ROWS
    </tbody>
  </table>
</body>
</html>"#;

/// Flight search panel.
pub const FLIGHT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <style>
    .panel { font-family: Arial, sans-serif; max-width: 420px; margin: 20px auto; padding: 16px; border: 1px solid #ddd; border-radius: 8px; }
    .route { font-size: 22px; font-weight: bold; text-align: center; }
    .date { text-align: center; color: #555; margin: 8px 0 16px; }
    a.search { display: block; text-align: center; padding: 10px; background: #1a73e8; color: white; border-radius: 4px; text-decoration: none; }
  </style>
</head>
<body>
  <div class="panel">
    <div class="route">DEPARTURE_AIRPORT &#8594; ARRIVAL_AIRPORT</div>
    <div class="date">Departure: DEPARTURE_DATE</div>
    <a class="search" href="FLIGHT_SEARCH_URL" target="_blank" rel="noopener">Search flights</a>
  </div>
</body>
</html>"#;

/// Hotel search panel.
pub const HOTEL_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <style>
    .panel { font-family: Arial, sans-serif; max-width: 420px; margin: 20px auto; padding: 16px; border: 1px solid #ddd; border-radius: 8px; }
    .location { font-size: 22px; font-weight: bold; text-align: center; }
    .dates { text-align: center; color: #555; margin: 8px 0 16px; }
    a.search { display: block; text-align: center; padding: 10px; background: #003580; color: white; border-radius: 4px; text-decoration: none; }
  </style>
</head>
<body>
  <div class="panel">
    <div class="location">HOTEL_LOCATION</div>
    <div class="dates">CHECK_IN_DATE &#8594; CHECK_OUT_DATE</div>
    <a class="search" href="HOTEL_SEARCH_URL" target="_blank" rel="noopener">Search hotels</a>
  </div>
</body>
</html>"#;

/// Stock chart; `STOCK_SERIES` is a JSON array of points.
pub const STOCK_TEMPLATE: &str = r##"<!DOCTYPE html>
<html>
<head>
  <script src="https://cdn.jsdelivr.net/npm/chart.js"></script>
</head>
<body style="font-family: Arial, sans-serif">
  <h3>STOCK_SYMBOL (STOCK_INTERVAL)</h3>
  <canvas id="chart"></canvas>
  <script>
    const series = STOCK_SERIES;
    new Chart(document.getElementById("chart"), {
      type: "line",
      data: {
        labels: series.map((p) => p.date),
        datasets: [{ label: "Close", data: series.map((p) => p.close), borderColor: "#1a73e8", tension: 0.2 }]
      },
      options: { plugins: { legend: { display: false } } }
    });
  </script>
</body>
</html>"##;

/// Stock panel shown when quotes cannot be fetched.
pub const STOCK_FALLBACK_TEMPLATE: &str = r##"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; text-align: center; padding: 24px">
  <h3>STOCK_SYMBOL (STOCK_INTERVAL)</h3>
  <svg width="320" height="120" viewBox="0 0 320 120">
    <polyline fill="none" stroke="#bbb" stroke-width="3" points="0,90 40,70 80,80 120,50 160,60 200,35 240,45 280,20 320,30" />
  </svg>
  <p style="color:#777">Live price data is currently unavailable.</p>
</body>
</html>"##;

/// Weather chart; `WEATHER_DAILY` is a JSON array of daily ranges.
pub const WEATHER_TEMPLATE: &str = r##"<!DOCTYPE html>
<html>
<head>
  <script src="https://cdn.jsdelivr.net/npm/chart.js"></script>
</head>
<body style="font-family: Arial, sans-serif">
  <h3>Forecast for WEATHER_LATITUDE, WEATHER_LONGITUDE</h3>
  <canvas id="chart"></canvas>
  <script>
    const days = WEATHER_DAILY;
    new Chart(document.getElementById("chart"), {
      type: "line",
      data: {
        labels: days.map((d) => d.date),
        datasets: [
          { label: "High", data: days.map((d) => d.high), borderColor: "#e8711a" },
          { label: "Low", data: days.map((d) => d.low), borderColor: "#1a73e8" }
        ]
      }
    });
  </script>
</body>
</html>"##;

/// Weather panel shown when the forecast cannot be fetched.
pub const WEATHER_FALLBACK_TEMPLATE: &str = r##"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; text-align: center; padding: 24px">
  <h3>Forecast for WEATHER_LATITUDE, WEATHER_LONGITUDE</h3>
  <svg width="120" height="80" viewBox="0 0 120 80">
    <circle cx="40" cy="40" r="18" fill="#f5c542" />
    <ellipse cx="72" cy="50" rx="36" ry="18" fill="#ccc" />
  </svg>
  <p style="color:#777">Forecast data is currently unavailable.</p>
</body>
</html>"##;

/// Render the map for locations in reply order.
#[must_use]
pub fn render_map(locations: &[String]) -> String {
    fill(MAP_TEMPLATE, &[("LOCATIONS_ARRAY", &script_json(&locations))])
}

/// Render the calendar focused on `date`.
#[must_use]
pub fn render_calendar(date: NaiveDate) -> String {
    let iso = date.format("%Y-%m-%d").to_string();
    fill(CALENDAR_TEMPLATE, &[("TARGET_DATE", &script_json(&iso))])
}

/// Render the account table.
#[must_use]
pub fn render_bank(rows: &[BankRecord]) -> String {
    let rows: String = rows
        .iter()
        .map(|r| {
            format!(
                "      <tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td class=\"amount\">{:.2}</td></tr>\n",
                escape_html(&r.account),
                escape_html(&r.name),
                escape_html(&r.product),
                escape_html(&r.date),
                r.balance
            )
        })
        .collect();
    fill(BANK_TEMPLATE, &[("BANK_DATA_ROWS", rows.trim_end())])
}

/// Render the flight search panel.
#[must_use]
pub fn render_flight(from: &str, to: &str, date: NaiveDate) -> String {
    let from_code = airport_code(from);
    let to_code = airport_code(to);
    let iso = date.format("%Y-%m-%d").to_string();
    let query = format!("Flights from {from_code} to {to_code} on {iso}");
    let url = format!(
        "https://www.google.com/travel/flights?q={}",
        urlencoding::encode(&query)
    );
    fill(
        FLIGHT_TEMPLATE,
        &[
            ("DEPARTURE_AIRPORT", &escape_html(from_code)),
            ("ARRIVAL_AIRPORT", &escape_html(to_code)),
            ("DEPARTURE_DATE", &iso),
            ("FLIGHT_SEARCH_URL", &escape_html(&url)),
        ],
    )
}

/// Render the hotel search panel.
#[must_use]
pub fn render_hotel(check_in: NaiveDate, check_out: NaiveDate, location: &str) -> String {
    let check_in = check_in.format("%Y-%m-%d").to_string();
    let check_out = check_out.format("%Y-%m-%d").to_string();
    let url = format!(
        "https://www.booking.com/searchresults.html?ss={}&checkin={check_in}&checkout={check_out}",
        urlencoding::encode(location)
    );
    fill(
        HOTEL_TEMPLATE,
        &[
            ("HOTEL_LOCATION", &escape_html(location)),
            ("CHECK_IN_DATE", &check_in),
            ("CHECK_OUT_DATE", &check_out),
            ("HOTEL_SEARCH_URL", &escape_html(&url)),
        ],
    )
}

/// Render the stock chart.
#[must_use]
pub fn render_stock(symbol: &str, interval: StockInterval, points: &[StockPoint]) -> String {
    fill(
        STOCK_TEMPLATE,
        &[
            ("STOCK_SYMBOL", &escape_html(symbol)),
            ("STOCK_INTERVAL", interval.as_str()),
            ("STOCK_SERIES", &script_json(&points)),
        ],
    )
}

/// Render the fixed stock fallback.
#[must_use]
pub fn render_stock_fallback(symbol: &str, interval: StockInterval) -> String {
    fill(
        STOCK_FALLBACK_TEMPLATE,
        &[
            ("STOCK_SYMBOL", &escape_html(symbol)),
            ("STOCK_INTERVAL", interval.as_str()),
        ],
    )
}

/// Render the weather chart.
#[must_use]
pub fn render_weather(latitude: f64, longitude: f64, days: &[DailyForecast]) -> String {
    fill(
        WEATHER_TEMPLATE,
        &[
            ("WEATHER_LATITUDE", &latitude.to_string()),
            ("WEATHER_LONGITUDE", &longitude.to_string()),
            ("WEATHER_DAILY", &script_json(&days)),
        ],
    )
}

/// Render the fixed weather fallback.
#[must_use]
pub fn render_weather_fallback(latitude: f64, longitude: f64) -> String {
    fill(
        WEATHER_FALLBACK_TEMPLATE,
        &[
            ("WEATHER_LATITUDE", &latitude.to_string()),
            ("WEATHER_LONGITUDE", &longitude.to_string()),
        ],
    )
}

/// Escape text for HTML element content and quoted attributes.
#[must_use]
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Serialize a value as JSON that is safe inside a `<script>` element.
#[must_use]
pub fn script_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|_| "null".to_string())
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026")
}

/// Airport ids may come as `JFK.AIRPORT`; the code is the first segment.
fn airport_code(id: &str) -> &str {
    id.split('.').next().unwrap_or(id)
}

/// Replace every placeholder in one left-to-right pass.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    loop {
        let next = values
            .iter()
            .filter_map(|(key, value)| rest.find(key).map(|at| (at, *key, *value)))
            .min_by_key(|(at, key, _)| (*at, Reverse(key.len())));
        match next {
            Some((at, key, value)) => {
                out.push_str(&rest[..at]);
                out.push_str(value);
                rest = &rest[at + key.len()..];
            }
            None => {
                out.push_str(rest);
                return out;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap_or_default()
    }

    #[test]
    fn calendar_substitutes_date_once() {
        let html = render_calendar(date("2025-01-06"));
        assert_eq!(html.matches("2025-01-06").count(), 1);
        assert!(!html.contains("TARGET_DATE"));
    }

    #[test]
    fn map_embeds_location_array() {
        let html = render_map(&["New York City".to_string(), "Los Angeles".to_string()]);
        assert!(html.contains(r#"const locations = ["New York City","Los Angeles"];"#));
    }

    #[test]
    fn script_data_cannot_close_the_script() {
        let html = render_map(&["</script><script>alert(1)</script>".to_string()]);
        assert!(!html.contains("</script><script>alert"));
        assert!(html.contains("\\u003c/script\\u003e"));
    }

    #[test]
    fn bank_rows_are_escaped() {
        let rows = vec![BankRecord {
            account: "001".to_string(),
            name: "<b>Eve</b>".to_string(),
            product: "Savings".to_string(),
            date: "2020-01-01".to_string(),
            balance: 1234.5,
        }];
        let html = render_bank(&rows);
        assert!(html.contains("&lt;b&gt;Eve&lt;/b&gt;"));
        assert!(html.contains("1234.50"));
        assert!(!html.contains("BANK_DATA_ROWS"));
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        let html = render_hotel(date("2025-04-20"), date("2025-04-22"), "CHECK_OUT_DATE");
        assert!(html.contains("<div class=\"location\">CHECK_OUT_DATE</div>"));
        assert!(html.contains("2025-04-20 &#8594; 2025-04-22"));
    }

    #[test]
    fn flight_link_is_encoded() {
        let html = render_flight("JFK.AIRPORT", "LAX.AIRPORT", date("2025-03-01"));
        assert!(html.contains("JFK &#8594; LAX"));
        assert!(html.contains("q=Flights%20from%20JFK%20to%20LAX%20on%202025-03-01"));
    }

    #[test]
    fn hotel_link_escapes_ampersands() {
        let html = render_hotel(date("2025-04-20"), date("2025-04-22"), "New York City");
        assert!(html.contains("ss=New%20York%20City&amp;checkin=2025-04-20&amp;checkout=2025-04-22"));
    }

    #[test]
    fn stock_chart_embeds_series() {
        let points = vec![StockPoint {
            date: "2025-01-06 14:30".to_string(),
            open: Some(241.0),
            high: None,
            low: None,
            close: 243.5,
            volume: Some(1200),
            adjclose: None,
        }];
        let html = render_stock("AAPL", StockInterval::Day, &points);
        assert!(html.contains("<h3>AAPL (1d)</h3>"));
        assert!(html.contains(r#""date":"2025-01-06 14:30""#));
        assert!(html.contains(r#""close":243.5"#));
        assert!(html.contains(r##"borderColor: "#1a73e8""##));
        assert!(!html.contains("STOCK_"));
    }

    #[test]
    fn weather_chart_embeds_daily_ranges() {
        let days = vec![DailyForecast {
            date: date("2025-01-06"),
            high: 12.5,
            low: 3.0,
        }];
        let html = render_weather(48.8566, 2.3522, &days);
        assert!(html.contains("Forecast for 48.8566, 2.3522"));
        assert!(html.contains(r#""date":"2025-01-06""#));
        assert!(html.contains(r#""high":12.5"#));
        assert!(!html.contains("WEATHER_"));
    }

    #[test]
    fn fallbacks_fill_every_placeholder() {
        let stock = render_stock_fallback("AAPL", StockInterval::Day);
        assert!(stock.contains("AAPL (1d)"));
        let weather = render_weather_fallback(40.7143, -74.006);
        assert!(weather.contains("40.7143, -74.006"));
        for html in [stock, weather] {
            assert!(!html.contains("STOCK_"));
            assert!(!html.contains("WEATHER_"));
        }
    }
}
