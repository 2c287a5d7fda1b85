//! Bank records from a delimited text resource.

use async_trait::async_trait;
use tracing::debug;

use crate::widgets::error::{WidgetError, WidgetResult};
use crate::widgets::sources::{send_checked, BankSource};
use crate::widgets::types::BankRecord;

const SOURCE: &str = "bank";

/// Fields per record: account, name, product, date, balance.
const FIELD_COUNT: usize = 5;

/// Fetches records over HTTP from a configured location.
pub struct HttpBankSource {
    client: reqwest::Client,
    url: Option<String>,
}

impl HttpBankSource {
    /// Create a source; without a URL every fetch reports `NotConfigured`.
    #[must_use]
    pub const fn new(client: reqwest::Client, url: Option<String>) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl BankSource for HttpBankSource {
    async fn fetch_records(&self) -> WidgetResult<Vec<BankRecord>> {
        let url = self.url.as_deref().ok_or(WidgetError::NotConfigured(SOURCE))?;
        let body = send_checked(self.client.get(url), SOURCE)
            .await?
            .text()
            .await?;

        let records = parse_bank_records(&body);
        debug!(count = records.len(), "parsed bank records");
        if records.is_empty() {
            return Err(WidgetError::NoData(SOURCE));
        }
        Ok(records)
    }
}

/// Parse comma-delimited records, skipping blank and malformed lines.
#[must_use]
pub fn parse_bank_records(body: &str) -> Vec<BankRecord> {
    body.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<BankRecord> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != FIELD_COUNT {
        return None;
    }
    let balance = fields[4].parse::<f64>().ok()?;
    Some(BankRecord {
        account: fields[0].to_string(),
        name: fields[1].to_string(),
        product: fields[2].to_string(),
        date: fields[3].to_string(),
        balance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_header_blank_and_short_lines() {
        let body = "account,name,product,date,balance\n\
                    1001, Alice, Checking, 2021-03-04, 2500.75\n\
                    \n\
                    1002,Bob,Savings\n\
                    1003,Carol,Savings,2019-11-30,-12.5\n";
        let records = parse_bank_records(body);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "Alice");
        assert!((records[0].balance - 2500.75).abs() < f64::EPSILON);
        assert_eq!(records[1].account, "1003");
    }

    #[tokio::test]
    async fn unconfigured_source_reports_it() {
        let source = HttpBankSource::new(reqwest::Client::new(), None);
        let result = source.fetch_records().await;
        assert!(matches!(result, Err(WidgetError::NotConfigured("bank"))));
    }
}
