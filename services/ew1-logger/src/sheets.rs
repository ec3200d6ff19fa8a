//! Google Sheets output over the Sheets REST API v4
//!
//! Authenticates with a pre-issued OAuth bearer token. The next row is found
//! by reading column A, so rows land directly below the last timestamp.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use ew1_registers::PollSnapshot;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::SheetsConfig;
use crate::error::SinkError;
use crate::sink::{format_row, header_row, RowSink};

pub const DEFAULT_API_BASE: &str = "https://sheets.googleapis.com";
pub const DEFAULT_WORKSHEET: &str = "Sheet1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Extract the spreadsheet id from `.../spreadsheets/d/<id>/...` or accept a
/// bare id
pub fn parse_spreadsheet_id(url_or_id: &str) -> Result<String, SinkError> {
    let trimmed = url_or_id.trim();
    if trimmed.is_empty() {
        return Err(SinkError::InvalidSpreadsheet(
            "no spreadsheet configured (sheets.spreadsheet_url)".to_string(),
        ));
    }

    if !trimmed.contains('/') {
        return Ok(trimmed.to_string());
    }

    let mut segments = trimmed.split('/');
    segments
        .by_ref()
        .find(|segment| *segment == "d")
        .and_then(|_| segments.next())
        .filter(|id| !id.is_empty())
        .map(String::from)
        .ok_or_else(|| SinkError::InvalidSpreadsheet(format!("no spreadsheet id in {trimmed}")))
}

/// A1 range on `worksheet`, quoted so names with spaces work
pub fn sheet_range(worksheet: &str, cells: &str) -> String {
    format!("'{}'!{}", worksheet.replace('\'', "''"), cells)
}

/// Values payload of the `spreadsheets.values` endpoints
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValueRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    major_dimension: Option<String>,
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

impl ValueRange {
    fn rows(range: String, rows: Vec<Vec<String>>) -> Self {
        Self {
            range: Some(range),
            major_dimension: Some("ROWS".to_string()),
            values: rows
                .into_iter()
                .map(|row| row.into_iter().map(serde_json::Value::String).collect())
                .collect(),
        }
    }

    /// First row rendered as strings
    fn first_row(&self) -> Vec<String> {
        self.values
            .first()
            .map(|row| row.iter().map(cell_text).collect())
            .unwrap_or_default()
    }
}

fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Row after the last filled row of column A
///
/// The API omits trailing empty rows, so the row count reaches exactly the
/// last non-empty cell.
fn next_row(column_a: &ValueRange) -> usize {
    column_a.values.len() + 1
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Writes rows into one worksheet of a Google spreadsheet
#[derive(Debug, Clone)]
pub struct SheetsSink {
    client: Client,
    base: Url,
    spreadsheet_id: String,
    worksheet: String,
    token: String,
}

impl SheetsSink {
    pub fn new(
        spreadsheet: &str,
        worksheet: Option<&str>,
        token: impl Into<String>,
    ) -> Result<Self, SinkError> {
        let token = token.into();
        if token.is_empty() {
            return Err(SinkError::MissingToken);
        }
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let base = Url::parse(DEFAULT_API_BASE)
            .map_err(|e| SinkError::InvalidSpreadsheet(e.to_string()))?;

        Ok(Self {
            client,
            base,
            spreadsheet_id: parse_spreadsheet_id(spreadsheet)?,
            worksheet: worksheet
                .filter(|w| !w.is_empty())
                .unwrap_or(DEFAULT_WORKSHEET)
                .to_string(),
            token,
        })
    }

    /// Build from the `sheets` config section, resolving the token
    pub fn from_config(config: &SheetsConfig) -> Result<Self, SinkError> {
        let token = config.resolve_token().ok_or(SinkError::MissingToken)?;
        Self::new(&config.spreadsheet_url, config.worksheet.as_deref(), token)
    }

    /// Point at another API host (proxies, test servers)
    pub fn with_base_url(mut self, base: &str) -> Result<Self, SinkError> {
        self.base = Url::parse(base).map_err(|e| SinkError::InvalidSpreadsheet(e.to_string()))?;
        Ok(self)
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    pub fn worksheet(&self) -> &str {
        &self.worksheet
    }

    fn values_url(&self, range: &str) -> Result<Url, SinkError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| SinkError::InvalidSpreadsheet(format!("bad API base {}", self.base)))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", self.spreadsheet_id.as_str(), "values", range]);
        Ok(url)
    }

    async fn get_values(&self, range: &str) -> Result<ValueRange, SinkError> {
        let response = self
            .client
            .get(self.values_url(range)?)
            .bearer_auth(&self.token)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    async fn put_values(&self, range: &str, rows: Vec<Vec<String>>) -> Result<(), SinkError> {
        let mut url = self.values_url(range)?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED");

        let response = self
            .client
            .put(url)
            .bearer_auth(&self.token)
            .json(&ValueRange::rows(range.to_string(), rows))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}

/// Turn a non-2xx response into `SinkError::Api` with Google's message
async fn check(response: reqwest::Response) -> Result<reqwest::Response, SinkError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&body)
        .map(|b| b.error.message)
        .unwrap_or(body);
    Err(SinkError::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl RowSink for SheetsSink {
    async fn setup_header(&mut self, columns: &[String]) -> Result<(), SinkError> {
        let expected = header_row(columns);
        let existing = self
            .get_values(&sheet_range(&self.worksheet, "1:1"))
            .await?
            .first_row();

        if existing == expected {
            debug!("Header row already up to date");
            return Ok(());
        }

        self.put_values(&sheet_range(&self.worksheet, "A1"), vec![expected])
            .await?;
        info!("Header row written to {}", self.worksheet);
        Ok(())
    }

    async fn append_row(
        &mut self,
        timestamp: NaiveDateTime,
        snapshot: &PollSnapshot,
        columns: &[String],
    ) -> Result<usize, SinkError> {
        let column_a = self
            .get_values(&sheet_range(&self.worksheet, "A:A"))
            .await?;
        let row = next_row(&column_a);

        self.put_values(
            &sheet_range(&self.worksheet, &format!("A{row}")),
            vec![format_row(timestamp, snapshot, columns)],
        )
        .await?;
        debug!("Wrote row {} to {}", row, self.worksheet);
        Ok(row)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_parse_spreadsheet_id() {
        assert_eq!(
            parse_spreadsheet_id("https://docs.google.com/spreadsheets/d/1AbC-xyz_9/edit#gid=0")
                .unwrap(),
            "1AbC-xyz_9"
        );
        assert_eq!(parse_spreadsheet_id("1AbC-xyz_9").unwrap(), "1AbC-xyz_9");
        assert!(parse_spreadsheet_id("").is_err());
        assert!(parse_spreadsheet_id("https://docs.google.com/spreadsheets/").is_err());
    }

    #[test]
    fn test_sheet_range_quotes_name() {
        assert_eq!(sheet_range("Sheet1", "A:A"), "'Sheet1'!A:A");
        assert_eq!(sheet_range("Pannrum 1", "A1"), "'Pannrum 1'!A1");
        assert_eq!(sheet_range("Bob's", "1:1"), "'Bob''s'!1:1");
    }

    #[test]
    fn test_next_row_from_column_a() {
        let empty: ValueRange = serde_json::from_str(r#"{"range": "'Sheet1'!A1:A1000"}"#).unwrap();
        assert_eq!(next_row(&empty), 1);

        let filled: ValueRange = serde_json::from_str(
            r#"{"range": "'Sheet1'!A1:A1000", "majorDimension": "ROWS",
                "values": [["Timestamp"], ["2026-01-15 08:00:00"], ["2026-01-15 08:05:00"]]}"#,
        )
        .unwrap();
        assert_eq!(next_row(&filled), 4);
    }

    #[test]
    fn test_first_row_renders_cells() {
        let header: ValueRange =
            serde_json::from_str(r#"{"values": [["Timestamp", "temp_1", 3]]}"#).unwrap();
        assert_eq!(header.first_row(), vec!["Timestamp", "temp_1", "3"]);
    }

    #[test]
    fn test_values_url_encodes_range() {
        let sink = SheetsSink::new("abc", Some("Pannrum 1"), "token").unwrap();
        let url = sink.values_url(&sheet_range(sink.worksheet(), "A:A")).unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/abc/values/'Pannrum%201'!A:A"
        );
    }

    #[test]
    fn test_put_body_shape() {
        let body = ValueRange::rows(
            "'Sheet1'!A2".to_string(),
            vec![vec!["2026-01-15 08:00:00".to_string(), "".to_string()]],
        );
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({
                "range": "'Sheet1'!A2",
                "majorDimension": "ROWS",
                "values": [["2026-01-15 08:00:00", ""]]
            })
        );
    }

    #[test]
    fn test_defaults_and_missing_token() {
        let sink = SheetsSink::new("abc", None, "token").unwrap();
        assert_eq!(sink.worksheet(), "Sheet1");
        assert_eq!(sink.spreadsheet_id(), "abc");
        assert!(matches!(
            SheetsSink::new("abc", None, "").unwrap_err(),
            SinkError::MissingToken
        ));
    }
}
