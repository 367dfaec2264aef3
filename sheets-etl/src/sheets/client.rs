//! Sheets v4 REST client

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{GoogleAuth, SpreadsheetGateway};
use crate::config::GoogleConfig;

const DEFAULT_API_BASE: &str = "https://sheets.googleapis.com/v4";

/// Body of `spreadsheets.values.get`
#[derive(Debug, Deserialize)]
struct ValueRange {
    /// Absent when the range holds no data
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

pub struct SheetsClient {
    http: reqwest::Client,
    auth: GoogleAuth,
    api_base: String,
}

impl SheetsClient {
    pub fn new(http: reqwest::Client, auth: GoogleAuth, api_base: Option<&str>) -> Self {
        SheetsClient {
            http,
            auth,
            api_base: api_base
                .unwrap_or(DEFAULT_API_BASE)
                .trim_end_matches('/')
                .to_string(),
        }
    }

    pub fn from_config(config: &GoogleConfig) -> Result<Self> {
        let http = reqwest::Client::new();
        let auth = GoogleAuth::from_config(config, http.clone())?;
        Ok(Self::new(http, auth, config.api_base.as_deref()))
    }

    fn values_url(&self, document_id: &str, range: &str) -> String {
        format!(
            "{}/spreadsheets/{}/values/{}",
            self.api_base,
            urlencoding::encode(document_id),
            urlencoding::encode(range)
        )
    }
}

#[async_trait]
impl SpreadsheetGateway for SheetsClient {
    async fn read(&self, document_id: &str, range: &str) -> Result<Vec<Vec<String>>> {
        let token = self.auth.access_token().await?;
        let response = self
            .http
            .get(self.values_url(document_id, range))
            .bearer_auth(token)
            .send()
            .await
            .with_context(|| format!("Failed to read {} from sheet {}", range, document_id))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!(
                "Sheets API returned {} reading {} from {}: {}",
                status,
                range,
                document_id,
                body
            );
        }

        let body: ValueRange = response
            .json()
            .await
            .context("Failed to parse Sheets values response")?;

        Ok(cells_to_strings(body.values))
    }

    async fn append(&self, document_id: &str, range: &str, rows: &[Vec<String>]) -> Result<()> {
        let token = self.auth.access_token().await?;
        let url = format!("{}:append", self.values_url(document_id, range));
        let response = self
            .http
            .post(url)
            .query(&[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")])
            .bearer_auth(token)
            .json(&json!({ "values": rows }))
            .send()
            .await
            .with_context(|| format!("Failed to append to {} in sheet {}", range, document_id))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!(
                "Sheets API returned {} appending to {} in {}: {}",
                status,
                range,
                document_id,
                body
            );
        }

        log::debug!("Appended {} row(s) to {} in {}", rows.len(), range, document_id);
        Ok(())
    }
}

fn cells_to_strings(values: Vec<Vec<Value>>) -> Vec<Vec<String>> {
    values
        .into_iter()
        .map(|row| row.into_iter().map(cell_to_string).collect())
        .collect()
}

/// Formatted values arrive as strings; anything else is rendered as text
fn cell_to_string(cell: Value) -> String {
    match cell {
        Value::String(s) => s,
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_range_decoding() {
        let body: ValueRange = serde_json::from_value(json!({
            "range": "Sheet1!A1:C3",
            "majorDimension": "ROWS",
            "values": [["Name", "Email"], ["Alice", "a@x.com", 3], ["Bob", null, true]]
        }))
        .unwrap();

        assert_eq!(
            cells_to_strings(body.values),
            vec![
                vec!["Name".to_string(), "Email".to_string()],
                vec!["Alice".to_string(), "a@x.com".to_string(), "3".to_string()],
                vec!["Bob".to_string(), String::new(), "true".to_string()],
            ]
        );
    }

    #[test]
    fn test_empty_range_has_no_values_key() {
        let body: ValueRange =
            serde_json::from_value(json!({"range": "Sheet1!A1:C3", "majorDimension": "ROWS"}))
                .unwrap();
        assert!(body.values.is_empty());
    }

    #[test]
    fn test_values_url_encodes_range() {
        let client = SheetsClient::new(
            reqwest::Client::new(),
            GoogleAuth::static_token("t"),
            Some("https://example.test/v4/"),
        );
        assert_eq!(
            client.values_url("doc-1", "Form Responses 1!A1:G"),
            "https://example.test/v4/spreadsheets/doc-1/values/Form%20Responses%201%21A1%3AG"
        );
    }
}
