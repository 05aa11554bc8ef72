//! Thin client for the Google Sheets v4 `values` endpoints.

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use url::Url;

use super::auth::TokenSource;

pub const API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets/";

#[derive(Error, Debug)]
pub enum SheetsError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Sheets API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("cannot address range `{0}`")]
    Range(String),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ValueRange<'a> {
    range: &'a str,
    major_dimension: &'static str,
    values: &'a [Vec<String>],
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct UpdateValuesResponse {
    #[serde(default)]
    updated_rows: u64,
    #[serde(default)]
    updated_cells: u64,
}

#[derive(Deserialize)]
struct AppendValuesResponse {
    #[serde(default)]
    updates: UpdateValuesResponse,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClearValuesResponse {
    #[serde(default)]
    cleared_range: Option<String>,
}

#[derive(Deserialize)]
struct ReadValuesResponse {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// A1 reference on `sheet`, quoting the sheet name when Sheets requires it.
/// `cells` of `None` addresses the whole sheet.
pub fn a1_range(sheet: &str, cells: Option<&str>) -> String {
    let plain = !sheet.is_empty() && sheet.chars().all(|c| c.is_alphanumeric() || c == '_');
    let name = if plain {
        sheet.to_string()
    } else {
        format!("'{}'", sheet.replace('\'', "''"))
    };
    match cells {
        Some(cells) => format!("{}!{}", name, cells),
        None => name,
    }
}

pub struct SheetsClient {
    http: Client,
    api_base: Url,
    spreadsheet_id: String,
    tokens: TokenSource,
}

impl SheetsClient {
    pub fn new(http: Client, spreadsheet_id: impl Into<String>, tokens: TokenSource) -> Self {
        Self {
            http,
            api_base: Url::parse(API_BASE).expect("static Sheets API base parses"),
            spreadsheet_id: spreadsheet_id.into(),
            tokens,
        }
    }

    /// Points the client at another endpoint, e.g. a local emulator.
    pub fn with_api_base(mut self, api_base: Url) -> Self {
        self.api_base = api_base;
        self
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    pub fn values_url(&self, range: &str, action: Option<&str>) -> Result<Url, SheetsError> {
        if range.trim().is_empty() {
            return Err(SheetsError::Range(range.to_string()));
        }
        let last = match action {
            Some(action) => format!("{}:{}", range, action),
            None => range.to_string(),
        };
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| SheetsError::Range(range.to_string()))?
            .pop_if_empty()
            .push(&self.spreadsheet_id)
            .push("values")
            .push(&last);
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, SheetsError> {
        let token = self.tokens.token().await?;
        let response = request.bearer_auth(token).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(response.json::<T>().await?)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(SheetsError::Api {
                status: status.as_u16(),
                body,
            })
        }
    }

    /// Clears the values in `range`, leaving formatting alone.
    pub async fn clear(&self, range: &str) -> Result<(), SheetsError> {
        let url = self.values_url(range, Some("clear"))?;
        let resp: ClearValuesResponse = self.send(self.http.post(url).json(&serde_json::json!({}))).await?;
        debug!(range, cleared = ?resp.cleared_range, "range cleared");
        Ok(())
    }

    /// Overwrites cells starting at `range`. Returns the updated cell count.
    pub async fn update(&self, range: &str, values: &[Vec<String>]) -> Result<u64, SheetsError> {
        let mut url = self.values_url(range, None)?;
        url.query_pairs_mut().append_pair("valueInputOption", "USER_ENTERED");
        let body = ValueRange {
            range,
            major_dimension: "ROWS",
            values,
        };
        let resp: UpdateValuesResponse = self.send(self.http.put(url).json(&body)).await?;
        debug!(range, rows = resp.updated_rows, cells = resp.updated_cells, "values updated");
        Ok(resp.updated_cells)
    }

    /// Appends rows after the last table row found in `range`. Returns the
    /// appended row count.
    pub async fn append(&self, range: &str, values: &[Vec<String>]) -> Result<u64, SheetsError> {
        let mut url = self.values_url(range, Some("append"))?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED")
            .append_pair("insertDataOption", "INSERT_ROWS");
        let body = ValueRange {
            range,
            major_dimension: "ROWS",
            values,
        };
        let resp: AppendValuesResponse = self.send(self.http.post(url).json(&body)).await?;
        Ok(resp.updates.updated_rows)
    }

    /// Formatted cell text of `range`, row by row.
    pub async fn read(&self, range: &str) -> Result<Vec<Vec<String>>, SheetsError> {
        let url = self.values_url(range, None)?;
        let resp: ReadValuesResponse = self.send(self.http.get(url)).await?;
        Ok(resp
            .values
            .into_iter()
            .map(|row| row.into_iter().map(value_text).collect())
            .collect())
    }
}

fn value_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
