//! Spreadsheet service client (Google Sheets v4 values endpoint).

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Failures reported by the spreadsheet service.
#[derive(Debug, Error)]
pub enum SheetsError {
    #[error("spreadsheet not found")]
    NotFound,
    #[error("authentication with the spreadsheet service failed")]
    Auth,
    #[error("invalid range '{0}'")]
    InvalidRange(String),
    #[error("credentials unavailable: {0}")]
    Credentials(String),
    #[error("spreadsheet service unreachable: {0}")]
    Transport(String),
    #[error("spreadsheet service returned status {0}")]
    Api(u16),
}

/// Read-only access to a remote spreadsheet.
#[async_trait]
pub trait SpreadsheetReader: Send + Sync {
    /// Fetch the cell grid for `range`. The credentials path is opaque to
    /// the engine and consumed only here.
    async fn read(
        &self,
        spreadsheet_id: &str,
        range: &str,
        credentials_path: &str,
    ) -> Result<Vec<Vec<String>>, SheetsError>;
}

const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com";

/// HTTP client for the Sheets v4 REST API.
#[derive(Debug, Clone)]
pub struct SheetsClient {
    http: reqwest::Client,
    base_url: String,
}

/// Credentials file contents. Either a ready-to-use access token or an API
/// key for public sheets.
#[derive(Debug, Deserialize)]
struct ServiceCredentials {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    api_key: Option<String>,
}

/// Response body of the `values.get` endpoint. The `values` key is absent
/// for an empty range.
#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

impl SheetsClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    async fn load_credentials(&self, path: &str) -> Result<ServiceCredentials, SheetsError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| SheetsError::Credentials(format!("{path}: {e}")))?;

        serde_json::from_str(&raw)
            .map_err(|e| SheetsError::Credentials(format!("{path}: {e}")))
    }
}

impl Default for SheetsClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpreadsheetReader for SheetsClient {
    async fn read(
        &self,
        spreadsheet_id: &str,
        range: &str,
        credentials_path: &str,
    ) -> Result<Vec<Vec<String>>, SheetsError> {
        let credentials = self.load_credentials(credentials_path).await?;

        let url = format!(
            "{}/v4/spreadsheets/{}/values/{}",
            self.base_url, spreadsheet_id, range
        );

        let mut request = self.http.get(&url);
        if let Some(token) = credentials.access_token {
            request = request.bearer_auth(token);
        } else if let Some(key) = credentials.api_key {
            request = request.query(&[("key", key)]);
        } else {
            return Err(SheetsError::Credentials(
                "credentials file carries neither access_token nor api_key".to_string(),
            ));
        }

        let response = request
            .send()
            .await
            .map_err(|e| SheetsError::Transport(e.to_string()))?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => return Err(SheetsError::Auth),
            StatusCode::NOT_FOUND => return Err(SheetsError::NotFound),
            StatusCode::BAD_REQUEST => {
                return Err(SheetsError::InvalidRange(range.to_string()))
            }
            status => return Err(SheetsError::Api(status.as_u16())),
        }

        let body: ValueRange = response
            .json()
            .await
            .map_err(|e| SheetsError::Transport(e.to_string()))?;

        let rows: Vec<Vec<String>> = body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect();

        tracing::debug!(spreadsheet_id, range, rows = rows.len(), "sheet read complete");

        Ok(rows)
    }
}

/// The values endpoint returns heterogeneous scalars; the pipeline works
/// on their textual form.
fn cell_to_string(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}
