use crate::jobs::JobRegistry;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sheetsage_core::llm::OllamaClient;
use sheetsage_core::sheets::SheetsClient;
use sheetsage_core::workflow::{analysis_pipeline, Pipeline};
use sheetsage_core::AnalysisConfig;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub analysis: AnalysisDefaults,
}

/// Defaults applied to analysis requests that omit a field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisDefaults {
    /// Spreadsheet analyzed when a request names none. Empty means every
    /// request must name one.
    #[serde(default)]
    pub spreadsheet_id: String,

    #[serde(default = "default_read_range")]
    pub read_range: String,

    #[serde(default = "default_write_range")]
    pub write_range: String,

    #[serde(default = "default_credentials_path")]
    pub credentials_path: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_service_url")]
    pub service_url: String,

    #[serde(default)]
    pub context: String,
}

fn default_read_range() -> String {
    "Sheet1!A1:Z1000".to_string()
}

fn default_write_range() -> String {
    "Sheet1!AB1".to_string()
}

fn default_credentials_path() -> String {
    "credentials/service_account.json".to_string()
}

fn default_model() -> String {
    "llama2".to_string()
}

fn default_service_url() -> String {
    "http://localhost:11434".to_string()
}

impl Default for AnalysisDefaults {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            read_range: default_read_range(),
            write_range: default_write_range(),
            credentials_path: default_credentials_path(),
            model: default_model(),
            service_url: default_service_url(),
            context: String::new(),
        }
    }
}

impl AnalysisDefaults {
    /// Expand the defaults into a full per-run configuration bundle.
    pub fn to_config(&self) -> AnalysisConfig {
        AnalysisConfig {
            spreadsheet_id: self.spreadsheet_id.clone(),
            read_range: self.read_range.clone(),
            write_range: self.write_range.clone(),
            credentials_path: self.credentials_path.clone(),
            model: self.model.clone(),
            service_url: self.service_url.clone(),
            context: self.context.clone(),
        }
    }
}

impl ServerConfig {
    pub fn load(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)
                .context("Failed to read configuration file")?;
            toml::from_str(&content).context("Failed to parse configuration file")
        } else {
            tracing::info!("Configuration file not found, using defaults");
            Ok(Self::default())
        }
    }
}

/// Build the standard pipeline over the concrete collaborators.
pub fn default_pipeline() -> Pipeline {
    analysis_pipeline(Arc::new(SheetsClient::new()), Arc::new(OllamaClient::new()))
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub jobs: Arc<JobRegistry>,
    pub pipeline: Arc<Pipeline>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            jobs: Arc::new(JobRegistry::new()),
            pipeline: Arc::new(default_pipeline()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = ServerConfig::load(Path::new("/nonexistent/sheetsage.toml")).unwrap();
        assert_eq!(config.analysis.read_range, "Sheet1!A1:Z1000");
        assert_eq!(config.analysis.model, "llama2");
        assert_eq!(config.analysis.service_url, "http://localhost:11434");
        assert!(config.analysis.spreadsheet_id.is_empty());
    }

    #[test]
    fn test_partial_file_keeps_remaining_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheetsage.toml");
        std::fs::write(
            &path,
            "[analysis]\nspreadsheet_id = \"sheet-42\"\nmodel = \"qwen2.5:0.5b\"\n",
        )
        .unwrap();

        let config = ServerConfig::load(&path).unwrap();
        assert_eq!(config.analysis.spreadsheet_id, "sheet-42");
        assert_eq!(config.analysis.model, "qwen2.5:0.5b");
        assert_eq!(config.analysis.write_range, "Sheet1!AB1");
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheetsage.toml");
        std::fs::write(&path, "analysis = 3").unwrap();

        assert!(ServerConfig::load(&path).is_err());
    }
}
