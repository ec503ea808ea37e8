use crate::analysis::AnalysisReport;
use serde::{Deserialize, Serialize};

/// Configuration bundle for a single analysis run.
///
/// Every field is resolved by the caller (request value or configured
/// default) before the run starts; the engine treats them as immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub spreadsheet_id: String,
    pub read_range: String,
    pub write_range: String,
    pub credentials_path: String,
    pub model: String,
    pub service_url: String,
    /// Optional free-text context appended to the insight prompt.
    pub context: String,
}

impl AnalysisConfig {
    /// Validate the bundle before handing it to the engine.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.spreadsheet_id.is_empty() {
            anyhow::bail!("spreadsheet_id is required");
        }
        Ok(())
    }
}

/// The single mutable record threaded through the pipeline.
///
/// One fresh instance is created per run and exclusively owned by that
/// run's executor; steps never mutate it directly, they return partial
/// updates the executor merges in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisState {
    pub spreadsheet_id: String,
    pub read_range: String,
    pub write_range: String,
    pub credentials_path: String,
    pub model: String,
    pub service_url: String,
    pub context: String,
    /// Fetched table; first row is the header. Empty until the fetch step
    /// succeeds.
    pub raw_rows: Vec<Vec<String>>,
    /// Column summaries; populated by the summarize step.
    pub analysis: Option<AnalysisReport>,
    /// Narrative produced by the insight step.
    pub insights: String,
    /// Empty means no error so far. Once non-empty it is terminal for the
    /// rest of the run; later steps pass it through unchanged.
    pub error: String,
}

impl AnalysisState {
    /// Create a fresh record from a validated configuration bundle.
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            spreadsheet_id: config.spreadsheet_id,
            read_range: config.read_range,
            write_range: config.write_range,
            credentials_path: config.credentials_path,
            model: config.model,
            service_url: config.service_url,
            context: config.context,
            raw_rows: Vec::new(),
            analysis: None,
            insights: String::new(),
            error: String::new(),
        }
    }

    /// Split the final record into the caller-facing result: the success
    /// bundle, or the error message if any step reported one.
    pub fn into_outcome(self) -> Result<AnalysisOutcome, String> {
        if !self.error.is_empty() {
            return Err(self.error);
        }

        Ok(AnalysisOutcome {
            rows_read: self.raw_rows.len(),
            analysis: self.analysis,
            insights: self.insights,
            spreadsheet_id: self.spreadsheet_id,
            write_range: self.write_range,
        })
    }
}

/// Success bundle returned to the caller after a completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub rows_read: usize,
    pub analysis: Option<AnalysisReport>,
    pub insights: String,
    pub spreadsheet_id: String,
    pub write_range: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AnalysisConfig {
        AnalysisConfig {
            spreadsheet_id: "sheet-1".to_string(),
            read_range: "Sheet1!A1:Z1000".to_string(),
            write_range: "Sheet1!AB1".to_string(),
            credentials_path: "credentials/service_account.json".to_string(),
            model: "llama2".to_string(),
            service_url: "http://localhost:11434".to_string(),
            context: String::new(),
        }
    }

    #[test]
    fn test_validate_requires_spreadsheet_id() {
        let mut cfg = config();
        assert!(cfg.validate().is_ok());

        cfg.spreadsheet_id.clear();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_fresh_state_has_empty_derived_fields() {
        let state = AnalysisState::new(config());
        assert!(state.raw_rows.is_empty());
        assert!(state.analysis.is_none());
        assert!(state.insights.is_empty());
        assert!(state.error.is_empty());
    }

    #[test]
    fn test_into_outcome_success() {
        let mut state = AnalysisState::new(config());
        state.raw_rows = vec![
            vec!["name".to_string()],
            vec!["Alice".to_string()],
        ];
        state.insights = "Some narrative".to_string();

        let outcome = state.into_outcome().unwrap();
        assert_eq!(outcome.rows_read, 2);
        assert_eq!(outcome.insights, "Some narrative");
        assert_eq!(outcome.spreadsheet_id, "sheet-1");
        assert_eq!(outcome.write_range, "Sheet1!AB1");
    }

    #[test]
    fn test_into_outcome_error() {
        let mut state = AnalysisState::new(config());
        state.error = "Data reading failed: not found".to_string();

        let err = state.into_outcome().unwrap_err();
        assert_eq!(err, "Data reading failed: not found");
    }
}
