//! The four stages of the analysis pipeline.

use super::executor::Pipeline;
use super::step::{StateUpdate, Step, StepOutcome};
use crate::analysis::Summarizer;
use crate::llm::{craft_prompt, InsightGenerator};
use crate::sheets::SpreadsheetReader;
use crate::types::AnalysisState;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Build the standard pipeline: fetch → summarize → insights → validate.
pub fn analysis_pipeline(
    reader: Arc<dyn SpreadsheetReader>,
    generator: Arc<dyn InsightGenerator>,
) -> Pipeline {
    Pipeline::builder()
        .step(FetchRowsStep::new(reader))
        .step(SummarizeStep::new())
        .step(GenerateInsightsStep::new(generator))
        .step(ValidateOutputStep)
        .build()
}

/// Step 1: fetch the cell grid from the spreadsheet service.
pub struct FetchRowsStep {
    reader: Arc<dyn SpreadsheetReader>,
}

impl FetchRowsStep {
    pub fn new(reader: Arc<dyn SpreadsheetReader>) -> Self {
        Self { reader }
    }
}

#[async_trait]
impl Step for FetchRowsStep {
    fn name(&self) -> &'static str {
        "fetch_rows"
    }

    async fn run(&self, state: &AnalysisState) -> Result<StepOutcome> {
        let result = self
            .reader
            .read(
                &state.spreadsheet_id,
                &state.read_range,
                &state.credentials_path,
            )
            .await;

        match result {
            Ok(rows) => {
                tracing::info!(rows = rows.len(), "fetched rows from sheet");
                Ok(StepOutcome::advance(StateUpdate {
                    raw_rows: Some(rows),
                    ..Default::default()
                }))
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to read sheet");
                Ok(StepOutcome::advance(StateUpdate::error(format!(
                    "Data reading failed: {e}"
                ))))
            }
        }
    }
}

/// Step 2: compute descriptive statistics over the fetched rows.
pub struct SummarizeStep {
    summarizer: Summarizer,
}

impl SummarizeStep {
    pub fn new() -> Self {
        Self {
            summarizer: Summarizer::new(),
        }
    }
}

impl Default for SummarizeStep {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Step for SummarizeStep {
    fn name(&self) -> &'static str {
        "summarize"
    }

    async fn run(&self, state: &AnalysisState) -> Result<StepOutcome> {
        // An earlier failure is terminal; pass it through untouched.
        if !state.error.is_empty() {
            return Ok(StepOutcome::advance(StateUpdate::none()));
        }

        if state.raw_rows.is_empty() {
            return Ok(StepOutcome::advance(StateUpdate::error(
                "No data to analyze",
            )));
        }

        let report = self.summarizer.summarize(&state.raw_rows);
        if let Some(message) = report.error {
            return Ok(StepOutcome::advance(StateUpdate::error(message)));
        }

        tracing::info!(
            numeric_columns = report.numerical.len(),
            categorical_columns = report.categorical.len(),
            "data analysis completed"
        );

        Ok(StepOutcome::advance(StateUpdate {
            analysis: Some(report),
            ..Default::default()
        }))
    }
}

/// Step 3: ask the language model for a narrative over the analysis.
///
/// A failing model call degrades to a fallback insights string instead of
/// an error; the run still reaches validation with a usable result.
pub struct GenerateInsightsStep {
    generator: Arc<dyn InsightGenerator>,
}

impl GenerateInsightsStep {
    pub fn new(generator: Arc<dyn InsightGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Step for GenerateInsightsStep {
    fn name(&self) -> &'static str {
        "generate_insights"
    }

    async fn run(&self, state: &AnalysisState) -> Result<StepOutcome> {
        if !state.error.is_empty() {
            return Ok(StepOutcome::advance(StateUpdate::none()));
        }

        let Some(report) = &state.analysis else {
            return Ok(StepOutcome::advance(StateUpdate::error(
                "Cannot generate insights: analysis is missing",
            )));
        };
        if let Some(marker) = &report.error {
            return Ok(StepOutcome::advance(StateUpdate::error(format!(
                "Cannot generate insights: {marker}"
            ))));
        }

        let sections = craft_prompt(report, &state.context);
        let insights = match self
            .generator
            .generate(&sections, &state.model, &state.service_url)
            .await
        {
            Ok(text) => {
                tracing::info!("insights generated");
                text
            }
            Err(e) => {
                tracing::warn!(error = %e, "insight generation degraded to fallback");
                format!("Insights unavailable: the language model request failed ({e})")
            }
        };

        Ok(StepOutcome::advance(StateUpdate {
            insights: Some(insights),
            ..Default::default()
        }))
    }
}

/// Step 4: terminal validation gate. Always the last step to run.
///
/// Turns a quietly empty result into a reported error; an existing error
/// is left untouched.
pub struct ValidateOutputStep;

#[async_trait]
impl Step for ValidateOutputStep {
    fn name(&self) -> &'static str {
        "validate_output"
    }

    async fn run(&self, state: &AnalysisState) -> Result<StepOutcome> {
        if !state.error.is_empty() {
            tracing::warn!(error = %state.error, "run completed with error");
            return Ok(StepOutcome::terminate(StateUpdate::none()));
        }

        if state.insights.is_empty() {
            tracing::warn!("run produced no insights");
            return Ok(StepOutcome::terminate(StateUpdate::error(
                "No insights generated",
            )));
        }

        tracing::info!("output validation passed");
        Ok(StepOutcome::terminate(StateUpdate::none()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use crate::sheets::SheetsError;
    use crate::types::AnalysisConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn state() -> AnalysisState {
        AnalysisState::new(AnalysisConfig {
            spreadsheet_id: "sheet-1".to_string(),
            read_range: "Sheet1!A1:Z1000".to_string(),
            write_range: "Sheet1!AB1".to_string(),
            credentials_path: "credentials/service_account.json".to_string(),
            model: "llama2".to_string(),
            service_url: "http://localhost:11434".to_string(),
            context: String::new(),
        })
    }

    fn rows(raw: &[&[&str]]) -> Vec<Vec<String>> {
        raw.iter()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect()
    }

    /// Spreadsheet collaborator returning a canned grid or failure.
    struct MockReader {
        result: Result<Vec<Vec<String>>, fn() -> SheetsError>,
    }

    impl MockReader {
        fn ok(grid: Vec<Vec<String>>) -> Self {
            Self { result: Ok(grid) }
        }

        fn failing(make: fn() -> SheetsError) -> Self {
            Self { result: Err(make) }
        }
    }

    #[async_trait]
    impl SpreadsheetReader for MockReader {
        async fn read(
            &self,
            _spreadsheet_id: &str,
            _range: &str,
            _credentials_path: &str,
        ) -> Result<Vec<Vec<String>>, SheetsError> {
            match &self.result {
                Ok(grid) => Ok(grid.clone()),
                Err(make) => Err(make()),
            }
        }
    }

    /// Insight collaborator counting invocations.
    struct MockGenerator {
        response: Result<String, fn() -> LlmError>,
        calls: AtomicUsize,
    }

    impl MockGenerator {
        fn ok(text: &str) -> Self {
            Self {
                response: Ok(text.to_string()),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing(make: fn() -> LlmError) -> Self {
            Self {
                response: Err(make),
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl InsightGenerator for MockGenerator {
        async fn generate(
            &self,
            _sections: &[String],
            _model: &str,
            _service_url: &str,
        ) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.response {
                Ok(text) => Ok(text.clone()),
                Err(make) => Err(make()),
            }
        }
    }

    #[tokio::test]
    async fn test_happy_path() {
        let reader = Arc::new(MockReader::ok(rows(&[
            &["name", "age"],
            &["Alice", "30"],
            &["Bob", "25"],
        ])));
        let generator = Arc::new(MockGenerator::ok("- Ages cluster in the late twenties."));

        let pipeline = analysis_pipeline(reader, generator.clone());
        let final_state = pipeline.run(state()).await;

        assert!(final_state.error.is_empty());
        let report = final_state.analysis.as_ref().unwrap();
        assert!(report.numerical.contains_key("age"));
        assert!(report.categorical.contains_key("name"));
        assert_eq!(
            final_state.insights,
            "- Ages cluster in the late twenties."
        );
        assert_eq!(generator.call_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_fetch_skips_model_call() {
        let reader = Arc::new(MockReader::ok(Vec::new()));
        let generator = Arc::new(MockGenerator::ok("unused"));

        let pipeline = analysis_pipeline(reader, generator.clone());
        let final_state = pipeline.run(state()).await;

        assert_eq!(final_state.error, "No data to analyze");
        assert!(final_state.analysis.is_none());
        assert_eq!(generator.call_count(), 0);
    }

    #[tokio::test]
    async fn test_header_only_reports_summarizer_error() {
        let reader = Arc::new(MockReader::ok(rows(&[&["col1", "col2"]])));
        let generator = Arc::new(MockGenerator::ok("unused"));

        let pipeline = analysis_pipeline(reader, generator.clone());
        let final_state = pipeline.run(state()).await;

        assert_eq!(final_state.error, "no rows after header");
        assert!(final_state.analysis.is_none());
        assert_eq!(generator.call_count(), 0);
    }

    #[tokio::test]
    async fn test_model_failure_degrades_gracefully() {
        let reader = Arc::new(MockReader::ok(rows(&[
            &["name", "age"],
            &["Alice", "30"],
            &["Bob", "25"],
        ])));
        let generator = Arc::new(MockGenerator::failing(|| {
            LlmError::ServiceUnavailable("connection refused".to_string())
        }));

        let pipeline = analysis_pipeline(reader, generator);
        let final_state = pipeline.run(state()).await;

        assert!(final_state.error.is_empty());
        assert!(final_state.insights.contains("unavailable"));
    }

    #[tokio::test]
    async fn test_empty_insights_fail_validation() {
        let reader = Arc::new(MockReader::ok(rows(&[
            &["name", "age"],
            &["Alice", "30"],
        ])));
        let generator = Arc::new(MockGenerator::ok(""));

        let pipeline = analysis_pipeline(reader, generator);
        let final_state = pipeline.run(state()).await;

        assert_eq!(final_state.error, "No insights generated");
    }

    #[tokio::test]
    async fn test_fetch_failure_is_stable_through_the_run() {
        let reader = Arc::new(MockReader::failing(|| SheetsError::NotFound));
        let generator = Arc::new(MockGenerator::ok("unused"));

        let pipeline = analysis_pipeline(reader, generator.clone());
        let final_state = pipeline.run(state()).await;

        assert_eq!(final_state.error, "Data reading failed: spreadsheet not found");
        assert!(final_state.raw_rows.is_empty());
        assert!(final_state.analysis.is_none());
        assert!(final_state.insights.is_empty());
        assert_eq!(generator.call_count(), 0);
    }

    #[tokio::test]
    async fn test_auth_failure_message() {
        let reader = Arc::new(MockReader::failing(|| SheetsError::Auth));
        let generator = Arc::new(MockGenerator::ok("unused"));

        let pipeline = analysis_pipeline(reader, generator);
        let final_state = pipeline.run(state()).await;

        assert_eq!(
            final_state.error,
            "Data reading failed: authentication with the spreadsheet service failed"
        );
    }

    #[tokio::test]
    async fn test_insights_step_refuses_error_marked_analysis() {
        let mut tainted = state();
        tainted.analysis = Some(crate::analysis::AnalysisReport {
            error: Some("no rows after header".to_string()),
            ..Default::default()
        });

        let generator = Arc::new(MockGenerator::ok("unused"));
        let step = GenerateInsightsStep::new(generator.clone());
        let outcome = step.run(&tainted).await.unwrap();

        assert_eq!(
            outcome.update.error.as_deref(),
            Some("Cannot generate insights: no rows after header")
        );
        assert_eq!(generator.call_count(), 0);
    }

    #[tokio::test]
    async fn test_validate_leaves_existing_error_untouched() {
        let mut failed = state();
        failed.error = "Data reading failed: spreadsheet not found".to_string();

        let outcome = ValidateOutputStep.run(&failed).await.unwrap();

        assert!(outcome.update.error.is_none());
        assert_eq!(outcome.signal, super::super::step::Signal::JumpToEnd);
    }

    #[tokio::test]
    async fn test_context_is_threaded_into_prompt_sections() {
        struct CapturingGenerator {
            sections: std::sync::Mutex<Vec<String>>,
        }

        #[async_trait]
        impl InsightGenerator for CapturingGenerator {
            async fn generate(
                &self,
                sections: &[String],
                _model: &str,
                _service_url: &str,
            ) -> Result<String, LlmError> {
                *self.sections.lock().unwrap() = sections.to_vec();
                Ok("narrative".to_string())
            }
        }

        let generator = Arc::new(CapturingGenerator {
            sections: std::sync::Mutex::new(Vec::new()),
        });
        let reader = Arc::new(MockReader::ok(rows(&[
            &["name", "age"],
            &["Alice", "30"],
        ])));

        let mut initial = state();
        initial.context = "Monthly customer table".to_string();

        let pipeline = analysis_pipeline(reader, generator.clone());
        pipeline.run(initial).await;

        let sections = generator.sections.lock().unwrap();
        assert!(sections
            .iter()
            .any(|s| s == "Context: Monthly customer table"));
    }
}
