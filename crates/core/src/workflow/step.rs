use crate::analysis::AnalysisReport;
use crate::types::AnalysisState;
use anyhow::Result;
use async_trait::async_trait;

/// Control signal returned by a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Proceed to the next step in declared order.
    Continue,
    /// Skip all remaining steps.
    JumpToEnd,
}

/// Partial update to the state record; only present fields are replaced.
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    pub raw_rows: Option<Vec<Vec<String>>>,
    pub analysis: Option<AnalysisReport>,
    pub insights: Option<String>,
    pub error: Option<String>,
}

impl StateUpdate {
    /// An update that changes nothing.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    /// Merge into the record. Last writer wins per field, except the error
    /// field: the first non-empty value is sticky for the rest of the run
    /// and is never cleared.
    pub fn apply(self, state: &mut AnalysisState) {
        if let Some(rows) = self.raw_rows {
            state.raw_rows = rows;
        }
        if let Some(analysis) = self.analysis {
            state.analysis = Some(analysis);
        }
        if let Some(insights) = self.insights {
            state.insights = insights;
        }
        if let Some(error) = self.error {
            if state.error.is_empty() && !error.is_empty() {
                state.error = error;
            }
        }
    }
}

/// Outcome of one step invocation.
#[derive(Debug)]
pub struct StepOutcome {
    pub update: StateUpdate,
    pub signal: Signal,
}

impl StepOutcome {
    /// Apply the update and continue with the next step.
    pub fn advance(update: StateUpdate) -> Self {
        Self {
            update,
            signal: Signal::Continue,
        }
    }

    /// Apply the update and skip all remaining steps.
    pub fn terminate(update: StateUpdate) -> Self {
        Self {
            update,
            signal: Signal::JumpToEnd,
        }
    }
}

/// One pipeline stage: a transformation from the current record to a
/// partial update plus a control signal.
///
/// Steps never mutate the record they receive. Detected failures are
/// reported through `StateUpdate::error`; returning `Err` is the
/// last-resort fault path, which the executor folds into the error field
/// so a misbehaving collaborator cannot crash the run.
#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, state: &AnalysisState) -> Result<StepOutcome>;
}
