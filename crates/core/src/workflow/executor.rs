use super::step::{Signal, StateUpdate, Step, StepOutcome};
use crate::types::AnalysisState;

/// Phase of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorPhase {
    Pending,
    Running,
    Done,
}

/// An executable pipeline: steps in fixed declaration order.
pub struct Pipeline {
    steps: Vec<Box<dyn Step>>,
}

/// Registers steps in execution order and produces the executable.
#[derive(Default)]
pub struct PipelineBuilder {
    steps: Vec<Box<dyn Step>>,
}

impl PipelineBuilder {
    pub fn step(mut self, step: impl Step + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline { steps: self.steps }
    }
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Drive the pipeline over a freshly created record and return the
    /// final record.
    ///
    /// Each step is invoked with the latest record; its update is merged
    /// in, then the signal decides whether to advance or finish. A step
    /// fault is folded into the record's error field and the run
    /// continues, so downstream steps (the validation gate in particular)
    /// still observe it. The executor never retries a step and never rolls
    /// back a partial update; callers distinguish success from failure by
    /// inspecting the returned record, not by a raised fault.
    pub async fn run(&self, mut state: AnalysisState) -> AnalysisState {
        let mut phase = ExecutorPhase::Pending;
        let mut cursor = 0;

        loop {
            match phase {
                ExecutorPhase::Pending => phase = ExecutorPhase::Running,
                ExecutorPhase::Done => break,
                ExecutorPhase::Running => {
                    let Some(step) = self.steps.get(cursor) else {
                        phase = ExecutorPhase::Done;
                        continue;
                    };

                    tracing::info!(step = step.name(), "executing step");

                    let outcome = match step.run(&state).await {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            tracing::error!(
                                step = step.name(),
                                error = format!("{e:#}"),
                                "step fault"
                            );
                            StepOutcome::advance(StateUpdate::error(format!(
                                "{} failed: {e:#}",
                                step.name()
                            )))
                        }
                    };

                    outcome.update.apply(&mut state);

                    match outcome.signal {
                        Signal::JumpToEnd => phase = ExecutorPhase::Done,
                        Signal::Continue => {
                            cursor += 1;
                            if cursor >= self.steps.len() {
                                phase = ExecutorPhase::Done;
                            }
                        }
                    }
                }
            }
        }

        state
    }
}
