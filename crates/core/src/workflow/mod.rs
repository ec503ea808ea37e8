pub mod executor;
pub mod step;
pub mod steps;

pub use executor::{ExecutorPhase, Pipeline, PipelineBuilder};
pub use step::{Signal, StateUpdate, Step, StepOutcome};
pub use steps::{
    analysis_pipeline, FetchRowsStep, GenerateInsightsStep, SummarizeStep, ValidateOutputStep,
};
