use super::{ApiError, ApiResult};
use crate::config::AppState;
use crate::jobs::{JobId, JobRecord, JobRegistry, JobState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use sheetsage_core::workflow::Pipeline;
use sheetsage_core::{AnalysisConfig, AnalysisOutcome, AnalysisState};
use std::sync::Arc;

/// Analysis request; missing fields fall back to the configured defaults.
#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeRequest {
    pub spreadsheet_id: Option<String>,
    pub read_range: Option<String>,
    pub write_range: Option<String>,
    pub credentials_path: Option<String>,
    pub model: Option<String>,
    pub service_url: Option<String>,
    pub context: Option<String>,
}

fn resolve_config(state: &AppState, req: AnalyzeRequest) -> Result<AnalysisConfig, ApiError> {
    let defaults = &state.config.analysis;
    let mut config = defaults.to_config();

    if let Some(spreadsheet_id) = req.spreadsheet_id {
        config.spreadsheet_id = spreadsheet_id;
    }
    if let Some(read_range) = req.read_range {
        config.read_range = read_range;
    }
    if let Some(write_range) = req.write_range {
        config.write_range = write_range;
    }
    if let Some(credentials_path) = req.credentials_path {
        config.credentials_path = credentials_path;
    }
    if let Some(model) = req.model {
        config.model = model;
    }
    if let Some(service_url) = req.service_url {
        config.service_url = service_url;
    }
    if let Some(context) = req.context {
        config.context = context;
    }

    config
        .validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    Ok(config)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeAccepted {
    pub job_id: JobId,
    pub status: String,
    pub message: String,
    pub config: ConfigEcho,
}

/// Subset of the effective configuration echoed back to the caller.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigEcho {
    pub spreadsheet_id: String,
    pub read_range: String,
    pub model: String,
}

/// Start a background analysis job
pub async fn analyze(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AnalyzeRequest>,
) -> ApiResult<impl IntoResponse> {
    let config = resolve_config(&state, req)?;

    let job_id = state.jobs.create().await;
    tracing::info!(
        %job_id,
        spreadsheet_id = %config.spreadsheet_id,
        "created analysis job"
    );

    let accepted = AnalyzeAccepted {
        job_id,
        status: "started".to_string(),
        message: "Analysis job started successfully".to_string(),
        config: ConfigEcho {
            spreadsheet_id: config.spreadsheet_id.clone(),
            read_range: config.read_range.clone(),
            model: config.model.clone(),
        },
    };

    let pipeline = state.pipeline.clone();
    let jobs = state.jobs.clone();
    tokio::spawn(async move {
        run_analysis_job(pipeline, jobs, job_id, config).await;
    });

    Ok((StatusCode::ACCEPTED, Json(accepted)))
}

/// Drive one pipeline run and record its result under the job id.
///
/// This task is the single writer for its job id.
async fn run_analysis_job(
    pipeline: Arc<Pipeline>,
    jobs: Arc<JobRegistry>,
    job_id: JobId,
    config: AnalysisConfig,
) {
    tracing::info!(%job_id, "starting analysis job");
    jobs.mark_running(job_id, "Running analysis...").await;

    let final_state = pipeline.run(AnalysisState::new(config)).await;

    match final_state.into_outcome() {
        Ok(outcome) => {
            tracing::info!(%job_id, rows_read = outcome.rows_read, "analysis job completed");
            jobs.complete(job_id, outcome).await;
        }
        Err(error) => {
            tracing::warn!(%job_id, error = %error, "analysis job failed");
            jobs.fail(job_id, error).await;
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SyncResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<AnalysisOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Run an analysis inline and block until it completes
pub async fn analyze_sync(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AnalyzeRequest>,
) -> ApiResult<Response> {
    let config = resolve_config(&state, req)?;

    tracing::info!(
        spreadsheet_id = %config.spreadsheet_id,
        "starting synchronous analysis"
    );

    let final_state = state.pipeline.run(AnalysisState::new(config)).await;

    let response = match final_state.into_outcome() {
        Ok(outcome) => (
            StatusCode::OK,
            Json(SyncResponse {
                status: "completed".to_string(),
                data: Some(outcome),
                error: None,
            }),
        ),
        Err(error) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(SyncResponse {
                status: "error".to_string(),
                data: None,
                error: Some(error),
            }),
        ),
    };

    Ok(response.into_response())
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub job_id: JobId,
    pub status: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<AnalysisOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<JobRecord> for StatusResponse {
    fn from(record: JobRecord) -> Self {
        Self {
            job_id: record.id,
            status: record.state,
            progress: record.progress,
            data: record.result,
            error: record.error,
        }
    }
}

/// Get the status of an analysis job
pub async fn job_status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<StatusResponse>> {
    let job_id = JobId(
        job_id
            .parse()
            .map_err(|_| ApiError::bad_request("Invalid job ID"))?,
    );

    let record = state
        .jobs
        .get(&job_id)
        .await
        .ok_or_else(|| ApiError::not_found("Job not found"))?;

    Ok(Json(record.into()))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JobsResponse {
    pub total_jobs: usize,
    pub jobs: Vec<JobSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JobSummary {
    pub job_id: JobId,
    pub status: JobState,
}

/// List all jobs and their status
pub async fn list_jobs(State(state): State<Arc<AppState>>) -> ApiResult<Json<JobsResponse>> {
    let jobs: Vec<JobSummary> = state
        .jobs
        .list()
        .await
        .into_iter()
        .map(|record| JobSummary {
            job_id: record.id,
            status: record.state,
        })
        .collect();

    Ok(Json(JobsResponse {
        total_jobs: jobs.len(),
        jobs,
    }))
}
