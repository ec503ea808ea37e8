use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sheetsage_core::AnalysisOutcome;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Unique identifier for an analysis job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of an analysis job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Failed,
}

/// Latest observed status and result for one job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub state: JobState,
    pub progress: Option<String>,
    pub result: Option<AnalysisOutcome>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Process-wide registry of analysis jobs.
///
/// Single-writer-per-key discipline: after creation, only the spawned task
/// that owns a job id writes to its record. The engine itself never
/// touches this registry; it only returns a final record.
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, JobRecord>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }

    /// Mint a new job id and insert its queued record.
    pub async fn create(&self) -> JobId {
        let id = JobId::new();
        let now = Utc::now();
        let record = JobRecord {
            id,
            state: JobState::Queued,
            progress: None,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        };
        self.jobs.write().await.insert(id, record);
        id
    }

    pub async fn mark_running(&self, id: JobId, progress: impl Into<String>) {
        self.update(id, |record| {
            record.state = JobState::Running;
            record.progress = Some(progress.into());
        })
        .await;
    }

    pub async fn complete(&self, id: JobId, outcome: AnalysisOutcome) {
        self.update(id, |record| {
            record.state = JobState::Completed;
            record.progress = None;
            record.result = Some(outcome);
        })
        .await;
    }

    pub async fn fail(&self, id: JobId, error: impl Into<String>) {
        self.update(id, |record| {
            record.state = JobState::Failed;
            record.progress = None;
            record.error = Some(error.into());
        })
        .await;
    }

    pub async fn get(&self, id: &JobId) -> Option<JobRecord> {
        self.jobs.read().await.get(id).cloned()
    }

    pub async fn list(&self) -> Vec<JobRecord> {
        let mut records: Vec<JobRecord> =
            self.jobs.read().await.values().cloned().collect();
        records.sort_by_key(|record| record.created_at);
        records
    }

    async fn update(&self, id: JobId, apply: impl FnOnce(&mut JobRecord)) {
        let mut jobs = self.jobs.write().await;
        if let Some(record) = jobs.get_mut(&id) {
            apply(record);
            record.updated_at = Utc::now();
        } else {
            tracing::warn!(job_id = %id, "update for unknown job dropped");
        }
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}
