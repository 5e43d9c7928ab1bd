//! Persistence layer for pipeline run history
//!
//! History is an audit log: it records what each run did, and no stage
//! ever reads it back.

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteExecutionStore;

pub use crate::core::ExecutionStatus;
use crate::core::{Pipeline, PipelineContext};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

/// Summary of a pipeline execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    /// Unique execution ID
    pub execution_id: Uuid,

    /// Pipeline name
    pub pipeline_name: String,

    pub branch: String,
    pub build_number: u64,

    /// Version stamped by the run, if it got that far
    pub version: Option<String>,

    /// Execution status
    pub status: ExecutionStatus,

    /// Stage the run aborted at
    pub failed_stage: Option<String>,

    /// When execution started
    pub started_at: DateTime<Utc>,

    /// When execution completed (if complete)
    pub completed_at: Option<DateTime<Utc>>,

    /// Progress (0.0 to 1.0)
    pub progress: f64,

    /// Stages that completed or were skipped
    pub finished_stages: usize,

    pub total_stages: usize,

    /// Artifacts uploaded to the release channel
    pub published: usize,
}

/// Trait for persistence backends
#[async_trait::async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Save a pipeline execution
    async fn save_execution(&self, execution: &ExecutionSummary) -> Result<()>;

    /// Load an execution by ID
    async fn load_execution(&self, execution_id: Uuid) -> Result<Option<ExecutionSummary>>;

    /// List all executions for a pipeline, newest first
    async fn list_executions(&self, pipeline_name: &str) -> Result<Vec<ExecutionSummary>>;

    /// The most recent executions across all pipelines
    async fn list_recent(&self, limit: usize) -> Result<Vec<ExecutionSummary>>;
}

/// In-memory persistence (for testing or ephemeral use)
pub struct InMemoryPersistence {
    executions: tokio::sync::RwLock<std::collections::HashMap<Uuid, ExecutionSummary>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self {
            executions: tokio::sync::RwLock::new(std::collections::HashMap::new()),
        }
    }

    async fn sorted(&self, filter: impl Fn(&ExecutionSummary) -> bool) -> Vec<ExecutionSummary> {
        let execs = self.executions.read().await;
        let mut result: Vec<ExecutionSummary> = execs.values().filter(|e| filter(e)).cloned().collect();
        result.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        result
    }
}

impl Default for InMemoryPersistence {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for InMemoryPersistence {
    async fn save_execution(&self, execution: &ExecutionSummary) -> Result<()> {
        let mut execs = self.executions.write().await;
        execs.insert(execution.execution_id, execution.clone());
        Ok(())
    }

    async fn load_execution(&self, execution_id: Uuid) -> Result<Option<ExecutionSummary>> {
        let execs = self.executions.read().await;
        Ok(execs.get(&execution_id).cloned())
    }

    async fn list_executions(&self, pipeline_name: &str) -> Result<Vec<ExecutionSummary>> {
        Ok(self.sorted(|e| e.pipeline_name == pipeline_name).await)
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<ExecutionSummary>> {
        let mut all = self.sorted(|_| true).await;
        all.truncate(limit);
        Ok(all)
    }
}

/// Create a summary from a finished (or aborted) pipeline
pub fn create_summary(pipeline: &Pipeline, context: &PipelineContext) -> ExecutionSummary {
    ExecutionSummary {
        execution_id: pipeline.state.execution_id,
        pipeline_name: pipeline.name.clone(),
        branch: context.branch().to_string(),
        build_number: context.build_number(),
        version: pipeline.outputs.version.map(|v| v.to_string()),
        status: pipeline.state.status,
        failed_stage: pipeline.state.failed_stage.map(|s| s.as_str().to_string()),
        started_at: pipeline.state.started_at.unwrap_or_else(Utc::now),
        completed_at: pipeline.state.completed_at,
        progress: pipeline.state.progress(),
        finished_stages: pipeline.state.finished_stages,
        total_stages: pipeline.state.total_stages,
        published: pipeline.outputs.published.len(),
    }
}

/// Save `summary`, downgrading a storage failure to a warning
///
/// History is bookkeeping; a run that finished keeps its outcome even when
/// the store is unwritable. Returns whether the summary was saved.
pub async fn record_execution(store: &dyn PersistenceBackend, summary: &ExecutionSummary) -> bool {
    match store.save_execution(summary).await {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to record execution history: {:#}", e);
            false
        }
    }
}
