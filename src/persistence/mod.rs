//! Persistence layer for pipeline execution history

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteExecutionStore;

pub use crate::core::ExecutionStatus;
use crate::core::{Pipeline, Verdict};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

/// Summary of one matrix entry within an execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntrySummary {
    pub entry_id: String,
    pub interpreter_version: String,
    /// None when the entry never finished
    pub verdict: Option<Verdict>,
    pub allowed_failure: bool,
    /// Commands whose failure decided the verdict
    pub failed_commands: Vec<String>,
    pub teardown_failures: Vec<String>,
}

/// Summary of a pipeline execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSummary {
    /// Unique execution ID
    pub execution_id: Uuid,

    /// Pipeline name
    pub pipeline_name: String,

    /// Aggregate status
    pub status: ExecutionStatus,

    /// When execution started
    pub started_at: DateTime<Utc>,

    /// When execution completed (if complete)
    pub completed_at: Option<DateTime<Utc>>,

    /// Per-entry results
    pub entries: Vec<EntrySummary>,
}

impl ExecutionSummary {
    pub fn passed_entries(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.verdict == Some(Verdict::Passed))
            .count()
    }

    pub fn total_entries(&self) -> usize {
        self.entries.len()
    }
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

    /// List all pipeline names
    async fn list_pipelines(&self) -> Result<Vec<String>>;
}

/// In-memory persistence (for testing or ephemeral use)
pub struct InMemoryPersistence {
    executions: tokio::sync::RwLock<std::collections::HashMap<Uuid, ExecutionSummary>>,
    by_pipeline: tokio::sync::RwLock<std::collections::BTreeMap<String, Vec<Uuid>>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self {
            executions: tokio::sync::RwLock::new(std::collections::HashMap::new()),
            by_pipeline: tokio::sync::RwLock::new(std::collections::BTreeMap::new()),
        }
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
        let is_new = execs
            .insert(execution.execution_id, execution.clone())
            .is_none();

        if is_new {
            let mut by_pipeline = self.by_pipeline.write().await;
            by_pipeline
                .entry(execution.pipeline_name.clone())
                .or_default()
                .push(execution.execution_id);
        }

        Ok(())
    }

    async fn load_execution(&self, execution_id: Uuid) -> Result<Option<ExecutionSummary>> {
        let execs = self.executions.read().await;
        Ok(execs.get(&execution_id).cloned())
    }

    async fn list_executions(&self, pipeline_name: &str) -> Result<Vec<ExecutionSummary>> {
        let execs = self.executions.read().await;
        let by_pipeline = self.by_pipeline.read().await;

        let mut result: Vec<ExecutionSummary> = by_pipeline
            .get(pipeline_name)
            .map(|ids| ids.iter().filter_map(|id| execs.get(id).cloned()).collect())
            .unwrap_or_default();
        result.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(result)
    }

    async fn list_pipelines(&self) -> Result<Vec<String>> {
        let by_pipeline = self.by_pipeline.read().await;
        Ok(by_pipeline.keys().cloned().collect())
    }
}

/// Create a summary from a pipeline
pub fn create_summary(pipeline: &Pipeline) -> ExecutionSummary {
    let entries = pipeline
        .entries
        .iter()
        .map(|entry| {
            let failed_commands = entry
                .records
                .iter()
                .filter(|r| r.phase.affects_verdict() && r.is_failure())
                .map(|r| r.command.clone())
                .collect();

            EntrySummary {
                entry_id: entry.id.clone(),
                interpreter_version: entry.interpreter_version.clone(),
                verdict: entry.verdict(),
                allowed_failure: pipeline.is_allowed_failure(entry),
                failed_commands,
                teardown_failures: entry
                    .teardown_failures
                    .iter()
                    .map(|t| t.command.clone())
                    .collect(),
            }
        })
        .collect();

    ExecutionSummary {
        execution_id: pipeline.state.execution_id,
        pipeline_name: pipeline.name.clone(),
        status: pipeline.state.status,
        started_at: pipeline.state.started_at.unwrap_or_else(Utc::now),
        completed_at: pipeline.state.completed_at,
        entries,
    }
}

/// Save a finished execution to history.
///
/// Storage faults are logged, not returned; the run's verdict stands either
/// way. Returns whether the summary was stored.
pub async fn record_execution(
    backend: &dyn PersistenceBackend,
    summary: &ExecutionSummary,
) -> bool {
    match backend.save_execution(summary).await {
        Ok(()) => true,
        Err(e) => {
            warn!(
                "Could not save execution {} to history: {:#}",
                summary.execution_id, e
            );
            false
        }
    }
}
