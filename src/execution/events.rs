//! Execution events and the handler registry they are delivered through

use crate::core::{CommandRecord, ExecutionStatus, FailureCause, Phase, TeardownFailure, Verdict};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Events that can occur during pipeline execution
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    PipelineStarted {
        execution_id: Uuid,
        pipeline_name: String,
        total_entries: usize,
    },
    EntryStarted {
        entry_id: String,
        interpreter_version: String,
    },
    PhaseStarted {
        entry_id: String,
        phase: Phase,
    },
    CommandStarted {
        entry_id: String,
        phase: Phase,
        command: String,
    },
    /// A command ran, or was skipped because its condition is false
    CommandFinished {
        entry_id: String,
        record: CommandRecord,
    },
    /// A setup command failed; the rest of setup and `script` are skipped
    PhaseAborted {
        entry_id: String,
        phase: Phase,
        command: String,
    },
    TeardownFailed {
        entry_id: String,
        failure: TeardownFailure,
    },
    EntryFinished {
        entry_id: String,
        interpreter_version: String,
        verdict: Verdict,
        failure: Option<FailureCause>,
    },
    PipelineCompleted {
        execution_id: Uuid,
        status: ExecutionStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Shared list of handlers; cloned into every entry task
#[derive(Clone, Default)]
pub struct EventSink {
    handlers: Arc<Mutex<Vec<EventHandler>>>,
}

impl EventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler
    pub async fn subscribe(&self, handler: EventHandler) {
        self.handlers.lock().await.push(handler);
    }

    /// Deliver an event to all handlers
    pub async fn emit(&self, event: ExecutionEvent) {
        let handlers = self.handlers.lock().await;
        for handler in handlers.iter() {
            handler(event.clone());
        }
    }
}
