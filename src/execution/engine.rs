//! Main execution engine - orchestrates the whole build matrix

use crate::{
    core::{ExecutionStatus, Pipeline},
    execution::{
        events::{EventHandler, EventSink, ExecutionEvent},
        EntryExecutor, ExecutionScheduler, SchedulingStrategy,
    },
    runner::CommandRunner,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};

/// Orchestration faults. Failing commands are not errors; they show up in
/// entry verdicts.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("pipeline '{0}' has no matrix entries to run")]
    EmptyMatrix(String),

    #[error("matrix entry task failed: {0}")]
    TaskFailed(String),
}

/// Main pipeline execution engine
pub struct ExecutionEngine<R> {
    scheduler: ExecutionScheduler,
    executor: Arc<EntryExecutor<R>>,
    events: EventSink,
}

impl<R: CommandRunner + 'static> ExecutionEngine<R> {
    pub fn new(runner: R, strategy: SchedulingStrategy) -> Self {
        Self {
            scheduler: ExecutionScheduler::new(strategy),
            executor: Arc::new(EntryExecutor::new(runner)),
            events: EventSink::new(),
        }
    }

    /// Add an event handler
    pub async fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        let handler: EventHandler = Arc::new(handler);
        self.events.subscribe(handler).await;
    }

    /// Execute every pending matrix entry and return the aggregate status
    pub async fn execute(&self, pipeline: &mut Pipeline) -> Result<ExecutionStatus, EngineError> {
        let execution_id = pipeline.state.execution_id;
        let pending = self.scheduler.pending_entries(pipeline);

        if pending.is_empty() {
            return Err(EngineError::EmptyMatrix(pipeline.name.clone()));
        }

        info!(
            "Starting pipeline execution: {} ({}) with {} entries, {:?}",
            pipeline.name,
            execution_id,
            pending.len(),
            self.scheduler.strategy()
        );
        self.events
            .emit(ExecutionEvent::PipelineStarted {
                execution_id,
                pipeline_name: pipeline.name.clone(),
                total_entries: pending.len(),
            })
            .await;

        pipeline.state.start(pending.len());

        if self.scheduler.is_sequential(pending.len()) {
            self.run_sequential(pipeline, &pending).await;
        } else {
            self.run_concurrent(pipeline, &pending).await?;
        }

        let status = pipeline.aggregate_status();
        pipeline.state.finish(status);

        info!("Pipeline execution finished: {} - {:?}", pipeline.name, status);
        self.events
            .emit(ExecutionEvent::PipelineCompleted {
                execution_id,
                status,
            })
            .await;

        Ok(status)
    }

    async fn run_sequential(&self, pipeline: &mut Pipeline, pending: &[usize]) {
        for &index in pending {
            let context = pipeline.context_for_entry(&pipeline.entries[index]);
            let phases = &pipeline.phases;
            let entry = &mut pipeline.entries[index];

            let verdict = self.executor.run(entry, phases, &context, &self.events).await;
            pipeline.state.record_verdict(verdict);
        }
    }

    async fn run_concurrent(
        &self,
        pipeline: &mut Pipeline,
        pending: &[usize],
    ) -> Result<(), EngineError> {
        let permits = Arc::new(Semaphore::new(self.scheduler.concurrency(pending.len())));
        let phases = Arc::new(pipeline.phases.clone());
        let mut tasks = JoinSet::new();

        for &index in pending {
            let mut entry = pipeline.entries[index].clone();
            let context = pipeline.context_for_entry(&entry);
            let executor = self.executor.clone();
            let events = self.events.clone();
            let phases = phases.clone();
            let permits = permits.clone();

            tasks.spawn(async move {
                // Never closed, so acquiring cannot fail
                let _permit = permits.acquire_owned().await.ok();
                executor.run(&mut entry, &phases, &context, &events).await;
                (index, entry)
            });
        }

        // Siblings of a crashed task still finish, teardown included
        let mut crashed = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, entry)) => {
                    if let Some(verdict) = entry.verdict() {
                        pipeline.state.record_verdict(verdict);
                    }
                    pipeline.entries[index] = entry;
                }
                Err(e) => {
                    error!("Matrix entry task failed: {}", e);
                    crashed.get_or_insert(EngineError::TaskFailed(e.to_string()));
                }
            }
        }

        match crashed {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
