//! Execution scheduler - decides which matrix entries run and how many at once

use crate::core::{EntryState, Pipeline};

/// Strategy for scheduling matrix entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulingStrategy {
    /// Run entries one after another in declaration order
    #[default]
    Sequential,

    /// Run all entries at once
    Parallel,

    /// Limited parallelism (max N concurrent entries)
    LimitedParallel(usize),
}

/// Scheduler for matrix entries
#[derive(Debug, Clone)]
pub struct ExecutionScheduler {
    strategy: SchedulingStrategy,
}

impl ExecutionScheduler {
    pub fn new(strategy: SchedulingStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> SchedulingStrategy {
        self.strategy
    }

    /// Indices of entries still waiting to run, in declaration order
    pub fn pending_entries(&self, pipeline: &Pipeline) -> Vec<usize> {
        pipeline
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| matches!(entry.state, EntryState::Pending))
            .map(|(index, _)| index)
            .collect()
    }

    /// How many entries may run at the same time
    pub fn concurrency(&self, pending: usize) -> usize {
        let limit = match self.strategy {
            SchedulingStrategy::Sequential => 1,
            SchedulingStrategy::Parallel => pending,
            SchedulingStrategy::LimitedParallel(max) => max.min(pending),
        };
        limit.max(1)
    }

    /// Whether entries must run inline, one at a time, in order
    pub fn is_sequential(&self, pending: usize) -> bool {
        self.concurrency(pending) == 1
    }
}
