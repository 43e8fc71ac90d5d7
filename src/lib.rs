//! ci-pipeline - runs CI build-matrix entries through install, before_script,
//! script and after_script

pub mod cli;
pub mod core;
pub mod execution;
pub mod persistence;
pub mod runner;

// Re-export commonly used types
pub use core::{EntryContext, ExecutionStatus, MatrixEntry, Phase, Pipeline, Verdict};
pub use execution::{ExecutionEngine, ExecutionEvent, SchedulingStrategy};
pub use runner::{CommandOutput, CommandRequest, CommandRunner, RunnerError, ShellRunner};
