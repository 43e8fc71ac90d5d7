//! Command runners that execute opaque shell commands

pub mod output;
pub mod shell;

use async_trait::async_trait;
pub use output::{CommandOutput, CommandRequest, RunnerError};
pub use shell::ShellRunner;

/// Trait for command execution - allows for different implementations
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run one command to completion and capture its output.
    ///
    /// A non-zero exit is a successful `run` with a non-zero `exit_code`;
    /// `Err` means the command could not be run at all.
    async fn run(&self, request: &CommandRequest) -> Result<CommandOutput, RunnerError>;
}

#[async_trait]
impl<R: CommandRunner + ?Sized> CommandRunner for std::sync::Arc<R> {
    async fn run(&self, request: &CommandRequest) -> Result<CommandOutput, RunnerError> {
        (**self).run(request).await
    }
}
