//! Shell subprocess runner - runs each command with `<shell> -c`

use crate::runner::{CommandOutput, CommandRequest, CommandRunner, RunnerError};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Runs commands as shell subprocesses
#[derive(Debug, Clone)]
pub struct ShellRunner {
    /// Shell executable (e.g. "sh", "/bin/bash")
    shell: String,
}

impl ShellRunner {
    /// Create a runner for the given shell
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

    /// Get the shell executable
    pub fn shell(&self) -> &str {
        &self.shell
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new("sh")
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    /// Spawn `<shell> -c <command>` and capture stdout/stderr.
    ///
    /// The child is killed if the returned future is dropped, which is how
    /// command timeouts terminate it.
    async fn run(&self, request: &CommandRequest) -> Result<CommandOutput, RunnerError> {
        debug!("Spawning {} -c {:?}", self.shell, request.command);

        let mut command = Command::new(&self.shell);
        command
            .arg("-c")
            .arg(&request.command)
            .envs(&request.env)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        if let Some(dir) = &request.working_directory {
            command.current_dir(dir);
        }

        let output = command
            .output()
            .await
            .map_err(|e| RunnerError::Spawn(format!("{}: {}", self.shell, e)))?;

        let exit_code = output.status.code();
        if exit_code != Some(0) {
            warn!(
                "`{}` exited with {}",
                request.command,
                exit_code.map_or_else(|| "a signal".to_string(), |c| c.to_string())
            );
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        debug!(
            "`{}` produced {} bytes of stdout, {} bytes of stderr",
            request.command,
            stdout.len(),
            stderr.len()
        );

        Ok(CommandOutput {
            exit_code,
            stdout,
            stderr,
        })
    }
}
