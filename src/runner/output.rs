//! Command request, output and error types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// Error types for command execution
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to spawn command: {0}")]
    Spawn(String),

    #[error("timed out after {0} seconds")]
    Timeout(u64),
}

/// A single opaque shell command to execute
#[derive(Debug, Clone)]
pub struct CommandRequest {
    /// Shell text
    pub command: String,

    /// Complete environment additions for the command
    pub env: HashMap<String, String>,

    /// Directory to run in (None = inherit)
    pub working_directory: Option<PathBuf>,
}

impl CommandRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            env: HashMap::new(),
            working_directory: None,
        }
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn with_working_directory(mut self, dir: Option<PathBuf>) -> Self {
        self.working_directory = dir;
        self
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    /// Exit code (None = terminated by a signal)
    pub exit_code: Option<i32>,

    pub stdout: String,

    pub stderr: String,
}

impl CommandOutput {
    /// Output of a command that exited with `code` and printed nothing
    pub fn with_exit_code(code: i32) -> Self {
        Self {
            exit_code: Some(code),
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}
