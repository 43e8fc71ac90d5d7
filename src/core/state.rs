//! Execution state models

use crate::core::phase::Phase;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Overall pipeline execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Pipeline has not started
    Pending,
    /// Matrix entries are still running
    Running,
    /// Every entry passed (or failed with an allowed failure)
    Passed,
    /// At least one entry failed
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "Pending",
            ExecutionStatus::Running => "Running",
            ExecutionStatus::Passed => "Passed",
            ExecutionStatus::Failed => "Failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "Running" => ExecutionStatus::Running,
            "Passed" => ExecutionStatus::Passed,
            "Failed" => ExecutionStatus::Failed,
            _ => ExecutionStatus::Pending,
        }
    }
}

/// Terminal status of one matrix entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Passed,
    Failed,
}

/// Why a matrix entry was marked failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureCause {
    /// A command in `install` or `before_script` exited non-zero.
    /// Remaining setup and script commands were not run.
    Setup {
        phase: Phase,
        command: String,
        exit_code: Option<i32>,
    },
    /// One or more `script` commands exited non-zero
    Script { commands: Vec<String> },
}

impl std::fmt::Display for FailureCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureCause::Setup { phase, command, exit_code } => match exit_code {
                Some(code) => write!(f, "{} command `{}` exited with {}", phase, command, code),
                None => write!(f, "{} command `{}` did not exit normally", phase, command),
            },
            FailureCause::Script { commands } => {
                write!(f, "script failed: {}", commands.join(", "))
            }
        }
    }
}

/// A failed `after_script` command. Reported, never changes the verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeardownFailure {
    pub command: String,
    pub exit_code: Option<i32>,
    pub error: String,
}

/// State of a single matrix entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EntryState {
    /// Entry has not been scheduled yet
    Pending,
    /// Entry is executing its phases
    Running { started_at: DateTime<Utc> },
    /// Entry ran through `after_script`
    Finished {
        verdict: Verdict,
        failure: Option<FailureCause>,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    },
}

impl EntryState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EntryState::Finished { .. })
    }

    pub fn verdict(&self) -> Option<Verdict> {
        match self {
            EntryState::Finished { verdict, .. } => Some(*verdict),
            _ => None,
        }
    }
}

/// Outcome of one command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandStatus {
    /// Command exited with status 0
    Succeeded,
    /// Command exited non-zero, was killed, timed out, or could not be spawned
    Failed {
        exit_code: Option<i32>,
        error: String,
    },
    /// Command's run condition was false for this entry
    Skipped { reason: String },
}

/// Record of one command within one matrix entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRecord {
    pub phase: Phase,
    pub command: String,
    pub status: CommandStatus,
    pub stdout: String,
    pub stderr: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl CommandRecord {
    /// Record for a command that was skipped by its condition
    pub fn skipped(phase: Phase, command: &str, reason: String) -> Self {
        Self {
            phase,
            command: command.to_string(),
            status: CommandStatus::Skipped { reason },
            stdout: String::new(),
            stderr: String::new(),
            started_at: Utc::now(),
            duration_ms: 0,
        }
    }

    /// Whether the command actually ran
    pub fn was_executed(&self) -> bool {
        !matches!(self.status, CommandStatus::Skipped { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.status, CommandStatus::Failed { .. })
    }

    pub fn exit_code(&self) -> Option<i32> {
        match &self.status {
            CommandStatus::Succeeded => Some(0),
            CommandStatus::Failed { exit_code, .. } => *exit_code,
            CommandStatus::Skipped { .. } => None,
        }
    }
}

/// Overall pipeline state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineState {
    /// Unique execution ID
    pub execution_id: Uuid,

    /// Current execution status
    pub status: ExecutionStatus,

    /// When execution started
    pub started_at: Option<DateTime<Utc>>,

    /// When the last entry finished
    pub completed_at: Option<DateTime<Utc>>,

    /// Number of entries scheduled for this run
    pub total_entries: usize,

    /// Entries with a PASSED verdict
    pub passed_entries: usize,

    /// Entries with a FAILED verdict
    pub failed_entries: usize,
}

impl PipelineState {
    pub fn new() -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            status: ExecutionStatus::Pending,
            started_at: None,
            completed_at: None,
            total_entries: 0,
            passed_entries: 0,
            failed_entries: 0,
        }
    }

    /// Mark pipeline as started
    pub fn start(&mut self, total_entries: usize) {
        self.status = ExecutionStatus::Running;
        self.started_at = Some(Utc::now());
        self.total_entries = total_entries;
        self.passed_entries = 0;
        self.failed_entries = 0;
    }

    /// Count a finished entry
    pub fn record_verdict(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Passed => self.passed_entries += 1,
            Verdict::Failed => self.failed_entries += 1,
        }
    }

    /// Mark pipeline as finished with the aggregate status
    pub fn finish(&mut self, status: ExecutionStatus) {
        self.status = status;
        self.completed_at = Some(Utc::now());
    }

    /// Fraction of scheduled entries that have finished (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        if self.total_entries == 0 {
            return 0.0;
        }
        (self.passed_entries + self.failed_entries) as f64 / self.total_entries as f64
    }
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::new()
    }
}
