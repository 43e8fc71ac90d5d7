//! Phase and command domain model

use crate::core::{
    condition::RunCondition,
    config::CommandConfig,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A named lifecycle phase. Order of declaration is execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Install,
    BeforeScript,
    Script,
    AfterScript,
}

impl Phase {
    /// All phases in execution order
    pub const ALL: [Phase; 4] = [
        Phase::Install,
        Phase::BeforeScript,
        Phase::Script,
        Phase::AfterScript,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Install => "install",
            Phase::BeforeScript => "before_script",
            Phase::Script => "script",
            Phase::AfterScript => "after_script",
        }
    }

    /// A non-zero exit aborts the entry and jumps to teardown
    pub fn aborts_on_failure(&self) -> bool {
        matches!(self, Phase::Install | Phase::BeforeScript)
    }

    /// Failures here decide the entry's verdict
    pub fn affects_verdict(&self) -> bool {
        !matches!(self, Phase::AfterScript)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single opaque shell command inside a phase
#[derive(Debug, Clone)]
pub struct Command {
    /// Shell text passed to the runner
    pub run: String,

    /// Display name (defaults to the command text)
    pub name: String,

    /// Only run when this condition holds for the entry
    pub condition: Option<RunCondition>,

    /// Timeout in seconds (None = wait for exit)
    pub timeout_secs: Option<u64>,
}

impl Command {
    /// Build a command from its configuration. The condition must already
    /// have passed validation.
    pub fn from_config(config: &CommandConfig, default_timeout: Option<u64>) -> Self {
        let condition = config
            .condition()
            .and_then(|expression| RunCondition::parse(expression).ok());

        Command {
            run: config.run().to_string(),
            name: config.name().unwrap_or(config.run()).to_string(),
            condition,
            timeout_secs: config.timeout_secs().or(default_timeout),
        }
    }

    /// Create an unconditional command
    pub fn new(run: impl Into<String>) -> Self {
        let run = run.into();
        Command {
            name: run.clone(),
            run,
            condition: None,
            timeout_secs: None,
        }
    }

    /// Whether this command runs for the given version and environment
    pub fn applies_to(&self, version: &str, env: &HashMap<String, String>) -> bool {
        self.condition
            .as_ref()
            .map_or(true, |condition| condition.evaluate(version, env))
    }

    /// Reason recorded when the condition excludes the command
    pub fn skip_reason(&self) -> String {
        match &self.condition {
            Some(condition) => format!("condition `{}` is false", condition),
            None => String::new(),
        }
    }
}

/// The four phases of a pipeline, each an ordered command list
#[derive(Debug, Clone, Default)]
pub struct Phases {
    pub install: Vec<Command>,
    pub before_script: Vec<Command>,
    pub script: Vec<Command>,
    pub after_script: Vec<Command>,
}

impl Phases {
    /// Commands for one phase
    pub fn commands(&self, phase: Phase) -> &[Command] {
        match phase {
            Phase::Install => &self.install,
            Phase::BeforeScript => &self.before_script,
            Phase::Script => &self.script,
            Phase::AfterScript => &self.after_script,
        }
    }

    /// Total command count across all phases
    pub fn len(&self) -> usize {
        Phase::ALL.iter().map(|p| self.commands(*p).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
