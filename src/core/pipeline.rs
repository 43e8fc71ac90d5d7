//! Pipeline domain model

use crate::core::{
    config::PipelineConfig,
    context::EntryContext,
    phase::{Command, Phase, Phases},
    state::{CommandRecord, EntryState, ExecutionStatus, PipelineState, TeardownFailure, Verdict},
};
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;

/// One independent execution of the phases for a single interpreter version
#[derive(Debug, Clone)]
pub struct MatrixEntry {
    /// Entry identifier (`<language>-<version>` or just the version)
    pub id: String,

    /// Interpreter version this entry runs
    pub interpreter_version: String,

    /// Runtime state
    pub state: EntryState,

    /// Every executed or condition-skipped command, in order
    pub records: Vec<CommandRecord>,

    /// `after_script` failures; reported but never part of the verdict
    pub teardown_failures: Vec<TeardownFailure>,
}

impl MatrixEntry {
    pub fn new(id: String, interpreter_version: String) -> Self {
        Self {
            id,
            interpreter_version,
            state: EntryState::Pending,
            records: Vec::new(),
            teardown_failures: Vec::new(),
        }
    }

    /// Records of a single phase
    pub fn records_for(&self, phase: Phase) -> impl Iterator<Item = &CommandRecord> {
        self.records.iter().filter(move |r| r.phase == phase)
    }

    /// Whether a command ran (was not skipped or left unreached)
    pub fn was_executed(&self, command: &str) -> bool {
        self.records
            .iter()
            .any(|r| r.command == command && r.was_executed())
    }

    pub fn verdict(&self) -> Option<Verdict> {
        self.state.verdict()
    }
}

/// A command as it would run for a given entry
#[derive(Debug, Clone, Serialize)]
pub struct PlannedCommand {
    pub phase: Phase,
    pub command: String,
    pub will_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

/// The commands each entry would execute if every command succeeded
#[derive(Debug, Clone, Serialize)]
pub struct EntryPlan {
    pub entry_id: String,
    pub interpreter_version: String,
    pub allowed_failure: bool,
    pub commands: Vec<PlannedCommand>,
}

/// A pipeline definition
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Pipeline name
    pub name: String,

    /// Services the commands expect
    pub services: Vec<String>,

    /// Environment applied to every entry, in declaration order
    pub env: Vec<(String, String)>,

    /// The four phases
    pub phases: Phases,

    /// Matrix entries in declaration order
    pub entries: Vec<MatrixEntry>,

    /// Versions whose failure keeps the aggregate status passing
    pub allow_failures: HashSet<String>,

    /// Directory commands run in
    pub working_directory: Option<PathBuf>,

    /// Shell used to interpret commands
    pub shell: String,

    /// Execution state
    pub state: PipelineState,
}

impl Pipeline {
    /// Create a pipeline from a validated configuration
    pub fn from_config(config: &PipelineConfig) -> Self {
        let timeout = config.command_timeout_secs;
        let build = |commands: &[crate::core::config::CommandConfig]| {
            commands
                .iter()
                .map(|c| Command::from_config(c, timeout))
                .collect::<Vec<_>>()
        };

        let phases = Phases {
            install: build(config.install.as_slice()),
            before_script: build(config.before_script.as_slice()),
            script: build(config.script.as_slice()),
            after_script: build(config.after_script.as_slice()),
        };

        let entries = config
            .versions()
            .into_iter()
            .map(|version| {
                let id = match &config.language {
                    Some(language) => format!("{}-{}", language, version),
                    None => version.clone(),
                };
                MatrixEntry::new(id, version)
            })
            .collect();

        Pipeline {
            name: config.name.clone(),
            services: config.services.clone(),
            env: config.env_pairs().unwrap_or_default(),
            phases,
            entries,
            allow_failures: config.allow_failures.iter().cloned().collect(),
            working_directory: config.resolved_working_directory(),
            shell: config.shell.clone(),
            state: PipelineState::new(),
        }
    }

    /// Get an entry by ID
    pub fn entry(&self, id: &str) -> Option<&MatrixEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Get a mutable entry by ID
    pub fn entry_mut(&mut self, id: &str) -> Option<&mut MatrixEntry> {
        self.entries.iter_mut().find(|e| e.id == id)
    }

    /// Get an entry by interpreter version
    pub fn entry_for_version(&self, version: &str) -> Option<&MatrixEntry> {
        self.entries.iter().find(|e| e.interpreter_version == version)
    }

    /// Set or override an environment variable
    pub fn set_env(&mut self, key: &str, value: &str) {
        match self.env.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = value.to_string(),
            None => self.env.push((key.to_string(), value.to_string())),
        }
    }

    /// Keep only the entries for the given versions
    pub fn retain_versions(&mut self, versions: &[String]) -> anyhow::Result<()> {
        if versions.is_empty() {
            return Ok(());
        }

        for version in versions {
            if self.entry_for_version(version).is_none() {
                anyhow::bail!(
                    "Version '{}' is not part of the matrix of '{}'",
                    version,
                    self.name
                );
            }
        }

        self.entries
            .retain(|e| versions.contains(&e.interpreter_version));
        Ok(())
    }

    /// Whether an entry's failure is tolerated
    pub fn is_allowed_failure(&self, entry: &MatrixEntry) -> bool {
        self.allow_failures.contains(&entry.interpreter_version)
    }

    /// Check if every entry has a verdict
    pub fn is_complete(&self) -> bool {
        self.entries.iter().all(|e| e.state.is_terminal())
    }

    /// Check if pipeline has failed
    pub fn has_failed(&self) -> bool {
        self.state.status == ExecutionStatus::Failed
    }

    /// Aggregate status across the matrix: passed iff every entry passed or
    /// is an allowed failure
    pub fn aggregate_status(&self) -> ExecutionStatus {
        if !self.is_complete() {
            return ExecutionStatus::Running;
        }

        let failed = self.entries.iter().any(|e| {
            e.verdict() == Some(Verdict::Failed) && !self.is_allowed_failure(e)
        });

        if failed {
            ExecutionStatus::Failed
        } else {
            ExecutionStatus::Passed
        }
    }

    /// Create the execution context for an entry
    pub fn context_for_entry(&self, entry: &MatrixEntry) -> EntryContext {
        EntryContext::new(&self.name, &entry.id, &entry.interpreter_version, &self.env)
            .with_working_directory(self.working_directory.clone())
    }

    /// Evaluate every command's condition for every entry
    pub fn plan(&self) -> Vec<EntryPlan> {
        self.entries
            .iter()
            .map(|entry| {
                let context = self.context_for_entry(entry);
                let commands = Phase::ALL
                    .iter()
                    .flat_map(|phase| {
                        self.phases.commands(*phase).iter().map(|command| {
                            let will_run =
                                command.applies_to(&context.interpreter_version, &context.env);
                            PlannedCommand {
                                phase: *phase,
                                command: command.run.clone(),
                                will_run,
                                skip_reason: (!will_run).then(|| command.skip_reason()),
                            }
                        })
                    })
                    .collect();

                EntryPlan {
                    entry_id: entry.id.clone(),
                    interpreter_version: entry.interpreter_version.clone(),
                    allowed_failure: self.is_allowed_failure(entry),
                    commands,
                }
            })
            .collect()
    }
}
