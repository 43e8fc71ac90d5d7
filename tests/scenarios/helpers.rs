//! Test utility functions for ci-pipeline scenarios

use async_trait::async_trait;
use ci_pipeline::core::config::PipelineConfig;
use ci_pipeline::core::{ExecutionStatus, MatrixEntry, Phase, Pipeline, Verdict, VERSION_VAR};
use ci_pipeline::execution::{ExecutionEngine, SchedulingStrategy};
use ci_pipeline::runner::{CommandOutput, CommandRequest, CommandRunner, RunnerError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// The tornado-sqlalchemy build matrix shipped with the repository
pub const REFERENCE_YAML: &str = include_str!("../../pipelines/tornado-sqlalchemy.yml");

/// A command as the runner received it
#[derive(Debug, Clone)]
pub struct Invocation {
    pub version: String,
    pub command: String,
    pub env: HashMap<String, String>,
}

/// Mock runner with scripted exit codes.
///
/// Every command exits 0 unless a code was scripted for it, either for all
/// versions or for one interpreter version.
#[derive(Clone, Default)]
pub struct ScriptedRunner {
    everywhere: HashMap<String, i32>,
    per_version: HashMap<(String, String), i32>,
    unspawnable: Vec<String>,
    panics: Vec<(String, String)>,
    delays: HashMap<(String, String), u64>,
    log: Arc<Mutex<Vec<Invocation>>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a command exit with `code` for every version
    pub fn exit_with(mut self, command: &str, code: i32) -> Self {
        self.everywhere.insert(command.to_string(), code);
        self
    }

    /// Make a command exit with `code` for one version
    pub fn exit_with_on(mut self, version: &str, command: &str, code: i32) -> Self {
        self.per_version
            .insert((version.to_string(), command.to_string()), code);
        self
    }

    /// Make a command fail to start at all
    pub fn unspawnable(mut self, command: &str) -> Self {
        self.unspawnable.push(command.to_string());
        self
    }

    /// Make the runner panic on a command for one version
    pub fn panic_on(mut self, version: &str, command: &str) -> Self {
        self.panics.push((version.to_string(), command.to_string()));
        self
    }

    /// Make a command take `millis` before it exits, for one version
    pub fn delay_on(mut self, version: &str, command: &str, millis: u64) -> Self {
        self.delays
            .insert((version.to_string(), command.to_string()), millis);
        self
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, request: &CommandRequest) -> Result<CommandOutput, RunnerError> {
        let version = request.env.get(VERSION_VAR).cloned().unwrap_or_default();
        self.log.lock().unwrap().push(Invocation {
            version: version.clone(),
            command: request.command.clone(),
            env: request.env.clone(),
        });

        let key = (version.clone(), request.command.clone());
        if let Some(millis) = self.delays.get(&key) {
            tokio::time::sleep(std::time::Duration::from_millis(*millis)).await;
        }
        if self.panics.contains(&key) {
            panic!("scripted panic in `{}` on {}", request.command, version);
        }

        if self.unspawnable.contains(&request.command) {
            return Err(RunnerError::Spawn(format!("{}: not found", request.command)));
        }

        let code = self
            .per_version
            .get(&key)
            .or_else(|| self.everywhere.get(&request.command))
            .copied()
            .unwrap_or(0);

        Ok(CommandOutput {
            exit_code: Some(code),
            stdout: format!("ran {}\n", request.command),
            stderr: String::new(),
        })
    }
}

/// Result of running a pipeline against a mock runner
#[derive(Debug, Clone)]
pub struct PipelineTestResult {
    pub pipeline: Pipeline,
    pub status: ExecutionStatus,
    pub invocations: Vec<Invocation>,
}

impl PipelineTestResult {
    /// The matrix entry for a version
    pub fn entry(&self, version: &str) -> &MatrixEntry {
        self.pipeline
            .entry_for_version(version)
            .unwrap_or_else(|| panic!("No matrix entry for version '{}'", version))
    }

    pub fn verdict(&self, version: &str) -> Option<Verdict> {
        self.entry(version).verdict()
    }

    /// Commands the runner received for a version, in order
    pub fn commands_for(&self, version: &str) -> Vec<String> {
        self.invocations
            .iter()
            .filter(|i| i.version == version)
            .map(|i| i.command.clone())
            .collect()
    }

    /// How often a command was run for a version
    pub fn count(&self, version: &str, command: &str) -> usize {
        self.commands_for(version)
            .iter()
            .filter(|c| c.as_str() == command)
            .count()
    }
}

/// Load a pipeline from YAML
pub fn pipeline_from_yaml(yaml: &str) -> Pipeline {
    PipelineConfig::from_yaml(yaml)
        .unwrap_or_else(|e| panic!("Invalid test pipeline: {:#}", e))
        .to_pipeline()
}

/// Run a pipeline with a scripted runner
pub async fn run_pipeline_with(
    mut pipeline: Pipeline,
    runner: ScriptedRunner,
    strategy: SchedulingStrategy,
) -> PipelineTestResult {
    let handle = runner.clone();
    let engine = ExecutionEngine::new(runner, strategy);
    let status = engine
        .execute(&mut pipeline)
        .await
        .unwrap_or_else(|e| panic!("Engine error: {}", e));

    PipelineTestResult {
        pipeline,
        status,
        invocations: handle.invocations(),
    }
}

/// Run the reference matrix sequentially
pub async fn run_reference(runner: ScriptedRunner) -> PipelineTestResult {
    run_pipeline_with(
        pipeline_from_yaml(REFERENCE_YAML),
        runner,
        SchedulingStrategy::Sequential,
    )
    .await
}

/// Every command of a phase in the reference matrix
pub fn reference_commands(phase: Phase) -> Vec<String> {
    pipeline_from_yaml(REFERENCE_YAML)
        .phases
        .commands(phase)
        .iter()
        .map(|c| c.run.clone())
        .collect()
}

/// Assert the verdict of one matrix entry
pub fn assert_verdict(result: &PipelineTestResult, version: &str, expected: Verdict) {
    let actual = result.verdict(version);
    assert_eq!(
        actual,
        Some(expected),
        "Entry {} should be {:?}, but was {:?}; commands run: {:?}",
        version,
        expected,
        actual,
        result.commands_for(version)
    );
}

/// Assert the exact command sequence run for a version
pub fn assert_execution_order(result: &PipelineTestResult, version: &str, expected: &[&str]) {
    let actual = result.commands_for(version);
    assert_eq!(
        actual, expected,
        "Unexpected command sequence for {}",
        version
    );
}

/// Assert `after_script` ran exactly once, completely, and last
pub fn assert_teardown_ran_once(result: &PipelineTestResult, version: &str) {
    let teardown = reference_commands(Phase::AfterScript);
    let commands = result.commands_for(version);

    for command in &teardown {
        assert_eq!(
            result.count(version, command),
            1,
            "after_script command `{}` should run exactly once for {}",
            command,
            version
        );
    }
    assert!(
        commands.ends_with(&teardown),
        "after_script should be last for {}: {:?}",
        version,
        commands
    );
}
