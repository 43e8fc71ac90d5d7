//! CLI command definitions

use crate::core::config::is_valid_env_key;
use crate::execution::SchedulingStrategy;
use clap::Args;

/// Run the build matrix of a pipeline
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to pipeline YAML file
    #[arg(short, long, default_value = ".ci-pipeline.yml")]
    pub file: String,

    /// Only run the entries for these interpreter versions
    #[arg(long)]
    pub only: Vec<String>,

    /// Environment overrides (KEY=VALUE)
    #[arg(long, value_parser = parse_key_value)]
    pub env: Vec<(String, String)>,

    /// Scheduling strategy
    #[arg(long, value_enum, default_value_t = SchedulingStrategyArg::Sequential)]
    pub strategy: SchedulingStrategyArg,

    /// Maximum concurrent entries for `parallel-limited`
    #[arg(long, default_value_t = 4)]
    pub jobs: usize,

    /// Don't save execution to history
    #[arg(long)]
    pub no_history: bool,

    /// Print the plan instead of running anything
    #[arg(long)]
    pub dry_run: bool,

    /// Print captured command output
    #[arg(long)]
    pub show_output: bool,
}

impl RunCommand {
    pub fn scheduling_strategy(&self) -> SchedulingStrategy {
        match self.strategy {
            SchedulingStrategyArg::Sequential => SchedulingStrategy::Sequential,
            SchedulingStrategyArg::Parallel => SchedulingStrategy::Parallel,
            SchedulingStrategyArg::ParallelLimited => {
                SchedulingStrategy::LimitedParallel(self.jobs.max(1))
            }
        }
    }
}

/// Validate a pipeline configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to pipeline YAML file
    #[arg(short, long, default_value = ".ci-pipeline.yml")]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show which commands would run for each matrix entry
#[derive(Debug, Args, Clone)]
pub struct PlanCommand {
    /// Path to pipeline YAML file
    #[arg(short, long, default_value = ".ci-pipeline.yml")]
    pub file: String,

    /// Only plan the entries for these interpreter versions
    #[arg(long)]
    pub only: Vec<String>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// List pipelines found in history
#[derive(Debug, Args, Clone)]
pub struct ListCommand {
    /// Show execution counts
    #[arg(long)]
    pub with_counts: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show execution history
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Pipeline name to filter by
    #[arg(short, long)]
    pub pipeline: Option<String>,

    /// Number of recent executions to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Show full details
    #[arg(long)]
    pub verbose: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// Show a single execution
    #[arg(long)]
    pub execution_id: Option<String>,
}

/// Scheduling strategy argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SchedulingStrategyArg {
    Sequential,
    Parallel,
    #[clap(name = "parallel-limited")]
    ParallelLimited,
}

/// Parse KEY=VALUE pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("Invalid KEY=VALUE pair: {}", s))?;
    if !is_valid_env_key(key) {
        return Err(format!("Invalid environment variable name: {}", key));
    }
    Ok((key.to_string(), value.to_string()))
}
