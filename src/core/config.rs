//! Pipeline configuration from YAML

use crate::core::{condition::RunCondition, Pipeline};
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Top-level pipeline configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name
    pub name: String,

    /// Language of the project under test (used for entry ids)
    #[serde(default)]
    pub language: Option<String>,

    /// Interpreter versions, one matrix entry each. Integers are accepted;
    /// floats must be quoted since YAML drops their trailing zeros.
    #[serde(default, alias = "python")]
    versions: Vec<Value>,

    /// Services the commands expect (informational)
    #[serde(default)]
    pub services: Vec<String>,

    /// Environment applied identically to every matrix entry
    #[serde(default)]
    env: EnvConfig,

    #[serde(default)]
    pub install: Vec<CommandConfig>,

    #[serde(default)]
    pub before_script: Vec<CommandConfig>,

    #[serde(default)]
    pub script: Vec<CommandConfig>,

    #[serde(default)]
    pub after_script: Vec<CommandConfig>,

    /// Versions whose failure does not fail the whole matrix
    #[serde(default)]
    pub allow_failures: Vec<String>,

    /// Default timeout for every command (in seconds)
    #[serde(default)]
    pub command_timeout_secs: Option<u64>,

    /// Directory commands run in, relative to the config file
    #[serde(default)]
    pub working_directory: Option<String>,

    /// Shell used to interpret commands (`<shell> -c <command>`)
    #[serde(default = "default_shell")]
    pub shell: String,

    /// Directory of the file this config was loaded from (not serialized)
    #[serde(skip)]
    source_dir: Option<PathBuf>,
}

fn default_shell() -> String {
    "sh".to_string()
}

/// `env:` as a list of `KEY=VALUE` strings or as a mapping
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvConfig {
    List(Vec<String>),
    Map(BTreeMap<String, Value>),
}

impl Default for EnvConfig {
    fn default() -> Self {
        EnvConfig::List(Vec::new())
    }
}

/// A command: plain shell text, or a mapping with options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandConfig {
    Plain(String),
    Detailed(DetailedCommandConfig),
}

/// Mapping form of a command
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DetailedCommandConfig {
    /// Shell text to run
    pub run: String,

    /// Human-readable name
    #[serde(default)]
    pub name: Option<String>,

    /// Run condition, e.g. `version != "3.5"`
    #[serde(default, rename = "if")]
    pub condition: Option<String>,

    /// Timeout for this command (overrides `command_timeout_secs`)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl CommandConfig {
    pub fn run(&self) -> &str {
        match self {
            CommandConfig::Plain(run) => run,
            CommandConfig::Detailed(detailed) => &detailed.run,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            CommandConfig::Plain(_) => None,
            CommandConfig::Detailed(detailed) => detailed.name.as_deref(),
        }
    }

    pub fn condition(&self) -> Option<&str> {
        match self {
            CommandConfig::Plain(_) => None,
            CommandConfig::Detailed(detailed) => detailed.condition.as_deref(),
        }
    }

    pub fn timeout_secs(&self) -> Option<u64> {
        match self {
            CommandConfig::Plain(_) => None,
            CommandConfig::Detailed(detailed) => detailed.timeout_secs,
        }
    }
}

fn env_key_regex() -> &'static Regex {
    static ENV_KEY: OnceLock<Regex> = OnceLock::new();
    ENV_KEY.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("env key regex is valid")
    })
}

/// Check that a string is usable as an environment variable name
pub fn is_valid_env_key(key: &str) -> bool {
    env_key_regex().is_match(key)
}

/// Render a scalar YAML value as the text the user wrote.
///
/// Floats are refused: `3.10` is parsed as the number 3.1 before we see it.
fn scalar_to_string(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) if n.is_f64() => {
            anyhow::bail!("{} is a YAML float; quote it (\"{}\") to keep it as written", n, n)
        }
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => anyhow::bail!("expected a scalar, got {:?}", other),
    }
}

impl PipelineConfig {
    /// Load pipeline configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mut config = Self::from_yaml(&content)
            .with_context(|| format!("Invalid pipeline config {}", path.display()))?;
        config.source_dir = path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    /// Parse pipeline configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the pipeline configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            anyhow::bail!("Pipeline name must not be empty");
        }

        if self.shell.trim().is_empty() {
            anyhow::bail!("Shell must not be empty");
        }

        // Versions: present, scalar, unique
        if self.versions.is_empty() {
            anyhow::bail!("Pipeline '{}' declares no interpreter versions", self.name);
        }
        let mut seen_versions = HashSet::new();
        for value in &self.versions {
            let version = match value {
                Value::Bool(_) => anyhow::bail!("Interpreter version must not be a boolean"),
                _ => scalar_to_string(value).context("Invalid interpreter version")?,
            };
            if version.trim().is_empty() {
                anyhow::bail!("Interpreter version must not be empty");
            }
            if !seen_versions.insert(version.clone()) {
                anyhow::bail!("Duplicate interpreter version: {}", version);
            }
        }

        for version in &self.allow_failures {
            if !seen_versions.contains(version) {
                anyhow::bail!(
                    "allow_failures references undeclared version '{}'",
                    version
                );
            }
        }

        self.env_pairs()?;

        if self.command_timeout_secs == Some(0) {
            anyhow::bail!("command_timeout_secs must be greater than zero");
        }

        for (phase, commands) in self.phase_configs() {
            for command in commands {
                if command.run().trim().is_empty() {
                    anyhow::bail!("Empty command in phase '{}'", phase);
                }
                if command.timeout_secs() == Some(0) {
                    anyhow::bail!(
                        "Command '{}' in phase '{}' has a zero timeout",
                        command.run(),
                        phase
                    );
                }
                if let Some(expression) = command.condition() {
                    RunCondition::parse(expression).with_context(|| {
                        format!(
                            "Invalid condition on command '{}' in phase '{}'",
                            command.run(),
                            phase
                        )
                    })?;
                }
            }
        }

        Ok(())
    }

    /// Phase name and command list, in execution order
    pub fn phase_configs(&self) -> [(&'static str, &[CommandConfig]); 4] {
        [
            ("install", self.install.as_slice()),
            ("before_script", self.before_script.as_slice()),
            ("script", self.script.as_slice()),
            ("after_script", self.after_script.as_slice()),
        ]
    }

    /// Interpreter versions in declaration order
    pub fn versions(&self) -> Vec<String> {
        self.versions.iter().filter_map(|v| scalar_to_string(v).ok()).collect()
    }

    /// Environment assignments in declaration order
    pub fn env_pairs(&self) -> Result<Vec<(String, String)>> {
        let pairs = match &self.env {
            EnvConfig::List(items) => items
                .iter()
                .map(|item| {
                    let (key, value) = item.split_once('=').ok_or_else(|| {
                        anyhow::anyhow!("Invalid env entry '{}' (expected KEY=VALUE)", item)
                    })?;
                    Ok((key.trim().to_string(), value.to_string()))
                })
                .collect::<Result<Vec<_>>>()?,
            EnvConfig::Map(map) => map
                .iter()
                .map(|(key, value)| {
                    let value = scalar_to_string(value)
                        .with_context(|| format!("Invalid value for env variable '{}'", key))?;
                    Ok((key.clone(), value))
                })
                .collect::<Result<Vec<_>>>()?,
        };

        for (key, _) in &pairs {
            if !is_valid_env_key(key) {
                anyhow::bail!("Invalid environment variable name '{}'", key);
            }
        }

        Ok(pairs)
    }

    /// Directory commands run in
    pub fn resolved_working_directory(&self) -> Option<PathBuf> {
        match (&self.source_dir, &self.working_directory) {
            (Some(base), Some(dir)) => Some(base.join(dir)),
            (None, Some(dir)) => Some(PathBuf::from(dir)),
            (Some(base), None) if !base.as_os_str().is_empty() => Some(base.clone()),
            _ => None,
        }
    }

    /// Convert config to a Pipeline domain model
    pub fn to_pipeline(&self) -> Pipeline {
        Pipeline::from_config(self)
    }
}
