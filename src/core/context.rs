//! Matrix entry context - environment and working directory for one run

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Variables exported to every command of a matrix entry
pub const CI_VAR: &str = "CI";
pub const PIPELINE_VAR: &str = "CI_PIPELINE";
pub const ENTRY_VAR: &str = "CI_MATRIX_ENTRY";
pub const VERSION_VAR: &str = "CI_INTERPRETER_VERSION";

/// Execution context for one matrix entry
///
/// Owned by the entry's task for the duration of its run and dropped after
/// `after_script`; nothing in it is shared with other entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryContext {
    /// Entry identifier, e.g. `python-3.6`
    pub entry_id: String,

    /// Interpreter version this entry runs
    pub interpreter_version: String,

    /// Environment passed to every command
    pub env: HashMap<String, String>,

    /// Directory commands run in (None = current directory)
    pub working_directory: Option<PathBuf>,
}

impl EntryContext {
    /// Create a context for an entry, layering the exported CI variables
    /// over the pipeline environment
    pub fn new(
        pipeline_name: &str,
        entry_id: &str,
        interpreter_version: &str,
        pipeline_env: &[(String, String)],
    ) -> Self {
        let mut env: HashMap<String, String> = pipeline_env.iter().cloned().collect();
        env.insert(CI_VAR.to_string(), "true".to_string());
        env.insert(PIPELINE_VAR.to_string(), pipeline_name.to_string());
        env.insert(ENTRY_VAR.to_string(), entry_id.to_string());
        env.insert(VERSION_VAR.to_string(), interpreter_version.to_string());

        Self {
            entry_id: entry_id.to_string(),
            interpreter_version: interpreter_version.to_string(),
            env,
            working_directory: None,
        }
    }

    /// Set the working directory
    pub fn with_working_directory(mut self, dir: Option<PathBuf>) -> Self {
        self.working_directory = dir;
        self
    }

    /// Get an environment variable
    pub fn get_env(&self, key: &str) -> Option<&String> {
        self.env.get(key)
    }
}
