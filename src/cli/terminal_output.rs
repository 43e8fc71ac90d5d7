//! Printing of captured command output for `run --show-output`

use crate::core::{CommandRecord, CommandStatus};
use console::style;

/// Renders the stdout and stderr of finished commands between separators
#[derive(Debug, Clone)]
pub struct CommandOutputPrinter {
    max_lines: usize,
}

impl CommandOutputPrinter {
    pub fn new(max_lines: usize) -> Self {
        Self { max_lines }
    }

    /// Render the block for one command, or `None` if it printed nothing
    pub fn render(&self, entry_id: &str, record: &CommandRecord) -> Option<String> {
        if matches!(record.status, CommandStatus::Skipped { .. }) {
            return None;
        }
        if record.stdout.trim().is_empty() && record.stderr.trim().is_empty() {
            return None;
        }

        let mut block = vec![
            separator(),
            format!(
                "[{}] {}: {}",
                style(entry_id).cyan(),
                style(record.phase).dim(),
                style(&record.command).bold()
            ),
        ];
        if !record.stdout.trim().is_empty() {
            block.push(super::output::format_output(record.stdout.trim_end(), self.max_lines));
        }
        if !record.stderr.trim().is_empty() {
            block.push(
                style(super::output::format_output(record.stderr.trim_end(), self.max_lines))
                    .red()
                    .to_string(),
            );
        }
        block.push(separator());
        Some(block.join("\n"))
    }
}

impl Default for CommandOutputPrinter {
    fn default() -> Self {
        Self::new(50)
    }
}

/// A horizontal rule spanning the terminal width
fn separator() -> String {
    // Default to 80 columns when stdout is not a terminal
    let width = term_size::dimensions_stdout()
        .map(|(w, _)| w)
        .unwrap_or(80);
    "─".repeat(width)
}
