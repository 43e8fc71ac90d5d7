//! CLI output formatting

use crate::{
    core::{CommandStatus, EntryPlan, ExecutionStatus, Verdict},
    execution::ExecutionEvent,
    persistence::{EntrySummary, ExecutionSummary},
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");

/// Create a progress bar over matrix entries
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    progress.set_style(style);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Format an execution status for display
pub fn format_status(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Pending => style("PENDING").dim().to_string(),
        ExecutionStatus::Running => style("RUNNING").yellow().to_string(),
        ExecutionStatus::Passed => style("PASSED").green().to_string(),
        ExecutionStatus::Failed => style("FAILED").red().to_string(),
    }
}

/// Format an entry verdict, marking tolerated failures
pub fn format_verdict(verdict: Option<Verdict>, allowed_failure: bool) -> String {
    match verdict {
        Some(Verdict::Passed) => style("passed").green().to_string(),
        Some(Verdict::Failed) if allowed_failure => {
            style("failed (allowed)").yellow().to_string()
        }
        Some(Verdict::Failed) => style("failed").red().to_string(),
        None => style("not run").dim().to_string(),
    }
}

/// Format execution summary for display
pub fn format_execution_summary(summary: &ExecutionSummary) -> String {
    let status_icon = match summary.status {
        ExecutionStatus::Passed => CHECK,
        ExecutionStatus::Failed => CROSS,
        ExecutionStatus::Running => SPINNER,
        ExecutionStatus::Pending => INFO,
    };

    format!(
        "{} {} - {} - {} ({}/{} passed) - {}",
        status_icon,
        style(short_id(&summary.execution_id.to_string())).dim(),
        style(&summary.pipeline_name).bold(),
        format_status(summary.status),
        summary.passed_entries(),
        summary.total_entries(),
        style(summary.started_at.format("%Y-%m-%d %H:%M:%S")).dim()
    )
}

/// Format one entry line of a stored execution
pub fn format_entry_summary(entry: &EntrySummary) -> String {
    let mut line = format!(
        "{} {}",
        style(&entry.entry_id).cyan(),
        format_verdict(entry.verdict, entry.allowed_failure)
    );
    if !entry.failed_commands.is_empty() {
        line.push_str(&format!(
            " {}",
            style(format!("[{}]", entry.failed_commands.join(", "))).dim()
        ));
    }
    if !entry.teardown_failures.is_empty() {
        line.push_str(&format!(
            " {} teardown: {}",
            WARN,
            entry.teardown_failures.join(", ")
        ));
    }
    line
}

/// Format an execution event for display.
///
/// Returns `None` for events too chatty for the default console output.
pub fn format_execution_event(event: &ExecutionEvent) -> Option<String> {
    let line = match event {
        ExecutionEvent::PipelineStarted {
            execution_id,
            pipeline_name,
            total_entries,
        } => format!(
            "{} Starting pipeline {} ({}) with {} matrix entries",
            ROCKET,
            style(pipeline_name).bold(),
            style(short_id(&execution_id.to_string())).dim(),
            style(total_entries).cyan()
        ),
        ExecutionEvent::EntryStarted {
            entry_id,
            interpreter_version,
        } => format!(
            "{} {} (version {})",
            SPINNER,
            style(entry_id).cyan(),
            style(interpreter_version).dim()
        ),
        ExecutionEvent::PhaseStarted { .. } | ExecutionEvent::CommandStarted { .. } => {
            return None
        }
        ExecutionEvent::CommandFinished { entry_id, record } => match &record.status {
            CommandStatus::Succeeded => format!(
                "  {} {} {}: {} {}",
                CHECK,
                style(entry_id).dim(),
                record.phase,
                record.command,
                style(format!("({}ms)", record.duration_ms)).dim()
            ),
            CommandStatus::Failed { error, .. } => format!(
                "  {} {} {}: {} {}",
                CROSS,
                style(entry_id).dim(),
                record.phase,
                style(&record.command).red(),
                style(error).dim()
            ),
            CommandStatus::Skipped { reason } => format!(
                "  {} {} {}: {} ({})",
                SKIP,
                style(entry_id).dim(),
                record.phase,
                style(&record.command).dim(),
                style(reason).dim()
            ),
        },
        ExecutionEvent::PhaseAborted {
            entry_id,
            phase,
            command,
        } => format!(
            "  {} {} {} failed on `{}`; skipping to after_script",
            WARN,
            style(entry_id).yellow(),
            phase,
            command
        ),
        ExecutionEvent::TeardownFailed { entry_id, failure } => format!(
            "  {} {} after_script: `{}` {}",
            WARN,
            style(entry_id).yellow(),
            failure.command,
            style(&failure.error).dim()
        ),
        ExecutionEvent::EntryFinished {
            entry_id,
            verdict,
            failure,
            ..
        } => match (verdict, failure) {
            (Verdict::Failed, Some(cause)) => format!(
                "{} {} {}: {}",
                CROSS,
                style(entry_id).red(),
                style("failed").red(),
                cause
            ),
            (Verdict::Failed, None) => {
                format!("{} {} {}", CROSS, style(entry_id).red(), style("failed").red())
            }
            (Verdict::Passed, _) => {
                format!("{} {} {}", CHECK, style(entry_id).green(), style("passed").green())
            }
        },
        ExecutionEvent::PipelineCompleted {
            execution_id,
            status,
        } => format!(
            "{} Pipeline ({}) {}",
            INFO,
            style(short_id(&execution_id.to_string())).dim(),
            format_status(*status)
        ),
    };
    Some(line)
}

/// Format the plan for one matrix entry
pub fn format_plan(plan: &EntryPlan) -> String {
    let mut lines = vec![format!(
        "{} {} (version {}){}",
        INFO,
        style(&plan.entry_id).bold(),
        plan.interpreter_version,
        if plan.allowed_failure {
            style(" [allowed to fail]").yellow().to_string()
        } else {
            String::new()
        }
    )];

    for command in &plan.commands {
        match &command.skip_reason {
            None => lines.push(format!("  {:<14} {}", command.phase.as_str(), command.command)),
            Some(reason) => lines.push(format!(
                "  {:<14} {} {}",
                command.phase.as_str(),
                style(&command.command).dim(),
                style(format!("(skipped: {})", reason)).dim()
            )),
        }
    }

    lines.join("\n")
}

/// Format command output with truncation
pub fn format_output(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();

    if lines.len() <= max_lines {
        output.to_string()
    } else {
        let truncated = lines[..max_lines].join("\n");
        format!(
            "{}\n{}... ({} more lines)",
            truncated,
            style("[truncated]").dim(),
            lines.len() - max_lines
        )
    }
}

/// Format a duration as `1h 2m 3s`
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

/// First eight characters of an id
pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
