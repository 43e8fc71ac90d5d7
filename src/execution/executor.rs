//! Entry executor - runs the phases of one matrix entry

use crate::{
    core::{
        Command, CommandRecord, CommandStatus, EntryContext, EntryState, FailureCause,
        MatrixEntry, Phase, Phases, TeardownFailure, Verdict,
    },
    execution::events::{EventSink, ExecutionEvent},
    runner::{CommandRequest, CommandRunner, RunnerError},
};
use chrono::Utc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

/// Runs matrix entries through `install`, `before_script`, `script` and
/// `after_script`
pub struct EntryExecutor<R> {
    runner: R,
}

impl<R: CommandRunner> EntryExecutor<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    /// Run one matrix entry and return its verdict.
    ///
    /// A failing `install` or `before_script` command stops all further
    /// setup and `script` commands. Failing `script` commands are recorded
    /// and the remaining script commands still run. `after_script` always
    /// runs in full; its failures become teardown diagnostics and never
    /// change the verdict.
    pub async fn run(
        &self,
        entry: &mut MatrixEntry,
        phases: &Phases,
        context: &EntryContext,
        events: &EventSink,
    ) -> Verdict {
        let started_at = Utc::now();
        entry.state = EntryState::Running { started_at };
        entry.records.clear();
        entry.teardown_failures.clear();

        info!("Running {} (version {})", entry.id, entry.interpreter_version);
        events
            .emit(ExecutionEvent::EntryStarted {
                entry_id: entry.id.clone(),
                interpreter_version: entry.interpreter_version.clone(),
            })
            .await;

        let mut failure: Option<FailureCause> = None;

        'setup: for phase in Phase::ALL.into_iter().filter(|p| p.aborts_on_failure()) {
            self.start_phase(entry, phase, events).await;

            for command in phases.commands(phase) {
                let record = self.run_command(phase, command, context, events).await;
                let failed = record.is_failure();
                let exit_code = record.exit_code();
                entry.records.push(record);

                if failed {
                    warn!(
                        "{}: {} failed on `{}`, skipping to teardown",
                        entry.id, phase, command.run
                    );
                    failure = Some(FailureCause::Setup {
                        phase,
                        command: command.run.clone(),
                        exit_code,
                    });
                    events
                        .emit(ExecutionEvent::PhaseAborted {
                            entry_id: entry.id.clone(),
                            phase,
                            command: command.run.clone(),
                        })
                        .await;
                    break 'setup;
                }
            }
        }

        if failure.is_none() {
            self.start_phase(entry, Phase::Script, events).await;

            let mut failed_commands = Vec::new();
            for command in phases.commands(Phase::Script) {
                let record = self.run_command(Phase::Script, command, context, events).await;
                if record.is_failure() {
                    warn!("{}: script command `{}` failed", entry.id, command.run);
                    failed_commands.push(command.run.clone());
                }
                entry.records.push(record);
            }

            if !failed_commands.is_empty() {
                failure = Some(FailureCause::Script {
                    commands: failed_commands,
                });
            }
        }

        self.start_phase(entry, Phase::AfterScript, events).await;
        for command in phases.commands(Phase::AfterScript) {
            let record = self.run_command(Phase::AfterScript, command, context, events).await;
            if let CommandStatus::Failed { exit_code, error } = &record.status {
                warn!("{}: teardown command `{}` failed: {}", entry.id, command.run, error);
                let teardown = TeardownFailure {
                    command: command.run.clone(),
                    exit_code: *exit_code,
                    error: error.clone(),
                };
                entry.teardown_failures.push(teardown.clone());
                events
                    .emit(ExecutionEvent::TeardownFailed {
                        entry_id: entry.id.clone(),
                        failure: teardown,
                    })
                    .await;
            }
            entry.records.push(record);
        }

        let verdict = if failure.is_some() {
            Verdict::Failed
        } else {
            Verdict::Passed
        };

        info!("{} finished: {:?}", entry.id, verdict);
        entry.state = EntryState::Finished {
            verdict,
            failure: failure.clone(),
            started_at,
            finished_at: Utc::now(),
        };

        events
            .emit(ExecutionEvent::EntryFinished {
                entry_id: entry.id.clone(),
                interpreter_version: entry.interpreter_version.clone(),
                verdict,
                failure,
            })
            .await;

        verdict
    }

    async fn start_phase(&self, entry: &MatrixEntry, phase: Phase, events: &EventSink) {
        debug!("{}: entering {}", entry.id, phase);
        events
            .emit(ExecutionEvent::PhaseStarted {
                entry_id: entry.id.clone(),
                phase,
            })
            .await;
    }

    /// Run (or skip) a single command and record the outcome
    async fn run_command(
        &self,
        phase: Phase,
        command: &Command,
        context: &EntryContext,
        events: &EventSink,
    ) -> CommandRecord {
        if !command.applies_to(&context.interpreter_version, &context.env) {
            let reason = command.skip_reason();
            info!("{}: skipping `{}` ({})", context.entry_id, command.run, reason);
            let record = CommandRecord::skipped(phase, &command.run, reason);
            events
                .emit(ExecutionEvent::CommandFinished {
                    entry_id: context.entry_id.clone(),
                    record: record.clone(),
                })
                .await;
            return record;
        }

        events
            .emit(ExecutionEvent::CommandStarted {
                entry_id: context.entry_id.clone(),
                phase,
                command: command.run.clone(),
            })
            .await;

        let request = CommandRequest::new(command.run.clone())
            .with_env(context.env.clone())
            .with_working_directory(context.working_directory.clone());

        let started_at = Utc::now();
        let clock = Instant::now();
        let result = match command.timeout_secs {
            Some(secs) => {
                match timeout(Duration::from_secs(secs), self.runner.run(&request)).await {
                    Ok(result) => result,
                    Err(_) => Err(RunnerError::Timeout(secs)),
                }
            }
            None => self.runner.run(&request).await,
        };
        let duration_ms = clock.elapsed().as_millis() as u64;

        let (status, stdout, stderr) = match result {
            Ok(output) if output.success() => {
                (CommandStatus::Succeeded, output.stdout, output.stderr)
            }
            Ok(output) => {
                let error = match output.exit_code {
                    Some(code) => format!("exited with code {}", code),
                    None => "terminated by a signal".to_string(),
                };
                (
                    CommandStatus::Failed {
                        exit_code: output.exit_code,
                        error,
                    },
                    output.stdout,
                    output.stderr,
                )
            }
            Err(e) => (
                CommandStatus::Failed {
                    exit_code: None,
                    error: e.to_string(),
                },
                String::new(),
                String::new(),
            ),
        };

        debug!("{}: `{}` -> {:?} in {}ms", context.entry_id, command.name, status, duration_ms);

        let record = CommandRecord {
            phase,
            command: command.run.clone(),
            status,
            stdout,
            stderr,
            started_at,
            duration_ms,
        };

        events
            .emit(ExecutionEvent::CommandFinished {
                entry_id: context.entry_id.clone(),
                record: record.clone(),
            })
            .await;

        record
    }
}
