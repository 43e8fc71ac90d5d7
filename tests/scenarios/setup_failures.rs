//! Test: failures in install and before_script abort the entry

use crate::helpers::*;
use ci_pipeline::core::{CommandStatus, EntryState, FailureCause, Phase, Verdict};

/// Whichever setup command fails, nothing after it runs except after_script
#[tokio::test]
async fn test_any_setup_failure_skips_remaining_setup_and_script() {
    let install = reference_commands(Phase::Install);
    let before_script = reference_commands(Phase::BeforeScript);
    let setup: Vec<String> = install.iter().chain(before_script.iter()).cloned().collect();

    for (position, failing) in setup.iter().enumerate() {
        let result = run_reference(ScriptedRunner::new().exit_with_on("3.6", failing, 2)).await;

        assert_verdict(&result, "3.6", Verdict::Failed);

        let mut expected: Vec<String> = setup[..=position].to_vec();
        expected.extend(reference_commands(Phase::AfterScript));
        assert_eq!(
            result.commands_for("3.6"),
            expected,
            "after `{}` failed",
            failing
        );

        for command in reference_commands(Phase::Script) {
            assert!(!result.entry("3.6").was_executed(&command));
        }
        assert_teardown_ran_once(&result, "3.6");
    }
}

/// The failure cause names the phase and command
#[tokio::test]
async fn test_setup_failure_cause() {
    let result = run_reference(ScriptedRunner::new().exit_with("pipenv install --dev", 1)).await;

    for entry in &result.pipeline.entries {
        match &entry.state {
            EntryState::Finished {
                verdict: Verdict::Failed,
                failure: Some(FailureCause::Setup { phase, command, exit_code }),
                ..
            } => {
                assert_eq!(*phase, Phase::BeforeScript);
                assert_eq!(command, "pipenv install --dev");
                assert_eq!(*exit_code, Some(1));
            }
            other => panic!("unexpected state for {}: {:?}", entry.id, other),
        }
    }
}

/// A command that cannot be started counts as a failed command
#[tokio::test]
async fn test_unspawnable_command_fails_setup() {
    let result = run_reference(ScriptedRunner::new().unspawnable("docker-compose up -d")).await;

    assert_verdict(&result, "3.5", Verdict::Failed);
    assert_execution_order(
        &result,
        "3.5",
        &["docker-compose build", "docker-compose up -d", "docker-compose down"],
    );

    let record = result
        .entry("3.5")
        .records
        .iter()
        .find(|r| r.command == "docker-compose up -d")
        .unwrap();
    match &record.status {
        CommandStatus::Failed { exit_code, error } => {
            assert_eq!(*exit_code, None);
            assert!(error.contains("failed to spawn"), "{}", error);
        }
        other => panic!("unexpected status {:?}", other),
    }
}
