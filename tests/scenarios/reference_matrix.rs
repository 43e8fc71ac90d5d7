//! Test: the tornado-sqlalchemy matrix end to end

use crate::helpers::*;
use ci_pipeline::core::{ExecutionStatus, Verdict};

const BLACK: &str = "make lint-black";

/// Scenario A: 3.6 with every command succeeding passes and runs black
#[tokio::test]
async fn test_scenario_a_passes_and_runs_black() {
    let result = run_reference(ScriptedRunner::new()).await;

    assert_verdict(&result, "3.6", Verdict::Passed);
    assert_eq!(result.count("3.6", BLACK), 1);
    assert_execution_order(
        &result,
        "3.6",
        &[
            "docker-compose build",
            "docker-compose up -d",
            "pip install --upgrade pip",
            "pip install pipenv",
            "pipenv install --dev",
            "make flake8",
            "make lint-black",
            "make test",
            "docker-compose down",
        ],
    );
    assert_eq!(result.status, ExecutionStatus::Passed);
}

/// Scenario B: 3.5 with every command succeeding passes without black
#[tokio::test]
async fn test_scenario_b_passes_without_black() {
    let result = run_reference(ScriptedRunner::new()).await;

    assert_verdict(&result, "3.5", Verdict::Passed);
    assert_eq!(result.count("3.5", BLACK), 0);
    assert!(!result.entry("3.5").was_executed(BLACK));

    let skipped = result
        .entry("3.5")
        .records
        .iter()
        .find(|r| r.command == BLACK)
        .expect("skipped command is recorded");
    assert!(!skipped.was_executed());
    assert!(!skipped.is_failure());
}

/// Scenario C: a failing `make test` on 3.7 fails that entry, teardown still runs
#[tokio::test]
async fn test_scenario_c_test_failure_still_tears_down() {
    let result = run_reference(ScriptedRunner::new().exit_with_on("3.7", "make test", 1)).await;

    assert_verdict(&result, "3.7", Verdict::Failed);
    assert_teardown_ran_once(&result, "3.7");
    assert_verdict(&result, "3.5", Verdict::Passed);
    assert_verdict(&result, "3.6", Verdict::Passed);
    assert_eq!(result.status, ExecutionStatus::Failed);
}

/// Scenario D: a failing image build on 3.6 skips setup and script
#[tokio::test]
async fn test_scenario_d_build_failure_skips_to_teardown() {
    let result =
        run_reference(ScriptedRunner::new().exit_with_on("3.6", "docker-compose build", 1)).await;

    assert_verdict(&result, "3.6", Verdict::Failed);
    assert_execution_order(&result, "3.6", &["docker-compose build", "docker-compose down"]);
    assert_teardown_ran_once(&result, "3.6");
}

/// black runs for a version iff that version is not 3.5
#[tokio::test]
async fn test_black_runs_iff_version_is_not_3_5() {
    let result = run_reference(ScriptedRunner::new()).await;

    for entry in &result.pipeline.entries {
        let version = entry.interpreter_version.as_str();
        let expected = usize::from(version != "3.5");
        assert_eq!(
            result.count(version, BLACK),
            expected,
            "black invocations for {}",
            version
        );
    }
}

/// Entries are exported to their commands with their own identity
#[tokio::test]
async fn test_entry_environment_is_exported() {
    let result = run_reference(ScriptedRunner::new()).await;

    for invocation in &result.invocations {
        assert_eq!(invocation.env.get("ASYNC_TEST_TIMEOUT").map(String::as_str), Some("30"));
        assert_eq!(invocation.env.get("CI").map(String::as_str), Some("true"));
        assert_eq!(
            invocation.env.get("CI_PIPELINE").map(String::as_str),
            Some("tornado-sqlalchemy")
        );
        assert_eq!(
            invocation.env.get("CI_MATRIX_ENTRY"),
            Some(&format!("python-{}", invocation.version))
        );
    }
}
