//! Test: after_script always runs and never changes the verdict

use crate::helpers::*;
use ci_pipeline::core::{ExecutionStatus, Phase, Verdict};
use ci_pipeline::execution::SchedulingStrategy;

/// after_script runs exactly once per entry for every failure mode
#[tokio::test]
async fn test_teardown_runs_once_per_entry() {
    let runners = vec![
        ScriptedRunner::new(),
        ScriptedRunner::new().exit_with("docker-compose build", 1),
        ScriptedRunner::new().exit_with("pip install pipenv", 1),
        ScriptedRunner::new().exit_with("make flake8", 1),
        ScriptedRunner::new().exit_with("make test", 1),
        ScriptedRunner::new().exit_with("docker-compose down", 1),
    ];

    for runner in runners {
        let result = run_reference(runner).await;
        for version in ["3.5", "3.6", "3.7"] {
            assert_teardown_ran_once(&result, version);
        }
    }
}

/// A failing teardown is reported but the entry stays passed
#[tokio::test]
async fn test_teardown_failure_keeps_passed_verdict() {
    let runner = ScriptedRunner::new().exit_with_on("3.6", "docker-compose down", 1);
    let result = run_reference(runner).await;

    assert_verdict(&result, "3.6", Verdict::Passed);
    assert_eq!(result.status, ExecutionStatus::Passed);

    let failures = &result.entry("3.6").teardown_failures;
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].command, "docker-compose down");
    assert_eq!(failures[0].exit_code, Some(1));
    assert!(result.entry("3.5").teardown_failures.is_empty());
}

/// A failing teardown does not hide an earlier failure either
#[tokio::test]
async fn test_teardown_failure_keeps_failed_verdict() {
    let runner = ScriptedRunner::new()
        .exit_with("make test", 1)
        .exit_with("docker-compose down", 1);
    let result = run_reference(runner).await;

    assert_verdict(&result, "3.7", Verdict::Failed);
    assert_eq!(result.entry("3.7").teardown_failures.len(), 1);
}

/// Every after_script command runs even when an earlier one fails
#[tokio::test]
async fn test_all_teardown_commands_run() {
    let yaml = r#"
name: "teardown"
python: ["3.6"]
script:
  - make test
after_script:
  - docker-compose logs
  - docker-compose down
  - rm -rf .cache
"#;
    let runner = ScriptedRunner::new()
        .exit_with("docker-compose logs", 1)
        .exit_with("docker-compose down", 3);
    let result =
        run_pipeline_with(pipeline_from_yaml(yaml), runner, SchedulingStrategy::Sequential).await;

    assert_verdict(&result, "3.6", Verdict::Passed);
    assert_execution_order(
        &result,
        "3.6",
        &["make test", "docker-compose logs", "docker-compose down", "rm -rf .cache"],
    );

    let entry = result.entry("3.6");
    assert_eq!(entry.teardown_failures.len(), 2);
    assert_eq!(entry.records_for(Phase::AfterScript).count(), 3);
}
