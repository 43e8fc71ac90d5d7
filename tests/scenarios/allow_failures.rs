//! Test: aggregate status and allowed failures

use crate::helpers::*;
use ci_pipeline::core::{ExecutionStatus, Verdict};
use ci_pipeline::execution::SchedulingStrategy;
use ci_pipeline::persistence::{create_summary, InMemoryPersistence, PersistenceBackend};

const YAML: &str = r#"
name: "nightly"
language: python
python: ["3.6", "3.7", "3.8-dev"]
allow_failures: ["3.8-dev"]
script:
  - make test
"#;

#[tokio::test]
async fn test_allowed_failure_keeps_matrix_passed() {
    let runner = ScriptedRunner::new().exit_with_on("3.8-dev", "make test", 1);
    let result =
        run_pipeline_with(pipeline_from_yaml(YAML), runner, SchedulingStrategy::Sequential).await;

    assert_verdict(&result, "3.8-dev", Verdict::Failed);
    assert_eq!(result.status, ExecutionStatus::Passed);
    assert_eq!(result.pipeline.state.failed_entries, 1);
}

#[tokio::test]
async fn test_other_failure_still_fails_matrix() {
    let runner = ScriptedRunner::new()
        .exit_with_on("3.8-dev", "make test", 1)
        .exit_with_on("3.6", "make test", 1);
    let result =
        run_pipeline_with(pipeline_from_yaml(YAML), runner, SchedulingStrategy::Sequential).await;

    assert_eq!(result.status, ExecutionStatus::Failed);
    assert_eq!(result.pipeline.state.status, ExecutionStatus::Failed);
}

/// The stored summary keeps per-entry verdicts and the allowed flag
#[tokio::test]
async fn test_summary_is_saved_to_history() {
    let runner = ScriptedRunner::new().exit_with_on("3.8-dev", "make test", 1);
    let result =
        run_pipeline_with(pipeline_from_yaml(YAML), runner, SchedulingStrategy::Sequential).await;

    let store = InMemoryPersistence::new();
    let summary = create_summary(&result.pipeline);
    store.save_execution(&summary).await.unwrap();

    let loaded = store
        .load_execution(summary.execution_id)
        .await
        .unwrap()
        .expect("execution was saved");
    assert_eq!(loaded.status, ExecutionStatus::Passed);
    assert_eq!(loaded.passed_entries(), 2);

    let dev = loaded
        .entries
        .iter()
        .find(|e| e.interpreter_version == "3.8-dev")
        .unwrap();
    assert_eq!(dev.entry_id, "python-3.8-dev");
    assert!(dev.allowed_failure);
    assert_eq!(dev.failed_commands, vec!["make test".to_string()]);
}
