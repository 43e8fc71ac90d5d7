//! Test: concurrent scheduling keeps entries isolated

use crate::helpers::*;
use ci_pipeline::core::{EntryState, ExecutionStatus, Verdict};
use ci_pipeline::execution::{EngineError, ExecutionEngine, SchedulingStrategy};

#[tokio::test]
async fn test_parallel_failure_is_local_to_its_entry() {
    let runner = ScriptedRunner::new().exit_with_on("3.6", "docker-compose build", 1);
    let result = run_pipeline_with(
        pipeline_from_yaml(REFERENCE_YAML),
        runner,
        SchedulingStrategy::Parallel,
    )
    .await;

    assert_verdict(&result, "3.6", Verdict::Failed);
    assert_verdict(&result, "3.5", Verdict::Passed);
    assert_verdict(&result, "3.7", Verdict::Passed);
    assert_execution_order(&result, "3.6", &["docker-compose build", "docker-compose down"]);
    assert_eq!(result.commands_for("3.7").len(), 9);
    assert_eq!(result.commands_for("3.5").len(), 8);
    assert_eq!(result.status, ExecutionStatus::Failed);
}

/// Entries keep declaration order in the pipeline regardless of finish order
#[tokio::test]
async fn test_limited_parallel_preserves_entry_order() {
    let result = run_pipeline_with(
        pipeline_from_yaml(REFERENCE_YAML),
        ScriptedRunner::new(),
        SchedulingStrategy::LimitedParallel(2),
    )
    .await;

    let ids: Vec<&str> = result.pipeline.entries.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["python-3.5", "python-3.6", "python-3.7"]);
    assert!(result.pipeline.is_complete());
    assert_eq!(result.pipeline.state.passed_entries, 3);

    for version in ["3.5", "3.6", "3.7"] {
        assert_teardown_ran_once(&result, version);
    }
}

/// Only the selected versions run
#[tokio::test]
async fn test_selected_versions_only() {
    let mut pipeline = pipeline_from_yaml(REFERENCE_YAML);
    pipeline.retain_versions(&["3.7".to_string()]).unwrap();

    let result =
        run_pipeline_with(pipeline, ScriptedRunner::new(), SchedulingStrategy::Parallel).await;

    assert_eq!(result.pipeline.entries.len(), 1);
    assert!(result.commands_for("3.5").is_empty());
    assert!(!result.commands_for("3.7").is_empty());
}

/// A crashed entry task must not cut its siblings short
#[tokio::test]
async fn test_crashed_entry_does_not_abort_siblings() {
    let runner = ScriptedRunner::new()
        .panic_on("3.6", "make test")
        .delay_on("3.5", "make test", 300);
    let mut pipeline = pipeline_from_yaml(REFERENCE_YAML);
    let engine = ExecutionEngine::new(runner.clone(), SchedulingStrategy::Parallel);

    let result = engine.execute(&mut pipeline).await;
    assert!(matches!(result, Err(EngineError::TaskFailed(_))));

    let result = PipelineTestResult {
        pipeline,
        status: ExecutionStatus::Failed,
        invocations: runner.invocations(),
    };
    for version in ["3.5", "3.7"] {
        assert_verdict(&result, version, Verdict::Passed);
        assert_eq!(result.count(version, "make test"), 1);
        assert_teardown_ran_once(&result, version);
    }
    assert!(matches!(result.entry("3.6").state, EntryState::Pending));
}
