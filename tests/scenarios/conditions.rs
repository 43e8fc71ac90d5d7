//! Test: `if:` conditions on versions and environment

use crate::helpers::*;
use ci_pipeline::core::Verdict;
use ci_pipeline::execution::SchedulingStrategy;

const YAML: &str = r#"
name: "conditions"
python: ["3.5", "3.6", "3.7"]
env:
  DATABASE: postgres
script:
  - run: make lint-black
    if: version != "3.5"
  - run: make coverage
    if: version =~ /^3\.[67]$/ && $DATABASE == postgres
  - run: make deploy
    if: ${DEPLOY} == yes
  - run: make broken
    if: version == "3.5"
  - make test
"#;

#[tokio::test]
async fn test_conditions_select_commands_per_entry() {
    let runner = ScriptedRunner::new().exit_with("make broken", 1);
    let result =
        run_pipeline_with(pipeline_from_yaml(YAML), runner, SchedulingStrategy::Sequential).await;

    assert_execution_order(&result, "3.5", &["make broken", "make test"]);
    assert_execution_order(&result, "3.6", &["make lint-black", "make coverage", "make test"]);
    assert_execution_order(&result, "3.7", &["make lint-black", "make coverage", "make test"]);

    // A failing command that is skipped cannot fail the entry
    assert_verdict(&result, "3.5", Verdict::Failed);
    assert_verdict(&result, "3.6", Verdict::Passed);
}

#[tokio::test]
async fn test_environment_override_enables_command() {
    let mut pipeline = pipeline_from_yaml(YAML);
    pipeline.set_env("DEPLOY", "yes");
    pipeline.set_env("DATABASE", "mysql");

    let result =
        run_pipeline_with(pipeline, ScriptedRunner::new(), SchedulingStrategy::Sequential).await;

    assert_execution_order(&result, "3.7", &["make lint-black", "make deploy", "make test"]);
}

#[tokio::test]
async fn test_plan_matches_execution() {
    let pipeline = pipeline_from_yaml(YAML);
    let plans = pipeline.plan();

    let result =
        run_pipeline_with(pipeline, ScriptedRunner::new(), SchedulingStrategy::Sequential).await;

    for plan in plans {
        let planned: Vec<String> = plan
            .commands
            .iter()
            .filter(|c| c.will_run)
            .map(|c| c.command.clone())
            .collect();
        assert_eq!(result.commands_for(&plan.interpreter_version), planned);
    }
}
