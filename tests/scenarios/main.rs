//! Scenario-based tests for ci-pipeline

mod helpers;

mod allow_failures;
mod conditions;
mod parallel_matrix;
mod reference_matrix;
mod setup_failures;
mod teardown;
