//! Test: the first failing stage aborts the run

use crate::helpers::*;
use release_pipeline::core::config::PipelineConfig;
use release_pipeline::core::{StageId, StageState};
use release_pipeline::execution::{ExecutionEvent, StageError};
use release_pipeline::toolchain::CommandError;

/// The platform script does not export FERMI_DIR: abort at the smoke test
#[tokio::test]
async fn test_missing_runtime_variable_aborts_before_tests() {
    let fx = Fixture::new();
    let context = fx.context(fx.env("master", "linux", 42));
    let runner = fx.fresh_runner().with_env("test_env");

    let result = run_pipeline(runner, PipelineConfig::default(), context).await;

    assert_aborted_at(&result, StageId::SmokeTest);
    assert!(matches!(
        &result.error().source,
        StageError::MissingRuntimeVariable(name) if name == "FERMI_DIR"
    ));
    assert_eq!(
        result.error().to_string(),
        "aborted at stage 5 (Installer & Smoke Test, installation error): \
         required environment variable FERMI_DIR is missing or empty"
    );

    let runner = &result.runner;
    assert_eq!(runner.count(&["-m", "pytest"]), 0);
    assert_eq!(runner.count(&["codecov", "-t"]), 0);
    assert_eq!(runner.count(&["anaconda", "-t"]), 0);
}

/// A failing command in any stage stops everything after it
#[tokio::test]
async fn test_command_failure_in_each_stage() {
    let cases: &[(&[&str], StageId)] = &[
        (&["-c", "import version; print(version.__version__)"], StageId::StampVersion),
        (&["config", "--set", "always_yes", "true"], StageId::ProvisionEnvironment),
        (&["build", "--python"], StageId::BuildPackage),
        (&["--use-local"], StageId::SmokeTest),
        (&["-m", "pytest"], StageId::RunTests),
        (&["codecov", "-t"], StageId::ReportCoverage),
        (&["anaconda", "-t"], StageId::PublishRelease),
    ];

    for (needle, stage) in cases {
        let fx = Fixture::new();
        let context = fx.context(fx.env("master", "linux", 42));
        let runner = fx.linux_runner().fail_on(needle, 3);

        let result = run_pipeline(runner, PipelineConfig::default(), context).await;

        assert_aborted_at(&result, *stage);
        match &result.error().source {
            StageError::Command(CommandError::Failed { code, .. }) => assert_eq!(*code, 3),
            other => panic!("stage {} failed with unexpected error: {}", stage, other),
        }

        for earlier in StageId::ALL.iter().filter(|id| **id < *stage) {
            assert_stage_completed(&result, *earlier);
        }

        let failures = result
            .events
            .iter()
            .filter(|e| matches!(e, ExecutionEvent::StageFailed { .. }))
            .count();
        assert_eq!(failures, 1);
    }
}

/// No publishing after a failed test suite, even on the release branch
#[tokio::test]
async fn test_failed_tests_never_publish() {
    let fx = Fixture::new();
    let context = fx.context(fx.env("master", "linux", 42));
    let runner = fx.linux_runner().fail_on(&["-m", "pytest"], 1);

    let result = run_pipeline(runner, PipelineConfig::default(), context).await;

    assert_aborted_at(&result, StageId::RunTests);
    assert_eq!(result.runner.count(&["anaconda-client"]), 0);
    assert_eq!(result.runner.count(&["anaconda", "-t"]), 0);
    assert!(result.pipeline.outputs.published.is_empty());
}

/// The release branch without an upload token fails at publishing, after everything else passed
#[tokio::test]
async fn test_missing_upload_token() {
    let fx = Fixture::new();
    let mut env = fx.env("master", "linux", 42);
    env.remove("UPLOAD_TOKEN");
    let context = fx.context(env);

    let result = run_pipeline(fx.linux_runner(), PipelineConfig::default(), context).await;

    assert_aborted_at(&result, StageId::PublishRelease);
    assert!(matches!(result.error().source, StageError::MissingSetting("UPLOAD_TOKEN")));
    assert_stage_completed(&result, StageId::ReportCoverage);
    assert_eq!(result.runner.count(&["anaconda", "-t"]), 0);
}

/// A build that reports an artifact it never wrote is a build failure
#[tokio::test]
async fn test_missing_artifact() {
    let fx = Fixture::new();
    let context = fx.context(fx.env("master", "linux", 42));
    let runner = fx.linux_runner().without_artifact();

    let result = run_pipeline(runner, PipelineConfig::default(), context).await;

    assert_aborted_at(&result, StageId::BuildPackage);
    assert!(matches!(result.error().source, StageError::ArtifactMissing(_)));
    assert_eq!(result.runner.count(&["--use-local"]), 0);
}

/// A recipe directory without meta.yaml never reaches the build backend
#[tokio::test]
async fn test_invalid_recipe() {
    let fx = Fixture::new();
    std::fs::remove_file(fx.source.join("conda-dist/recipe/meta.yaml")).unwrap();
    let context = fx.context(fx.env("master", "linux", 42));

    let result = run_pipeline(fx.linux_runner(), PipelineConfig::default(), context).await;

    assert_aborted_at(&result, StageId::BuildPackage);
    assert!(matches!(result.error().source, StageError::InvalidRecipe(_)));
    assert_eq!(result.runner.count(&["build", "--python"]), 0);
}

/// The pre-provisioned environment is missing from the Linux builder
#[tokio::test]
async fn test_environment_not_found() {
    let fx = Fixture::new();
    let context = fx.context(fx.env("master", "linux", 42));
    let runner = fx.fresh_runner().with_sourced_var("FERMI_DIR", "/sw/fermi");

    let result = run_pipeline(runner, PipelineConfig::default(), context).await;

    assert_aborted_at(&result, StageId::ProvisionEnvironment);
    assert!(matches!(
        &result.error().source,
        StageError::EnvironmentNotFound(name) if name == "test_env"
    ));
}

/// Linux without SOFTWARE_BASE cannot source the platform configuration
#[tokio::test]
async fn test_missing_software_base() {
    let fx = Fixture::new();
    let mut env = fx.env("feature-x", "linux", 42);
    env.remove("SOFTWARE_BASE");
    let context = fx.context(env);

    let result = run_pipeline(fx.linux_runner(), PipelineConfig::default(), context).await;

    assert_aborted_at(&result, StageId::ProvisionEnvironment);
    assert!(matches!(result.error().source, StageError::MissingSetting("SOFTWARE_BASE")));
    assert_eq!(result.runner.count(&["env", "list", "--json"]), 0);
}

/// The failed stage records the error text
#[tokio::test]
async fn test_failed_stage_records_error() {
    let fx = Fixture::new();
    let context = fx.context(fx.env("master", "linux", 42));
    let runner = fx.linux_runner().fail_on(&["codecov", "-t"], 2);

    let result = run_pipeline(runner, PipelineConfig::default(), context).await;

    match result.state(StageId::ReportCoverage) {
        StageState::Failed { error, .. } => {
            assert!(error.contains("exited with code 2"), "{}", error);
            assert!(!error.contains("cov-s3cr3t"), "{}", error);
        }
        other => panic!("coverage stage should have failed, state is {:?}", other),
    }
}
