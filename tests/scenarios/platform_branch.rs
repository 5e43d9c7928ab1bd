//! Test: Linux and non-Linux builders take mutually exclusive paths

use crate::helpers::*;
use release_pipeline::core::config::PipelineConfig;
use release_pipeline::core::StageId;

/// Linux reuses the pre-provisioned environment and sources the platform script
#[tokio::test]
async fn test_linux_uses_provisioned_environment() {
    let fx = Fixture::new();
    let context = fx.context(fx.env("feature-x", "linux", 42));

    let result = run_pipeline(fx.linux_runner(), PipelineConfig::default(), context).await;
    assert_pipeline_completed(&result);

    let runner = &result.runner;
    assert_eq!(runner.count(&["create", "--yes"]), 0);

    let sourced: Vec<_> = runner
        .calls()
        .into_iter()
        .filter(|c| c.program == "bash")
        .collect();
    assert_eq!(sourced.len(), 1);
    let script = fx.software_base.join("config_threeML.sh");
    assert_eq!(sourced[0].args.last().map(String::as_str), script.to_str());

    let tools = runner.calls_with(&["--no-update-deps"]);
    assert_eq!(tools.len(), 1);
    assert!(tools[0].has_args(&["pytest", "pytest-cov", "coverage", "git"]));

    let rebuild = runner.calls_with(&["pip", "install", "--no-binary", ":all:"]);
    assert_eq!(rebuild.len(), 1);
    assert!(rebuild[0].env.contains_key("LDFLAGS"));

    // The sourced variables travel with every later command in the environment
    let pytest = &runner.calls_with(&["-m", "pytest"])[0];
    assert_eq!(pytest.env.get("FERMI_DIR").map(String::as_str), Some("/sw/fermi"));
}

/// Other platforms create the environment, never source anything and skip coverage upload
#[tokio::test]
async fn test_other_platform_creates_environment() {
    let fx = Fixture::new();
    let mut env = fx.env("feature-x", "osx", 42);
    env.insert("FERMI_DIR".to_string(), "/Users/ci/fermi".to_string());
    let context = fx.context(env);

    let result = run_pipeline(fx.fresh_runner(), PipelineConfig::default(), context).await;
    assert_pipeline_completed(&result);

    let runner = &result.runner;
    let created = runner.calls_with(&["create", "--yes", "--name", "test_env"]);
    assert_eq!(created.len(), 1);
    assert!(created[0].has_args(&["-c", "threeml", "python=2.7", "numpy<1.15"]));

    assert!(runner.calls().iter().all(|c| c.program != "bash"));
    assert_eq!(runner.count(&["--no-update-deps"]), 0);
    assert_eq!(runner.count(&["pip", "install"]), 0);
    assert_eq!(runner.count(&["codecov", "-t"]), 0);

    assert_stage_completed(&result, StageId::RunTests);
    assert_stage_skipped(&result, StageId::ReportCoverage);
    assert_stage_skipped(&result, StageId::PublishRelease);
}

/// The interpreter version from the environment reaches both create and build
#[tokio::test]
async fn test_python_version_from_environment() {
    let fx = Fixture::new();
    let mut env = fx.env("feature-x", "osx", 42);
    env.insert("PYTHON_VERSION".to_string(), "3.6".to_string());
    env.insert("FERMI_DIR".to_string(), "/Users/ci/fermi".to_string());
    let context = fx.context(env);

    let result = run_pipeline(fx.fresh_runner(), PipelineConfig::default(), context).await;
    assert_pipeline_completed(&result);

    assert_eq!(result.runner.count(&["python=3.6"]), 1);
    assert_eq!(result.runner.count(&["build", "--python", "3.6"]), 2);
}

/// A release build on a non-Linux builder publishes without uploading coverage
#[tokio::test]
async fn test_other_platform_release_publishes() {
    let fx = Fixture::new();
    let mut env = fx.env("master", "osx", 9);
    env.insert("FERMI_DIR".to_string(), "/Users/ci/fermi".to_string());
    let context = fx.context(env);

    let result = run_pipeline(fx.fresh_runner(), PipelineConfig::default(), context).await;
    assert_pipeline_completed(&result);

    assert_stage_skipped(&result, StageId::ReportCoverage);
    assert_stage_completed(&result, StageId::PublishRelease);
    assert_eq!(result.runner.count(&["anaconda", "-t"]), 1);
}
