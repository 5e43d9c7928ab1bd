//! Test: the stamped version must read back exactly

use crate::helpers::*;
use release_pipeline::core::config::PipelineConfig;
use release_pipeline::core::StageId;
use release_pipeline::execution::StageError;

/// A read-back that disagrees aborts before any environment or build work
#[tokio::test]
async fn test_version_mismatch_aborts_before_build() {
    let fx = Fixture::new();
    let context = fx.context(fx.env("master", "linux", 42));
    let runner = fx.linux_runner().with_version_reply("1.2.41\n");

    let result = run_pipeline(runner, PipelineConfig::default(), context).await;

    assert_aborted_at(&result, StageId::StampVersion);
    match &result.error().source {
        StageError::VersionMismatch { expected, actual } => {
            assert_eq!(expected.to_string(), "1.2.42");
            assert_eq!(actual, "1.2.41");
        }
        other => panic!("unexpected error: {}", other),
    }

    let runner = &result.runner;
    assert_eq!(runner.count(&["config", "--set"]), 0);
    assert_eq!(runner.count(&["build", "--python"]), 0);
    assert_eq!(result.pipeline.outputs.version, None);
}

/// Surrounding whitespace beyond a single line terminator is a mismatch
#[tokio::test]
async fn test_version_read_back_is_exact() {
    for reply in [" 1.2.42\n", "1.2.42 \n", "1.2.42\n\n", "v1.2.42\n"] {
        let fx = Fixture::new();
        let context = fx.context(fx.env("master", "linux", 42));
        let runner = fx.linux_runner().with_version_reply(reply);

        let result = run_pipeline(runner, PipelineConfig::default(), context).await;

        assert_aborted_at(&result, StageId::StampVersion);
        assert!(
            matches!(result.error().source, StageError::VersionMismatch { .. }),
            "reply {:?}",
            reply
        );
    }
}

/// A Windows line terminator is accepted
#[tokio::test]
async fn test_crlf_read_back_accepted() {
    let fx = Fixture::new();
    let context = fx.context(fx.env("feature-x", "linux", 42));
    let runner = fx.linux_runner().with_version_reply("1.2.42\r\n");

    let result = run_pipeline(runner, PipelineConfig::default(), context).await;
    assert_pipeline_completed(&result);
}

/// The base version comes from configuration, the patch from the build number
#[tokio::test]
async fn test_configured_base_version() {
    let config = PipelineConfig::from_yaml(
        r#"
project:
  base_version: "2.0"
"#,
    )
    .unwrap();

    let fx = Fixture::new();
    let context = fx.context(fx.env("master", "linux", 0));
    let result = run_pipeline(fx.linux_runner(), config, context).await;
    assert_pipeline_completed(&result);

    let declaration = std::fs::read_to_string(fx.workspace_file("threeML/version.py")).unwrap();
    assert_eq!(declaration, "__version__ = '2.0.0'\n");
    assert_eq!(result.runner.count(&["threeml=2.0.0", "xspec-modelsonly-lite"]), 1);

    let upload = &result.runner.calls_with(&["anaconda", "-t"])[0];
    let expected = result.runner.artifact_path("2.0.0");
    assert_eq!(upload.args.iter().rev().nth(1).map(String::as_str), expected.to_str());
}
