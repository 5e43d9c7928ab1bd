//! Test: full release builds on the Linux builder

use crate::helpers::*;
use release_pipeline::core::config::PipelineConfig;
use release_pipeline::core::{StageId, VersionString};
use release_pipeline::execution::ExecutionEvent;

/// Release branch on Linux: every stage runs and exactly one artifact is published
#[tokio::test]
async fn test_release_build_publishes_once() {
    let fx = Fixture::new();
    let context = fx.context(fx.env("master", "linux", 42));

    let result = run_pipeline(fx.linux_runner(), PipelineConfig::default(), context).await;

    assert_pipeline_completed(&result);
    for id in StageId::ALL {
        assert_stage_completed(&result, id);
    }

    let declaration = std::fs::read_to_string(fx.workspace_file("threeML/version.py")).unwrap();
    assert_eq!(declaration, "__version__ = '1.2.42'\n");
    assert_eq!(result.pipeline.outputs.version, Some(VersionString::new(1, 2, 42)));

    let runner = &result.runner;
    let uploads = runner.calls_with(&["anaconda", "-t"]);
    assert_eq!(uploads.len(), 1);
    let artifact = runner.artifact_path("1.2.42");
    let artifact_arg = artifact.display().to_string();
    assert!(uploads[0].has_args(&["upload", "-u", "threeml", artifact_arg.as_str(), "--force"]));
    assert_eq!(result.pipeline.outputs.published, vec![artifact]);

    assert_eq!(runner.count(&["codecov", "-t"]), 1);
    assert_eq!(runner.count(&["anaconda-client"]), 1);
}

/// The stages reach the toolchain in pipeline order
#[tokio::test]
async fn test_commands_follow_stage_order() {
    let fx = Fixture::new();
    let context = fx.context(fx.env("master", "linux", 7));

    let result = run_pipeline(fx.linux_runner(), PipelineConfig::default(), context).await;
    assert_pipeline_completed(&result);

    assert_command_order(
        &result.runner,
        &[
            &["-c", "import version; print(version.__version__)"],
            &["config", "--set", "always_yes", "true"],
            &["config", "--set", "anaconda_upload", "no"],
            &["config", "--add", "channels", "threeml"],
            &["env", "list", "--json"],
            &["build", "--python", "2.7"],
            &["install", "--yes", "-n", "test_env", "--use-local"],
            &["-c", "import threeML.plugins.FermiLATLike"],
            &["-m", "pytest", "-vv"],
            &["codecov", "-t"],
            &["anaconda-client"],
            &["anaconda", "-t"],
        ],
    );
}

/// Build and install agree on the version that was stamped
#[tokio::test]
async fn test_build_and_install_use_stamped_version() {
    let fx = Fixture::new();
    let context = fx.context(fx.env("master", "linux", 42));

    let result = run_pipeline(fx.linux_runner(), PipelineConfig::default(), context).await;
    assert_pipeline_completed(&result);

    let builds = result.runner.calls_with(&["build", "--python", "2.7"]);
    assert_eq!(builds.len(), 2, "one build plus one output-path query");
    for build in &builds {
        assert_eq!(build.env.get("PKG_VERSION").map(String::as_str), Some("1.2.42"));
        assert!(build.has_args(&["-c", "conda-forge", "-c", "threeml"]));
        assert_eq!(build.env.get("FERMI_DIR").map(String::as_str), Some("/sw/fermi"));
    }

    assert_eq!(result.runner.count(&["threeml=1.2.42", "xspec-modelsonly-lite"]), 1);
}

/// Secrets reach the tools but never the command line shown in logs
#[tokio::test]
async fn test_tokens_redacted_in_display() {
    let fx = Fixture::new();
    let context = fx.context(fx.env("master", "linux", 42));

    let result = run_pipeline(fx.linux_runner(), PipelineConfig::default(), context).await;
    assert_pipeline_completed(&result);

    let upload = &result.runner.calls_with(&["anaconda", "-t"])[0];
    assert!(upload.has_args(&["-t", "upload-s3cr3t"]));
    assert!(!upload.display().contains("upload-s3cr3t"));

    let codecov = &result.runner.calls_with(&["codecov", "-t"])[0];
    assert!(codecov.has_args(&["-t", "cov-s3cr3t"]));
    assert!(!codecov.display().contains("cov-s3cr3t"));
}

/// Events mirror the stage transitions
#[tokio::test]
async fn test_events_for_successful_run() {
    let fx = Fixture::new();
    let context = fx.context(fx.env("feature-x", "linux", 3));

    let result = run_pipeline(fx.linux_runner(), PipelineConfig::default(), context).await;
    assert_pipeline_completed(&result);

    assert!(matches!(result.events.first(), Some(ExecutionEvent::PipelineStarted { .. })));
    assert!(matches!(result.events.last(), Some(ExecutionEvent::PipelineCompleted { .. })));

    let completed = result
        .events
        .iter()
        .filter(|e| matches!(e, ExecutionEvent::StageCompleted { .. }))
        .count();
    let skipped: Vec<StageId> = result
        .events
        .iter()
        .filter_map(|e| match e {
            ExecutionEvent::StageSkipped { stage, .. } => Some(*stage),
            _ => None,
        })
        .collect();
    assert_eq!(completed, 7);
    assert_eq!(skipped, vec![StageId::PublishRelease]);
    assert_eq!(result.pipeline.state.finished_stages, 8);
    assert_eq!(result.pipeline.state.progress(), 1.0);
}
