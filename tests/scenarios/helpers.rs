//! Test utility functions for release-pipeline scenarios

use crate::mock_runner::MockRunner;
use release_pipeline::core::config::PipelineConfig;
use release_pipeline::core::{
    ContextDefaults, ExecutionStatus, Pipeline, PipelineContext, StageId, StageState,
};
use release_pipeline::execution::{ExecutionEngine, ExecutionEvent, PipelineError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// A source checkout, a software base and a conda root, all inside one temp dir
pub struct Fixture {
    _dir: TempDir,
    pub source: PathBuf,
    pub workspace: PathBuf,
    pub software_base: PathBuf,
    pub conda_root: PathBuf,
    pub build_dir: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_path_buf();

        let source = root.join("threeML-src");
        write(&source.join("setup.py"), "from setuptools import setup\n");
        write(&source.join(".travis.yml"), "language: generic\n");
        write(&source.join("threeML/__init__.py"), "");
        write(&source.join("threeML/test/test_fit.py"), "def test_fit():\n    pass\n");
        write(&source.join("conda-dist/recipe/meta.yaml"), "package:\n  name: threeml\n");

        let software_base = root.join("software");
        write(
            &software_base.join("config_threeML.sh"),
            "export FERMI_DIR=/sw/fermi\n",
        );

        let conda_root = root.join("conda");
        let build_dir = conda_root.join("conda-bld/linux-64");

        Self {
            source,
            workspace: root.join("ci_workspace"),
            software_base,
            conda_root,
            build_dir,
            _dir: dir,
        }
    }

    /// CI variables for a build of `branch` on `os`
    pub fn env(&self, branch: &str, os: &str, build: u64) -> HashMap<String, String> {
        [
            ("BUILD_NUMBER", build.to_string()),
            ("BRANCH", branch.to_string()),
            ("OS_NAME", os.to_string()),
            ("SOFTWARE_BASE", self.software_base.display().to_string()),
            ("UPLOAD_TOKEN", "upload-s3cr3t".to_string()),
            ("COVERAGE_TOKEN", "cov-s3cr3t".to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }

    pub fn context(&self, env: HashMap<String, String>) -> PipelineContext {
        PipelineContext::from_env_map(
            env,
            ContextDefaults {
                source_root: Some(self.source.clone()),
                workspace_root: Some(self.workspace.clone()),
                python_version: "2.7".to_string(),
                detected_branch: None,
                working_dir: self.source.clone(),
                home_dir: None,
            },
        )
        .unwrap()
    }

    /// Runner for a Linux builder whose platform script exports FERMI_DIR
    pub fn linux_runner(&self) -> MockRunner {
        MockRunner::new(&self.conda_root, &self.build_dir)
            .with_env("test_env")
            .with_sourced_var("FERMI_DIR", "/sw/fermi")
    }

    /// Runner for a builder that starts without any environment
    pub fn fresh_runner(&self) -> MockRunner {
        MockRunner::new(&self.conda_root, &self.build_dir)
    }

    pub fn workspace_file(&self, relative: &str) -> PathBuf {
        self.workspace.join(relative)
    }
}

pub fn write(path: &Path, contents: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

/// Outcome of one scenario run
pub struct RunResult {
    pub pipeline: Pipeline,
    pub result: Result<(), PipelineError>,
    pub events: Vec<ExecutionEvent>,
    pub runner: Arc<MockRunner>,
}

impl RunResult {
    pub fn state(&self, id: StageId) -> &StageState {
        &self.pipeline.stage(id).unwrap().state
    }

    pub fn error(&self) -> &PipelineError {
        self.result.as_ref().unwrap_err()
    }
}

pub async fn run_pipeline(
    runner: MockRunner,
    config: PipelineConfig,
    context: PipelineContext,
) -> RunResult {
    let runner = Arc::new(runner);
    let mut pipeline = config.to_pipeline();
    let engine = ExecutionEngine::new(runner.clone(), config, context);

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    engine
        .add_event_handler(move |event| sink.lock().unwrap().push(event))
        .await;

    let result = engine.execute(&mut pipeline).await;
    let events = events.lock().unwrap().clone();

    RunResult {
        pipeline,
        result,
        events,
        runner,
    }
}

/// Assert the run finished with every stage terminal and none failed
pub fn assert_pipeline_completed(result: &RunResult) {
    if let Err(e) = &result.result {
        panic!("Pipeline should have completed, but failed: {}", e);
    }
    assert_eq!(result.pipeline.state.status, ExecutionStatus::Completed);
    assert!(result.pipeline.is_complete());
    assert_eq!(result.pipeline.failed_stage(), None);
}

/// Assert the run aborted at `stage` and nothing after it started
pub fn assert_aborted_at(result: &RunResult, stage: StageId) {
    let err = result.error();
    assert_eq!(err.stage, stage, "aborted at the wrong stage: {}", err);
    assert_eq!(result.pipeline.state.status, ExecutionStatus::Failed);
    assert_eq!(result.pipeline.state.failed_stage, Some(stage));
    assert!(matches!(result.state(stage), StageState::Failed { .. }));

    for later in StageId::ALL.iter().filter(|id| **id > stage) {
        assert!(
            matches!(result.state(*later), StageState::Pending),
            "stage {} should not have run, state is {:?}",
            later,
            result.state(*later)
        );
    }
}

pub fn assert_stage_completed(result: &RunResult, stage: StageId) {
    assert!(
        matches!(result.state(stage), StageState::Completed { .. }),
        "stage {} should have completed, state is {:?}",
        stage,
        result.state(stage)
    );
}

pub fn assert_stage_skipped(result: &RunResult, stage: StageId) {
    assert!(
        matches!(result.state(stage), StageState::Skipped { .. }),
        "stage {} should have been skipped, state is {:?}",
        stage,
        result.state(stage)
    );
}

/// Assert the commands matching each needle were issued in the given order
pub fn assert_command_order(runner: &MockRunner, needles: &[&[&str]]) {
    let positions: Vec<usize> = needles
        .iter()
        .map(|needle| {
            runner
                .position(needle)
                .unwrap_or_else(|| panic!("no command matching {:?}", needle))
        })
        .collect();

    for pair in positions.windows(2) {
        assert!(
            pair[0] < pair[1],
            "commands out of order: {:?} at {:?}",
            needles,
            positions
        );
    }
}
