//! Pipeline domain model

use crate::core::{
    config::PipelineConfig,
    stage::{Gate, Stage, StageId},
    state::{ExecutionStatus, PipelineState, StageState},
    version::VersionString,
};
use crate::execution::ExecutionPlan;
use crate::toolchain::ActiveEnvironment;
use std::path::PathBuf;

/// Where the build backend put the artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLocator {
    /// Directory holding the finished artifact(s)
    pub dir: PathBuf,

    /// The artifact the backend reported for this build
    pub file: PathBuf,
}

/// Values handed forward from one stage to later ones
///
/// Each field is written by exactly one stage.
#[derive(Debug, Clone, Default)]
pub struct StageOutputs {
    /// Written by the version stamper
    pub version: Option<VersionString>,

    /// Written by the environment provisioner
    pub environment: Option<ActiveEnvironment>,

    /// Written by the package builder
    pub artifact: Option<ArtifactLocator>,

    /// Written by the test executor
    pub coverage_report: Option<PathBuf>,

    /// Written by the release publisher
    pub published: Vec<PathBuf>,
}

/// A pipeline run
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Pipeline name
    pub name: String,

    /// Stages, in execution order
    pub stages: Vec<Stage>,

    /// Execution state
    pub state: PipelineState,

    /// Values produced so far
    pub outputs: StageOutputs,
}

impl Pipeline {
    /// Create a pipeline from configuration
    pub fn from_config(config: &PipelineConfig) -> Self {
        let stages = StageId::ALL
            .iter()
            .map(|id| Stage::new(*id, gate_for(*id), true))
            .collect();

        Pipeline {
            name: config.name.clone(),
            stages,
            state: PipelineState::new(),
            outputs: StageOutputs::default(),
        }
    }

    /// Open or close each stage's gate according to a resolved plan
    pub fn apply_plan(&mut self, plan: &ExecutionPlan) {
        for stage in &mut self.stages {
            stage.enabled = plan.is_enabled(stage.id);
        }
    }

    /// Get a stage by ID
    pub fn stage(&self, id: StageId) -> Option<&Stage> {
        self.stages.iter().find(|s| s.id == id)
    }

    /// Get a mutable stage by ID
    pub fn stage_mut(&mut self, id: StageId) -> Option<&mut Stage> {
        self.stages.iter_mut().find(|s| s.id == id)
    }

    /// Stage IDs that began executing, in order
    pub fn started_stages(&self) -> Vec<StageId> {
        self.stages
            .iter()
            .filter(|s| s.state.has_started())
            .map(|s| s.id)
            .collect()
    }

    /// Check if every stage reached a terminal state
    pub fn is_complete(&self) -> bool {
        self.stages.iter().all(|s| s.state.is_terminal())
    }

    /// Check if pipeline has failed
    pub fn has_failed(&self) -> bool {
        self.state.status == ExecutionStatus::Failed
    }

    /// The stage the run aborted at, if any
    pub fn failed_stage(&self) -> Option<StageId> {
        self.stages
            .iter()
            .find(|s| matches!(s.state, StageState::Failed { .. }))
            .map(|s| s.id)
    }
}

fn gate_for(id: StageId) -> Gate {
    match id {
        StageId::ReportCoverage => Gate::LinuxOnly,
        StageId::PublishRelease => Gate::ReleaseBranch,
        _ => Gate::Always,
    }
}
