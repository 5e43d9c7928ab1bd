//! Stage domain model

use crate::core::state::StageState;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The eight pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    StageWorkspace,
    StampVersion,
    ProvisionEnvironment,
    BuildPackage,
    SmokeTest,
    RunTests,
    ReportCoverage,
    PublishRelease,
}

impl StageId {
    pub const ALL: [StageId; 8] = [
        StageId::StageWorkspace,
        StageId::StampVersion,
        StageId::ProvisionEnvironment,
        StageId::BuildPackage,
        StageId::SmokeTest,
        StageId::RunTests,
        StageId::ReportCoverage,
        StageId::PublishRelease,
    ];

    /// 1-based position in the pipeline
    pub fn position(self) -> usize {
        Self::ALL
            .iter()
            .position(|s| *s == self)
            .map(|i| i + 1)
            .unwrap_or(0)
    }

    /// Stable identifier used in logs and history
    pub fn as_str(self) -> &'static str {
        match self {
            StageId::StageWorkspace => "stage_workspace",
            StageId::StampVersion => "stamp_version",
            StageId::ProvisionEnvironment => "provision_environment",
            StageId::BuildPackage => "build_package",
            StageId::SmokeTest => "smoke_test",
            StageId::RunTests => "run_tests",
            StageId::ReportCoverage => "report_coverage",
            StageId::PublishRelease => "publish_release",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|id| id.as_str() == s)
    }

    /// Human-readable stage title
    pub fn title(self) -> &'static str {
        match self {
            StageId::StageWorkspace => "Workspace Stager",
            StageId::StampVersion => "Version Stamper",
            StageId::ProvisionEnvironment => "Environment Provisioner",
            StageId::BuildPackage => "Package Builder",
            StageId::SmokeTest => "Installer & Smoke Test",
            StageId::RunTests => "Test Executor",
            StageId::ReportCoverage => "Coverage Reporter",
            StageId::PublishRelease => "Release Publisher",
        }
    }

    /// Error class a failure in this stage belongs to
    pub fn error_class(self) -> &'static str {
        match self {
            StageId::StageWorkspace => "staging error",
            StageId::StampVersion => "version error",
            StageId::ProvisionEnvironment => "provisioning error",
            StageId::BuildPackage => "build error",
            StageId::SmokeTest => "installation error",
            StageId::RunTests => "test error",
            StageId::ReportCoverage => "reporting error",
            StageId::PublishRelease => "publish error",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Condition under which a stage does its work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Gate {
    /// Always runs
    Always,
    /// Runs on Linux, skipped elsewhere
    LinuxOnly,
    /// Runs on the release branch, skipped elsewhere
    ReleaseBranch,
}

/// A single stage in a pipeline run
#[derive(Debug, Clone)]
pub struct Stage {
    pub id: StageId,

    /// Gate attached to this stage
    pub gate: Gate,

    /// Whether the gate is open for this run
    pub enabled: bool,

    /// Runtime state
    pub state: StageState,
}

impl Stage {
    pub fn new(id: StageId, gate: Gate, enabled: bool) -> Self {
        Self {
            id,
            gate,
            enabled,
            state: StageState::Pending,
        }
    }

    pub fn position(&self) -> usize {
        self.id.position()
    }
}
