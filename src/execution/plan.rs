//! Execution plan - resolves the platform and release gates once per run

use crate::core::{
    config::PipelineConfig, Gate, PipelineContext, Platform, ReleaseDecision, StageId,
};
use serde::Serialize;

/// One stage as it will (or won't) run
#[derive(Debug, Clone, Serialize)]
pub struct PlannedStage {
    pub id: StageId,
    pub position: usize,
    pub title: &'static str,
    pub gate: Gate,
    pub enabled: bool,

    /// Why the stage will do no work (set iff `enabled` is false)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

/// Branch decisions for a run, fixed before the first stage starts
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionPlan {
    pub platform: Platform,
    pub decision: ReleaseDecision,
    pub branch: String,
    pub release_branch: String,
    pub stages: Vec<PlannedStage>,
}

impl ExecutionPlan {
    pub fn resolve(context: &PipelineContext, config: &PipelineConfig) -> Self {
        let platform = context.platform();
        let release_branch = config.publish.release_branch.clone();
        let decision = ReleaseDecision::for_branch(context.branch(), &release_branch);

        let stages = StageId::ALL
            .iter()
            .map(|&id| {
                let (gate, skip_reason) = match id {
                    StageId::ReportCoverage => (
                        Gate::LinuxOnly,
                        (!platform.is_linux()).then(|| {
                            format!(
                                "coverage is only reported on linux (os: {})",
                                context.os_tag()
                            )
                        }),
                    ),
                    StageId::PublishRelease => (
                        Gate::ReleaseBranch,
                        (decision == ReleaseDecision::Skip).then(|| {
                            format!(
                                "branch '{}' is not the release branch '{}'; nothing will be published",
                                context.branch(),
                                release_branch
                            )
                        }),
                    ),
                    _ => (Gate::Always, None),
                };

                PlannedStage {
                    id,
                    position: id.position(),
                    title: id.title(),
                    gate,
                    enabled: skip_reason.is_none(),
                    skip_reason,
                }
            })
            .collect();

        Self {
            platform,
            decision,
            branch: context.branch().to_string(),
            release_branch,
            stages,
        }
    }

    pub fn stage(&self, id: StageId) -> Option<&PlannedStage> {
        self.stages.iter().find(|s| s.id == id)
    }

    pub fn is_enabled(&self, id: StageId) -> bool {
        self.stage(id).is_some_and(|s| s.enabled)
    }

    pub fn skip_reason(&self, id: StageId) -> Option<&str> {
        self.stage(id).and_then(|s| s.skip_reason.as_deref())
    }

    /// Problems that will abort the run later, visible before it starts
    pub fn warnings(&self, context: &PipelineContext, config: &PipelineConfig) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.platform.is_linux() && context.software_base().is_none() {
            warnings.push(
                "SOFTWARE_BASE is not set; the linux platform configuration cannot be sourced"
                    .to_string(),
            );
        }
        if self.decision == ReleaseDecision::Publish && context.upload_token().is_none() {
            warnings.push("release branch build without an upload token; publishing will fail".to_string());
        }
        if self.platform.is_linux()
            && context.coverage_token().is_none()
            && config.coverage.token.is_none()
        {
            warnings.push("no coverage token configured; coverage reporting will fail".to_string());
        }

        warnings
    }
}
