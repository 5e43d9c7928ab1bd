//! Coverage upload

use crate::core::Secret;
use crate::execution::StageError;
use crate::toolchain::{services, ActiveEnvironment, CommandRunner, Conda};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone)]
pub struct CoverageReporter<'a> {
    pub conda: &'a Conda,
    pub environment: &'a ActiveEnvironment,
    pub report: &'a Path,
    pub token: Option<Secret>,
}

impl CoverageReporter<'_> {
    pub async fn run<R: CommandRunner + ?Sized>(&self, runner: &R) -> Result<(), StageError> {
        let token = self
            .token
            .as_ref()
            .ok_or(StageError::MissingSetting("coverage token"))?;

        runner
            .run(&services::codecov_upload(self.conda, self.environment, token, self.report))
            .await?;
        info!("Uploaded coverage from {}", self.report.display());
        Ok(())
    }
}
