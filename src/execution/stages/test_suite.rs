//! Test suite with coverage measurement

use crate::core::config::TestConfig;
use crate::execution::StageError;
use crate::toolchain::services::{self, TestInvocation};
use crate::toolchain::{ActiveEnvironment, CommandRunner, Conda};
use std::path::{Path, PathBuf};
use tracing::info;

/// Data file the coverage plugin writes into the working directory
pub const COVERAGE_DATA_FILE: &str = ".coverage";

#[derive(Debug, Clone)]
pub struct TestRunner<'a> {
    pub conda: &'a Conda,
    pub environment: &'a ActiveEnvironment,
    pub test_dir: &'a Path,
    pub settings: &'a TestConfig,
}

impl TestRunner<'_> {
    /// Run the suite; returns where the coverage data ends up
    pub async fn run<R: CommandRunner + ?Sized>(&self, runner: &R) -> Result<PathBuf, StageError> {
        if !self.test_dir.is_dir() {
            return Err(StageError::MissingFile {
                what: "test directory",
                path: self.test_dir.to_path_buf(),
            });
        }

        let invocation = TestInvocation {
            test_dir: self.test_dir,
            ignore: &self.settings.ignore,
            cov_package: &self.settings.cov_package,
            extra_args: &self.settings.extra_args,
        };
        runner
            .run(&services::pytest(self.conda, self.environment, &invocation))
            .await?;

        let report = self.test_dir.join(COVERAGE_DATA_FILE);
        info!("Test suite passed; coverage data at {}", report.display());
        Ok(report)
    }
}
