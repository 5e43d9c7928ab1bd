//! Package build

use crate::core::{ArtifactLocator, VersionString};
use crate::execution::StageError;
use crate::toolchain::{ActiveEnvironment, BuildBackend, BuildRequest, CommandRunner};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone)]
pub struct PackageBuilder<'a> {
    pub backend: &'a BuildBackend,
    pub recipe: &'a Path,
    pub python: &'a str,
    pub channels: &'a [String],
    pub version: &'a VersionString,
    pub environment: &'a ActiveEnvironment,
}

impl PackageBuilder<'_> {
    fn request(&self) -> BuildRequest<'_> {
        BuildRequest {
            recipe: self.recipe,
            python: self.python,
            channels: self.channels,
            version: self.version,
            overlay: &self.environment.overlay,
        }
    }

    /// Build, then ask the backend where the artifact went and check it is there
    pub async fn run<R: CommandRunner + ?Sized>(&self, runner: &R) -> Result<ArtifactLocator, StageError> {
        if !self.recipe.join("meta.yaml").is_file() {
            return Err(StageError::InvalidRecipe(self.recipe.to_path_buf()));
        }

        let request = self.request();
        self.backend.build(runner, &request).await?;

        let file = self.backend.output_path(runner, &request).await?;
        if !file.is_file() {
            return Err(StageError::ArtifactMissing(file));
        }
        let dir = file
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| StageError::ArtifactMissing(file.clone()))?;

        info!("Built {}", file.display());
        Ok(ArtifactLocator { dir, file })
    }
}
