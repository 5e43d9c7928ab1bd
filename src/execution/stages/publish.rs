//! Release publishing

use crate::core::Secret;
use crate::execution::StageError;
use crate::toolchain::{services, ActiveEnvironment, CommandRunner, Conda, InstallRequest};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const ARCHIVE_SUFFIX: &str = ".tar.bz2";

/// `<package>-*.tar.bz2`, with the package name taken literally
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPattern {
    prefix: String,
}

impl ArtifactPattern {
    pub fn new(package: &str) -> Self {
        Self {
            prefix: format!("{}-", package),
        }
    }

    pub fn is_match(&self, file_name: &str) -> bool {
        file_name.len() >= self.prefix.len() + ARCHIVE_SUFFIX.len()
            && file_name.starts_with(&self.prefix)
            && file_name.ends_with(ARCHIVE_SUFFIX)
    }
}

impl std::fmt::Display for ArtifactPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}*{}", self.prefix, ARCHIVE_SUFFIX)
    }
}

/// Files in `dir` matching `pattern`, sorted by name
pub fn matching_artifacts(dir: &Path, pattern: &ArtifactPattern) -> Result<Vec<PathBuf>, StageError> {
    let entries = fs::read_dir(dir).map_err(|e| StageError::io("list artifacts in", dir, e))?;

    let mut found = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| StageError::io("list artifacts in", dir, e))?;
        let path = entry.path();
        let matches = entry
            .file_name()
            .to_str()
            .is_some_and(|name| pattern.is_match(name));
        if matches && path.is_file() {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}

#[derive(Debug, Clone)]
pub struct ReleasePublisher<'a> {
    pub conda: &'a Conda,
    pub environment: &'a ActiveEnvironment,
    pub token: Option<&'a Secret>,
    pub user: &'a str,
    pub client_package: &'a str,
    pub package: &'a str,
    pub artifact_dir: &'a Path,
}

impl ReleasePublisher<'_> {
    /// Upload every matching artifact, replacing existing uploads of the same name
    pub async fn run<R: CommandRunner + ?Sized>(&self, runner: &R) -> Result<Vec<PathBuf>, StageError> {
        let token = self.token.ok_or(StageError::MissingSetting("UPLOAD_TOKEN"))?;

        let pattern = ArtifactPattern::new(self.package);
        let artifacts = matching_artifacts(self.artifact_dir, &pattern)?;
        if artifacts.is_empty() {
            return Err(StageError::NoArtifacts {
                pattern: pattern.to_string(),
                dir: self.artifact_dir.to_path_buf(),
            });
        }

        runner
            .run(&self.conda.install(
                self.environment,
                &InstallRequest::new([self.client_package]),
            ))
            .await?;

        for artifact in &artifacts {
            runner
                .run(&services::anaconda_upload(
                    self.conda,
                    self.environment,
                    token,
                    self.user,
                    artifact,
                ))
                .await?;
            info!("Published {}", artifact.display());
        }

        Ok(artifacts)
    }
}
