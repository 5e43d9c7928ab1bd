//! Stage and pipeline failure types

use crate::core::{StageId, VersionString};
use crate::toolchain::CommandError;
use std::path::PathBuf;
use thiserror::Error;

/// Why a stage failed
///
/// Every variant is fatal: the engine aborts the run on the first one.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("could not {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("workspace {} and source {} overlap", workspace.display(), source_root.display())]
    OverlappingWorkspace {
        workspace: PathBuf,
        source_root: PathBuf,
    },

    #[error("version declaration read back as {actual:?}, expected \"{expected}\"")]
    VersionMismatch {
        expected: VersionString,
        actual: String,
    },

    #[error("{what} not found at {}", path.display())]
    MissingFile { what: &'static str, path: PathBuf },

    #[error("{0} is not set")]
    MissingSetting(&'static str),

    #[error("environment '{0}' does not exist")]
    EnvironmentNotFound(String),

    #[error("recipe directory {} has no meta.yaml", .0.display())]
    InvalidRecipe(PathBuf),

    #[error("build backend reported {} but no such artifact was written", .0.display())]
    ArtifactMissing(PathBuf),

    #[error("required environment variable {0} is missing or empty")]
    MissingRuntimeVariable(String),

    #[error("no artifacts matching {pattern} in {}", dir.display())]
    NoArtifacts { pattern: String, dir: PathBuf },

    /// A stage ran before the stage that produces its input
    #[error("{0} has not been produced by an earlier stage")]
    MissingInput(&'static str),
}

impl StageError {
    pub fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StageError::Io {
            action,
            path: path.into(),
            source,
        }
    }
}

/// The run aborted at `stage`
#[derive(Debug, Error)]
#[error("aborted at stage {} ({}, {}): {source}", stage.position(), stage.title(), stage.error_class())]
pub struct PipelineError {
    pub stage: StageId,
    #[source]
    pub source: StageError,
}
