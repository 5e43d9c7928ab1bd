//! release-pipeline - CI build-and-release pipeline for conda packages
//!
//! Stages an isolated copy of a source checkout, stamps the package version,
//! builds and smoke-tests the package, runs the test suite with coverage and,
//! on the release branch, publishes the artifact. The first failing stage
//! aborts the run.

pub mod cli;
pub mod core;
pub mod execution;
pub mod persistence;
pub mod toolchain;

// Re-export commonly used types
pub use core::{
    config::PipelineConfig, ExecutionStatus, Pipeline, PipelineContext, Platform, ReleaseDecision,
    StageId, VersionString,
};
pub use execution::{ExecutionEngine, ExecutionEvent, ExecutionPlan, PipelineError, StageError};
pub use toolchain::{CommandRunner, CommandSpec, SubprocessRunner};
