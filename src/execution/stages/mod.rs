//! The eight pipeline stages
//!
//! Each stage borrows exactly the inputs it reads and returns its product;
//! none of them sees the whole context or the other stages' state.

pub mod build;
pub mod coverage;
pub mod install;
pub mod provision;
pub mod publish;
pub mod test_suite;
pub mod version;
pub mod workspace;

pub use build::PackageBuilder;
pub use coverage::CoverageReporter;
pub use install::SmokeTester;
pub use provision::EnvironmentProvisioner;
pub use publish::{matching_artifacts, ArtifactPattern, ReleasePublisher};
pub use test_suite::{TestRunner, COVERAGE_DATA_FILE};
pub use version::{VersionStamper, VERSION_FILE};
pub use workspace::stage_workspace;
