//! External tool plumbing: the package manager, build backend, test runner and upload clients
//!
//! Everything the pipeline delegates to is an external command. Commands are
//! described as [`CommandSpec`] values and executed through a [`CommandRunner`],
//! so the orchestration can be exercised without any of the real tools present.

pub mod command;
pub mod conda;
pub mod error;
pub mod git;
pub mod services;
pub mod shell;
pub mod subprocess;

use async_trait::async_trait;
use std::sync::Arc;

pub use command::{CommandOutput, CommandSpec};
pub use conda::{ActiveEnvironment, BuildBackend, BuildRequest, Conda, InstallRequest};
pub use error::CommandError;
pub use subprocess::SubprocessRunner;

/// Trait for command execution - allows for different implementations
///
/// A call blocks (asynchronously) until the command reaches a terminal status.
/// Non-zero exit is reported as [`CommandError::Failed`]; callers never see a
/// "successful" output from a failed command.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError>;
}

#[async_trait]
impl<R: CommandRunner + ?Sized> CommandRunner for Arc<R> {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        (**self).run(spec).await
    }
}
