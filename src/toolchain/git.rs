//! Branch detection for runs outside a CI service

use crate::toolchain::{CommandRunner, CommandSpec};
use std::path::Path;
use tracing::debug;

/// `git rev-parse --abbrev-ref HEAD` in `dir`
pub fn current_branch_command(dir: &Path) -> CommandSpec {
    CommandSpec::new("git")
        .args(["rev-parse", "--abbrev-ref", "HEAD"])
        .current_dir(dir)
}

/// The checked-out branch, or `None` when `dir` is not on a branch
///
/// A detached HEAD reports the literal `HEAD`, which names no branch.
pub async fn current_branch<R: CommandRunner + ?Sized>(runner: &R, dir: &Path) -> Option<String> {
    match runner.run(&current_branch_command(dir)).await {
        Ok(output) => output
            .last_line()
            .filter(|b| *b != "HEAD")
            .map(str::to_string),
        Err(e) => {
            debug!("No branch from git in {}: {}", dir.display(), e);
            None
        }
    }
}
