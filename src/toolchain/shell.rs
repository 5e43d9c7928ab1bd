//! Sourcing shell configuration scripts
//!
//! A child process cannot change the pipeline's own environment, so "sourcing"
//! a platform script means running it in a shell, dumping the environment that
//! results, and carrying the difference forward as an overlay.

use crate::toolchain::{CommandError, CommandRunner, CommandSpec};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// `bash -c 'source "$1" 1>&2 && env -0' <name> <script>`
///
/// Whatever the script prints goes to stderr so stdout carries only the
/// NUL-separated environment dump. The dump holds every inherited variable,
/// credentials included, so it is kept out of the log.
pub fn source_command(script: &Path) -> CommandSpec {
    CommandSpec::new("bash")
        .args(["-c", "set -e; source \"$1\" 1>&2; env -0", "release-pipeline"])
        .arg(script.to_string_lossy())
        .quiet()
}

/// Source `script` and return the variables it added or changed relative to `base`
pub async fn capture_sourced_environment<R: CommandRunner + ?Sized>(
    runner: &R,
    script: &Path,
    base: &HashMap<String, String>,
) -> Result<BTreeMap<String, String>, CommandError> {
    let output = runner.run(&source_command(script)).await?;
    let dumped = parse_env_dump(&output.stdout);

    Ok(dumped
        .into_iter()
        .filter(|(key, value)| base.get(key) != Some(value))
        .collect())
}

/// Parse `env -0` output (`KEY=VALUE\0KEY=VALUE\0...`)
pub fn parse_env_dump(dump: &str) -> BTreeMap<String, String> {
    dump.split('\0')
        .filter_map(|entry| {
            let (key, value) = entry.split_once('=')?;
            if key.is_empty() || key.contains(char::is_whitespace) {
                return None;
            }
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}
