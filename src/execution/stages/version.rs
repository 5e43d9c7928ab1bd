//! Version stamping

use crate::core::{BaseVersion, VersionString};
use crate::execution::StageError;
use crate::toolchain::{CommandRunner, CommandSpec};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File the version declaration is written to, inside the package directory
pub const VERSION_FILE: &str = "version.py";

const READ_BACK: &str = "import version; print(version.__version__)";

/// Writes the version declaration and proves the interpreter sees it
#[derive(Debug, Clone)]
pub struct VersionStamper<'a> {
    pub package_dir: &'a Path,
    pub interpreter: &'a str,
    pub base: BaseVersion,
    pub build_number: u64,
}

impl VersionStamper<'_> {
    pub fn version_file(&self) -> PathBuf {
        self.package_dir.join(VERSION_FILE)
    }

    /// Command that imports the declaration in a fresh interpreter
    pub fn read_back_command(&self) -> CommandSpec {
        CommandSpec::new(self.interpreter)
            .args(["-c", READ_BACK])
            .current_dir(self.package_dir)
            .env("PYTHONPATH", self.package_dir.to_string_lossy())
            .env("PYTHONDONTWRITEBYTECODE", "1")
    }

    pub async fn run<R: CommandRunner + ?Sized>(&self, runner: &R) -> Result<VersionString, StageError> {
        let expected = self.base.with_build(self.build_number);
        let path = self.version_file();

        if !self.package_dir.is_dir() {
            return Err(StageError::MissingFile {
                what: "package directory",
                path: self.package_dir.to_path_buf(),
            });
        }
        fs::write(&path, expected.declaration())
            .map_err(|e| StageError::io("write version declaration", &path, e))?;
        debug!("Wrote {}", path.display());

        let output = runner.run(&self.read_back_command()).await?;
        let actual = strip_line_terminator(&output.stdout);

        if actual != expected.to_string() {
            return Err(StageError::VersionMismatch {
                expected,
                actual: actual.to_string(),
            });
        }
        let parsed: VersionString = actual.parse().map_err(|_| StageError::VersionMismatch {
            expected,
            actual: actual.to_string(),
        })?;

        info!("Version {} stamped into {}", parsed, path.display());
        Ok(parsed)
    }
}

/// Drop one trailing `\n` or `\r\n`; nothing else is trimmed
fn strip_line_terminator(s: &str) -> &str {
    s.strip_suffix("\r\n")
        .or_else(|| s.strip_suffix('\n'))
        .unwrap_or(s)
}
