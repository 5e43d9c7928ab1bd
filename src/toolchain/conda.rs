//! Conda package manager and conda-build backend

use crate::core::VersionString;
use crate::toolchain::{CommandError, CommandRunner, CommandSpec};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Handle on the conda executable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conda {
    program: String,
}

impl Conda {
    /// Locate conda under an installation prefix, or fall back to `conda` on PATH
    pub fn new(install_prefix: Option<&Path>) -> Self {
        let program = match install_prefix {
            Some(prefix) if cfg!(windows) => prefix.join("Scripts").join("conda.exe"),
            Some(prefix) => prefix.join("bin").join("conda"),
            None => PathBuf::from("conda"),
        };
        Self {
            program: program.to_string_lossy().into_owned(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn command(&self) -> CommandSpec {
        CommandSpec::new(&self.program)
    }

    /// `conda config --set <key> <value>`
    pub fn set_config(&self, key: &str, value: &str) -> CommandSpec {
        self.command().args(["config", "--set", key, value])
    }

    /// `conda config --add channels <channel>`
    ///
    /// `--add` prepends, so the channel outranks everything already configured.
    pub fn add_channel(&self, channel: &str) -> CommandSpec {
        self.command().args(["config", "--add", "channels", channel])
    }

    /// `conda create --yes --name <env> [-c ch]... <packages>`
    pub fn create_env(&self, name: &str, channels: &[String], packages: &[String]) -> CommandSpec {
        let mut cmd = self.command().args(["create", "--yes", "--name", name]);
        for channel in channels {
            cmd = cmd.args(["-c", channel.as_str()]);
        }
        cmd.args(packages.iter().cloned())
    }

    /// `conda env list --json`
    pub fn env_list(&self) -> CommandSpec {
        self.command().args(["env", "list", "--json"])
    }

    /// `conda install` into an environment
    pub fn install(&self, env: &ActiveEnvironment, request: &InstallRequest) -> CommandSpec {
        let mut cmd = self
            .command()
            .args(["install", "--yes", "-n", env.name.as_str()]);
        if request.use_local {
            cmd = cmd.arg("--use-local");
        }
        if request.no_update_deps {
            cmd = cmd.arg("--no-update-deps");
        }
        for channel in &request.channels {
            cmd = cmd.args(["-c", channel.as_str()]);
        }
        cmd.args(request.packages.iter().cloned())
            .envs(env.overlay.clone())
    }

    /// Run `program` inside the environment via `conda run`
    pub fn run_in<I, S>(&self, env: &ActiveEnvironment, program: &str, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command()
            .args(["run", "--no-capture-output", "-n", env.name.as_str(), program])
            .args(args)
            .envs(env.overlay.clone())
    }

    /// Find the on-disk prefix of a named environment
    ///
    /// Returns `Ok(None)` when conda knows no environment by that name.
    pub async fn find_environment<R: CommandRunner + ?Sized>(
        &self,
        runner: &R,
        name: &str,
        overlay: &BTreeMap<String, String>,
    ) -> Result<Option<PathBuf>, CommandError> {
        let spec = self.env_list().envs(overlay.clone());
        let output = runner.run(&spec).await?;
        let listing: EnvListing =
            serde_json::from_str(&output.stdout).map_err(|e| CommandError::UnexpectedOutput {
                command: spec.display(),
                reason: e.to_string(),
            })?;

        debug!("conda knows {} environments", listing.envs.len());
        Ok(listing
            .envs
            .into_iter()
            .find(|prefix| prefix.file_name().is_some_and(|n| n == name)))
    }
}

#[derive(Debug, Deserialize)]
struct EnvListing {
    #[serde(default)]
    envs: Vec<PathBuf>,
}

/// Packages and resolution options for one `conda install`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallRequest {
    pub packages: Vec<String>,
    pub channels: Vec<String>,
    pub use_local: bool,
    pub no_update_deps: bool,
}

impl InstallRequest {
    pub fn new<I, S>(packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            packages: packages.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn channel(mut self, channel: impl Into<String>) -> Self {
        self.channels.push(channel.into());
        self
    }

    pub fn use_local(mut self) -> Self {
        self.use_local = true;
        self
    }

    pub fn no_update_deps(mut self) -> Self {
        self.no_update_deps = true;
        self
    }
}

/// The single activated environment every stage after provisioning runs in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveEnvironment {
    /// Environment name (`conda run -n <name>`)
    pub name: String,

    /// On-disk prefix of the environment
    pub prefix: PathBuf,

    /// Variables captured from the sourced platform configuration
    pub overlay: BTreeMap<String, String>,
}

impl ActiveEnvironment {
    pub fn include_dir(&self) -> PathBuf {
        self.prefix.join("include")
    }

    pub fn lib_dir(&self) -> PathBuf {
        self.prefix.join("lib")
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.prefix.join("bin")
    }

    /// Look a variable up in the overlay
    pub fn var(&self, key: &str) -> Option<&str> {
        self.overlay.get(key).map(String::as_str)
    }
}

/// Inputs shared by a build and its output-path query
///
/// Both calls are derived from the same request, so the path query can never
/// disagree with the build about the interpreter version or channels.
#[derive(Debug, Clone)]
pub struct BuildRequest<'a> {
    pub recipe: &'a Path,
    pub python: &'a str,
    pub channels: &'a [String],
    pub version: &'a VersionString,
    pub overlay: &'a BTreeMap<String, String>,
}

/// conda-build driven through the conda executable
#[derive(Debug, Clone)]
pub struct BuildBackend {
    conda: Conda,
}

impl BuildBackend {
    pub fn new(conda: Conda) -> Self {
        Self { conda }
    }

    fn base_command(&self, request: &BuildRequest<'_>) -> CommandSpec {
        let mut cmd = self
            .conda
            .command()
            .args(["build", "--python", request.python]);
        for channel in request.channels {
            cmd = cmd.args(["-c", channel.as_str()]);
        }
        cmd.envs(request.overlay.clone())
            .env("PKG_VERSION", request.version.to_string())
    }

    /// `conda build --python <v> -c ... <recipe>`
    pub fn build_command(&self, request: &BuildRequest<'_>) -> CommandSpec {
        self.base_command(request)
            .arg(request.recipe.to_string_lossy())
    }

    /// `conda build --output --python <v> -c ... <recipe>`
    pub fn output_path_command(&self, request: &BuildRequest<'_>) -> CommandSpec {
        self.base_command(request)
            .arg("--output")
            .arg(request.recipe.to_string_lossy())
    }

    /// Run the build; blocks until the backend exits
    pub async fn build<R: CommandRunner + ?Sized>(
        &self,
        runner: &R,
        request: &BuildRequest<'_>,
    ) -> Result<(), CommandError> {
        runner.run(&self.build_command(request)).await.map(|_| ())
    }

    /// Ask the backend where the artifact for `request` lives
    pub async fn output_path<R: CommandRunner + ?Sized>(
        &self,
        runner: &R,
        request: &BuildRequest<'_>,
    ) -> Result<PathBuf, CommandError> {
        let spec = self.output_path_command(request);
        let output = runner.run(&spec).await?;
        output
            .last_line()
            .map(PathBuf::from)
            .filter(|p| p.file_name().is_some())
            .ok_or_else(|| CommandError::UnexpectedOutput {
                command: spec.display(),
                reason: format!("expected an artifact path, got {:?}", output.stdout.trim()),
            })
    }
}
