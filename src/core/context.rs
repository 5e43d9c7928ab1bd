//! Pipeline context - parameters captured from the environment at start-up

use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const BUILD_NUMBER_VARS: &[&str] = &["BUILD_NUMBER", "TRAVIS_BUILD_NUMBER"];
pub const BRANCH_VARS: &[&str] = &["BRANCH", "TRAVIS_BRANCH"];
pub const OS_VARS: &[&str] = &["OS_NAME", "TRAVIS_OS_NAME"];
pub const PYTHON_VARS: &[&str] = &["PYTHON_VERSION", "TRAVIS_PYTHON_VERSION"];
pub const INSTALL_PREFIX_VARS: &[&str] = &["INSTALL_PREFIX", "CONDA_ROOT"];
pub const SOFTWARE_BASE_VARS: &[&str] = &["SOFTWARE_BASE"];
pub const UPLOAD_TOKEN_VARS: &[&str] = &["UPLOAD_TOKEN", "CONDA_UPLOAD_TOKEN"];
pub const COVERAGE_TOKEN_VARS: &[&str] = &["COVERAGE_TOKEN", "CODECOV_TOKEN"];
pub const SOURCE_DIR_VARS: &[&str] = &["SOURCE_DIR", "TRAVIS_BUILD_DIR"];
pub const WORKSPACE_DIR_VARS: &[&str] = &["WORKSPACE_DIR"];

/// Default workspace directory name, created under the home directory
pub const DEFAULT_WORKSPACE_DIR: &str = "ci_workspace";

/// Errors capturing the context
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("missing required environment variable (set one of: {})", .0.join(", "))]
    Missing(&'static [&'static str]),

    #[error("{name}={value:?} is not a valid build number")]
    InvalidBuildNumber { name: String, value: String },

    #[error("could not determine the branch: set {} or run inside a git checkout", BRANCH_VARS.join(" or "))]
    NoBranch,
}

/// A credential whose value never shows up in logs or debug output
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw value, for handing to the tool that needs it
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("***")
    }
}

/// Which provisioning/installation branch the run takes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Containerized Linux builder with a pre-provisioned environment
    Linux,
    /// Anything else: the environment is created from scratch
    Other,
}

impl Platform {
    pub fn from_os_tag(tag: &str) -> Self {
        if tag.trim().eq_ignore_ascii_case("linux") {
            Platform::Linux
        } else {
            Platform::Other
        }
    }

    pub fn is_linux(self) -> bool {
        self == Platform::Linux
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Linux => f.write_str("linux"),
            Platform::Other => f.write_str("other"),
        }
    }
}

/// Whether the run ends by publishing the artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseDecision {
    Publish,
    Skip,
}

impl ReleaseDecision {
    /// Publish iff the branch is exactly the release branch
    pub fn for_branch(branch: &str, release_branch: &str) -> Self {
        if branch == release_branch {
            ReleaseDecision::Publish
        } else {
            ReleaseDecision::Skip
        }
    }
}

impl fmt::Display for ReleaseDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReleaseDecision::Publish => f.write_str("publish"),
            ReleaseDecision::Skip => f.write_str("skip"),
        }
    }
}

/// Values the environment cannot supply
#[derive(Debug, Clone, Default)]
pub struct ContextDefaults {
    /// Source checkout given on the command line (wins over the environment)
    pub source_root: Option<PathBuf>,

    /// Workspace given on the command line (wins over the environment)
    pub workspace_root: Option<PathBuf>,

    /// Interpreter version used when none is set in the environment
    pub python_version: String,

    /// Branch reported by the checkout itself, used when none is set
    pub detected_branch: Option<String>,

    /// Directory relative paths and fallbacks resolve against
    pub working_dir: PathBuf,

    /// Home directory the default workspace goes under
    pub home_dir: Option<PathBuf>,
}

/// Execution context for a pipeline run
///
/// Captured once before the first stage and never mutated afterwards. Stages
/// receive the individual fields they read rather than the whole context.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineContext {
    build_number: u64,
    branch: String,
    os_tag: String,
    python_version: String,
    install_prefix: Option<PathBuf>,
    software_base: Option<PathBuf>,
    upload_token: Option<Secret>,
    coverage_token: Option<Secret>,
    source_root: PathBuf,
    workspace_root: PathBuf,

    /// Snapshot of the process environment at capture time
    #[serde(skip)]
    env: EnvSnapshot,
}

/// Process environment snapshot; its debug output lists no values
#[derive(Clone, Default)]
struct EnvSnapshot(HashMap<String, String>);

impl fmt::Debug for EnvSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EnvSnapshot({} vars)", self.0.len())
    }
}

impl PipelineContext {
    /// Capture from the current process environment
    pub fn capture(defaults: ContextDefaults) -> Result<Self, ContextError> {
        Self::from_env_map(std::env::vars().collect(), defaults)
    }

    /// Capture from an explicit variable map
    pub fn from_env_map(
        env: HashMap<String, String>,
        defaults: ContextDefaults,
    ) -> Result<Self, ContextError> {
        let (name, raw) = lookup(&env, BUILD_NUMBER_VARS)
            .ok_or(ContextError::Missing(BUILD_NUMBER_VARS))?;
        let build_number = raw
            .trim()
            .parse::<u64>()
            .map_err(|_| ContextError::InvalidBuildNumber {
                name: name.to_string(),
                value: raw.to_string(),
            })?;

        let branch = lookup(&env, BRANCH_VARS)
            .map(|(_, v)| v.to_string())
            .or(defaults.detected_branch)
            .ok_or(ContextError::NoBranch)?;

        let os_tag = lookup(&env, OS_VARS)
            .map(|(_, v)| v.to_string())
            .unwrap_or_else(|| std::env::consts::OS.to_string());

        let python_version = lookup(&env, PYTHON_VARS)
            .map(|(_, v)| v.to_string())
            .unwrap_or(defaults.python_version);

        let resolve = |p: PathBuf| -> PathBuf {
            if p.is_absolute() {
                p
            } else {
                defaults.working_dir.join(p)
            }
        };

        let source_root = defaults
            .source_root
            .or_else(|| lookup(&env, SOURCE_DIR_VARS).map(|(_, v)| PathBuf::from(v)))
            .map(&resolve)
            .unwrap_or_else(|| defaults.working_dir.clone());

        let workspace_root = defaults
            .workspace_root
            .or_else(|| lookup(&env, WORKSPACE_DIR_VARS).map(|(_, v)| PathBuf::from(v)))
            .map(&resolve)
            .unwrap_or_else(|| default_workspace(&source_root, defaults.home_dir.as_deref()));

        Ok(Self {
            build_number,
            branch,
            os_tag,
            python_version,
            install_prefix: lookup(&env, INSTALL_PREFIX_VARS).map(|(_, v)| PathBuf::from(v)),
            software_base: lookup(&env, SOFTWARE_BASE_VARS).map(|(_, v)| PathBuf::from(v)),
            upload_token: lookup(&env, UPLOAD_TOKEN_VARS).map(|(_, v)| Secret::new(v)),
            coverage_token: lookup(&env, COVERAGE_TOKEN_VARS).map(|(_, v)| Secret::new(v)),
            source_root,
            workspace_root,
            env: EnvSnapshot(env),
        })
    }

    pub fn build_number(&self) -> u64 {
        self.build_number
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn os_tag(&self) -> &str {
        &self.os_tag
    }

    pub fn platform(&self) -> Platform {
        Platform::from_os_tag(&self.os_tag)
    }

    pub fn python_version(&self) -> &str {
        &self.python_version
    }

    pub fn install_prefix(&self) -> Option<&Path> {
        self.install_prefix.as_deref()
    }

    pub fn software_base(&self) -> Option<&Path> {
        self.software_base.as_deref()
    }

    pub fn upload_token(&self) -> Option<&Secret> {
        self.upload_token.as_ref()
    }

    pub fn coverage_token(&self) -> Option<&Secret> {
        self.coverage_token.as_ref()
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// A variable from the captured environment snapshot
    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env.0.get(key).map(String::as_str)
    }

    /// The full captured environment snapshot
    pub fn env(&self) -> &HashMap<String, String> {
        &self.env.0
    }
}

/// `<home>/ci_workspace`, or a sibling of the checkout when that would overlap it
///
/// The checkout usually is the working directory, so nothing under it can
/// serve as the workspace.
fn default_workspace(source_root: &Path, home: Option<&Path>) -> PathBuf {
    let overlaps = |w: &Path| w.starts_with(source_root) || source_root.starts_with(w);

    if let Some(candidate) = home
        .map(|h| h.join(DEFAULT_WORKSPACE_DIR))
        .filter(|w| !overlaps(w))
    {
        return candidate;
    }

    let name = source_root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "source".to_string());
    source_root
        .parent()
        .unwrap_or(source_root)
        .join(format!("{}-{}", name, DEFAULT_WORKSPACE_DIR))
}

/// First non-empty variable among `names`
fn lookup<'a>(env: &'a HashMap<String, String>, names: &'static [&'static str]) -> Option<(&'static str, &'a str)> {
    names.iter().find_map(|name| {
        env.get(*name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
            .map(|v| (*name, v))
    })
}
