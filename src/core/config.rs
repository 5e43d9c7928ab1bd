//! Pipeline configuration from YAML
//!
//! Every field has a default, so an empty document (or no file at all)
//! describes the stock threeML pipeline.

use crate::core::version::BaseVersion;
use crate::core::Pipeline;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path};
use tracing::debug;

/// Configuration file picked up from the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "release-pipeline.yaml";

/// Top-level pipeline configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Pipeline name
    pub name: String,

    pub project: ProjectConfig,
    pub channels: ChannelConfig,
    pub environment: EnvironmentConfig,
    pub install: InstallConfig,
    pub smoke: SmokeConfig,
    pub tests: TestConfig,
    pub coverage: CoverageConfig,
    pub publish: PublishConfig,
    pub runner: RunnerConfig,
}

/// What is being built
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Conda package name; also the artifact file prefix
    pub package: String,

    /// Directory (relative to the workspace) holding `version.py`
    pub package_dir: String,

    /// `<major>.<minor>`; the build number supplies the patch
    pub base_version: BaseVersion,

    /// Recipe directory relative to the workspace
    pub recipe_dir: String,

    /// Interpreter used to read the version declaration back
    pub interpreter: String,
}

/// Package channels
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Channel registered ahead of the defaults and preferred on install
    pub extra: String,

    /// Channels passed to the build backend, in priority order
    pub build: Vec<String>,
}

/// The package-management environment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    pub name: String,

    /// Interpreter version used when the environment supplies none
    pub python: String,

    /// Script under the software base sourced on Linux
    pub platform_config: String,

    /// Tools added to the pre-existing Linux environment
    pub linux_tools: Vec<String>,

    /// Packages pinned into a freshly created environment (besides the interpreter)
    pub packages: Vec<String>,
}

/// What gets installed next to the built package
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallConfig {
    pub companions: Vec<String>,

    /// Source spec of the native extension rebuilt on Linux (None = no rebuild)
    pub native_rebuild: Option<String>,
}

/// Post-install gate
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmokeConfig {
    /// Module that must import inside the environment
    pub import_module: String,

    /// Variable that must be present and non-empty
    pub required_env: String,
}

/// Test suite invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TestConfig {
    /// Test root relative to the workspace
    pub dir: String,

    /// Subdirectory excluded from test discovery
    pub ignore: String,

    /// Namespace measured for coverage
    pub cov_package: String,

    pub extra_args: Vec<String>,
}

/// Coverage upload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverageConfig {
    /// Project token used when the environment supplies none
    pub token: Option<String>,
}

/// Release publishing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub release_branch: String,

    /// Channel owner the artifact is uploaded to
    pub user: String,

    /// Package providing the upload client
    pub client_package: String,
}

/// Subprocess behaviour
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Per-command timeout (None = wait indefinitely)
    pub timeout_secs: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name: "threeML CI".to_string(),
            project: ProjectConfig::default(),
            channels: ChannelConfig::default(),
            environment: EnvironmentConfig::default(),
            install: InstallConfig::default(),
            smoke: SmokeConfig::default(),
            tests: TestConfig::default(),
            coverage: CoverageConfig::default(),
            publish: PublishConfig::default(),
            runner: RunnerConfig::default(),
        }
    }
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            package: "threeml".to_string(),
            package_dir: "threeML".to_string(),
            base_version: BaseVersion::new(1, 2),
            recipe_dir: "conda-dist/recipe".to_string(),
            interpreter: "python".to_string(),
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            extra: "threeml".to_string(),
            build: vec!["conda-forge".to_string(), "threeml".to_string()],
        }
    }
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            name: "test_env".to_string(),
            python: "2.7".to_string(),
            platform_config: "config_threeML.sh".to_string(),
            linux_tools: strings(&["pytest", "pytest-cov", "coverage", "git"]),
            packages: strings(&["numpy<1.15", "pytest", "pytest-cov", "coverage", "codecov", "git"]),
        }
    }
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            companions: strings(&["xspec-modelsonly-lite"]),
            native_rebuild: Some("git+https://github.com/iminuit/iminuit.git".to_string()),
        }
    }
}

impl Default for SmokeConfig {
    fn default() -> Self {
        Self {
            import_module: "threeML.plugins.FermiLATLike".to_string(),
            required_env: "FERMI_DIR".to_string(),
        }
    }
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            dir: "threeML/test".to_string(),
            ignore: "threeML_env".to_string(),
            cov_package: "threeML".to_string(),
            extra_args: Vec::new(),
        }
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            release_branch: "master".to_string(),
            user: "threeml".to_string(),
            client_package: "anaconda-client".to_string(),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl PipelineConfig {
    /// Load pipeline configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load `path`, else `DEFAULT_CONFIG_FILE` in `dir` if present, else the defaults
    pub fn load(path: Option<&Path>, dir: &Path) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path)
                .with_context(|| format!("Failed to load pipeline config {}", path.display()));
        }

        let fallback = dir.join(DEFAULT_CONFIG_FILE);
        if fallback.is_file() {
            debug!("Using {}", fallback.display());
            return Self::from_file(&fallback)
                .with_context(|| format!("Failed to load pipeline config {}", fallback.display()));
        }

        debug!("No pipeline config found, using built-in defaults");
        Ok(Self::default())
    }

    /// Parse pipeline configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty document is `null`, which serde_yaml won't default
        let config: PipelineConfig = if yaml.trim().is_empty() {
            PipelineConfig::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the pipeline configuration
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("name", &self.name),
            ("project.package", &self.project.package),
            ("project.interpreter", &self.project.interpreter),
            ("channels.extra", &self.channels.extra),
            ("environment.name", &self.environment.name),
            ("environment.python", &self.environment.python),
            ("environment.platform_config", &self.environment.platform_config),
            ("smoke.import_module", &self.smoke.import_module),
            ("smoke.required_env", &self.smoke.required_env),
            ("tests.ignore", &self.tests.ignore),
            ("tests.cov_package", &self.tests.cov_package),
            ("publish.release_branch", &self.publish.release_branch),
            ("publish.user", &self.publish.user),
            ("publish.client_package", &self.publish.client_package),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                anyhow::bail!("'{}' must not be empty", field);
            }
        }

        // Workspace-relative paths must stay inside the workspace
        let relative = [
            ("project.package_dir", &self.project.package_dir),
            ("project.recipe_dir", &self.project.recipe_dir),
            ("tests.dir", &self.tests.dir),
        ];
        for (field, value) in relative {
            if value.trim().is_empty() {
                anyhow::bail!("'{}' must not be empty", field);
            }
            let path = Path::new(value);
            if path.is_absolute()
                || path
                    .components()
                    .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
            {
                anyhow::bail!(
                    "'{}' must be a path inside the workspace, got '{}'",
                    field,
                    value
                );
            }
        }

        if self.environment.name.contains(['/', '\\']) {
            anyhow::bail!(
                "'environment.name' must be a plain name, got '{}'",
                self.environment.name
            );
        }

        if self.runner.timeout_secs == Some(0) {
            anyhow::bail!("'runner.timeout_secs' must be positive when set");
        }

        Ok(())
    }

    /// Convert config to a Pipeline domain model
    pub fn to_pipeline(&self) -> Pipeline {
        Pipeline::from_config(self)
    }
}
