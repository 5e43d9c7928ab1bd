//! Environment provisioning
//!
//! Linux builders ship a pre-provisioned environment plus a platform script
//! that sets up the external software; everything else gets an environment
//! created from scratch with the pinned package set.

use crate::core::config::EnvironmentConfig;
use crate::core::Platform;
use crate::execution::StageError;
use crate::toolchain::{shell, ActiveEnvironment, CommandRunner, Conda, InstallRequest};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone)]
pub struct EnvironmentProvisioner<'a> {
    pub conda: &'a Conda,
    pub settings: &'a EnvironmentConfig,
    pub platform: Platform,

    /// Channel registered with top priority
    pub extra_channel: &'a str,

    /// Interpreter version for a fresh environment
    pub python: &'a str,

    /// Root of the external software installation (Linux)
    pub software_base: Option<&'a Path>,

    /// Environment the platform script is sourced on top of
    pub base_env: &'a HashMap<String, String>,
}

impl EnvironmentProvisioner<'_> {
    pub async fn run<R: CommandRunner + ?Sized>(&self, runner: &R) -> Result<ActiveEnvironment, StageError> {
        self.configure_policy(runner).await?;

        let env = match self.platform {
            Platform::Linux => self.use_provisioned(runner).await?,
            Platform::Other => self.create_fresh(runner).await?,
        };

        info!(
            "Environment '{}' active at {} ({} overlay variables)",
            env.name,
            env.prefix.display(),
            env.overlay.len()
        );
        Ok(env)
    }

    /// Non-interactive answers, no automatic upload, extra channel first
    async fn configure_policy<R: CommandRunner + ?Sized>(&self, runner: &R) -> Result<(), StageError> {
        runner.run(&self.conda.set_config("always_yes", "true")).await?;
        runner.run(&self.conda.set_config("anaconda_upload", "no")).await?;
        runner.run(&self.conda.add_channel(self.extra_channel)).await?;
        Ok(())
    }

    async fn use_provisioned<R: CommandRunner + ?Sized>(&self, runner: &R) -> Result<ActiveEnvironment, StageError> {
        let base = self
            .software_base
            .ok_or(StageError::MissingSetting("SOFTWARE_BASE"))?;
        let script = base.join(&self.settings.platform_config);
        if !script.is_file() {
            return Err(StageError::MissingFile {
                what: "platform configuration",
                path: script,
            });
        }

        let overlay = shell::capture_sourced_environment(runner, &script, self.base_env).await?;
        info!("Sourced {} ({} variables set)", script.display(), overlay.len());

        let env = self.locate(runner, overlay).await?;

        let tools = InstallRequest::new(self.settings.linux_tools.iter().cloned()).no_update_deps();
        if !tools.packages.is_empty() {
            runner.run(&self.conda.install(&env, &tools)).await?;
        }
        Ok(env)
    }

    async fn create_fresh<R: CommandRunner + ?Sized>(&self, runner: &R) -> Result<ActiveEnvironment, StageError> {
        let mut packages = vec![format!("python={}", self.python)];
        packages.extend(self.settings.packages.iter().cloned());

        runner
            .run(&self.conda.create_env(
                &self.settings.name,
                &[self.extra_channel.to_string()],
                &packages,
            ))
            .await?;

        self.locate(runner, BTreeMap::new()).await
    }

    async fn locate<R: CommandRunner + ?Sized>(
        &self,
        runner: &R,
        overlay: BTreeMap<String, String>,
    ) -> Result<ActiveEnvironment, StageError> {
        let prefix = self
            .conda
            .find_environment(runner, &self.settings.name, &overlay)
            .await?
            .ok_or_else(|| StageError::EnvironmentNotFound(self.settings.name.clone()))?;

        Ok(ActiveEnvironment {
            name: self.settings.name.clone(),
            prefix,
            overlay,
        })
    }
}
