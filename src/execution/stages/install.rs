//! Installation of the built package and the post-install smoke test

use crate::core::config::{InstallConfig, SmokeConfig};
use crate::core::{Platform, VersionString};
use crate::execution::StageError;
use crate::toolchain::{services, ActiveEnvironment, CommandRunner, Conda, InstallRequest};
use std::collections::HashMap;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct SmokeTester<'a> {
    pub conda: &'a Conda,
    pub environment: &'a ActiveEnvironment,
    pub platform: Platform,
    pub package: &'a str,
    pub version: &'a VersionString,
    pub extra_channel: &'a str,
    pub install: &'a InstallConfig,
    pub smoke: &'a SmokeConfig,

    /// Process environment captured at start-up
    pub process_env: &'a HashMap<String, String>,
}

impl SmokeTester<'_> {
    /// Install request for the freshly built package and its companions
    ///
    /// The exact version pin plus `--use-local` makes the resolver pick the
    /// artifact from the local build rather than a published one.
    pub fn install_request(&self) -> InstallRequest {
        let mut packages = vec![format!("{}={}", self.package, self.version)];
        packages.extend(self.install.companions.iter().cloned());
        InstallRequest::new(packages)
            .use_local()
            .channel(self.extra_channel)
    }

    pub async fn run<R: CommandRunner + ?Sized>(&self, runner: &R) -> Result<(), StageError> {
        let env = self.environment;

        runner.run(&self.conda.install(env, &self.install_request())).await?;
        info!("Installed {}={}", self.package, self.version);

        if self.platform.is_linux() {
            match &self.install.native_rebuild {
                Some(source) => {
                    runner
                        .run(&services::native_rebuild(self.conda, env, source))
                        .await?;
                    info!("Rebuilt {} against the environment toolchain", source);
                }
                None => warn!("No native extension configured for rebuild"),
            }
        }

        runner
            .run(&services::import_check(self.conda, env, &self.smoke.import_module))
            .await?;
        info!("Imported {}", self.smoke.import_module);

        let name = &self.smoke.required_env;
        let present = self
            .process_env
            .get(name)
            .map(String::as_str)
            .or_else(|| env.var(name))
            .is_some_and(|v| !v.trim().is_empty());
        if !present {
            return Err(StageError::MissingRuntimeVariable(name.clone()));
        }

        Ok(())
    }
}
