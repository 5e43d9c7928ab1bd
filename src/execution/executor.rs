//! Stage executor - runs one stage against the toolchain

use crate::{
    core::{config::PipelineConfig, PipelineContext, Secret, StageId, StageOutputs},
    execution::{stages, ExecutionPlan, StageError},
    toolchain::{ActiveEnvironment, BuildBackend, CommandRunner, Conda},
};
use std::path::PathBuf;
use tracing::{debug, info};

/// Executes a single stage
///
/// Owns the runner, the configuration and the captured context. Values that
/// flow between stages live in [`StageOutputs`], which the engine passes in.
pub struct StageExecutor<R> {
    runner: R,
    config: PipelineConfig,
    context: PipelineContext,
    conda: Conda,
    backend: BuildBackend,
}

impl<R: CommandRunner> StageExecutor<R> {
    pub fn new(runner: R, config: PipelineConfig, context: PipelineContext) -> Self {
        let conda = Conda::new(context.install_prefix());
        let backend = BuildBackend::new(conda.clone());
        Self {
            runner,
            config,
            context,
            conda,
            backend,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn context(&self) -> &PipelineContext {
        &self.context
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    fn workspace_path(&self, relative: &str) -> PathBuf {
        self.context.workspace_root().join(relative)
    }

    /// Execute a stage and return a one-line summary of what it did
    pub async fn execute(
        &self,
        id: StageId,
        plan: &ExecutionPlan,
        outputs: &mut StageOutputs,
    ) -> Result<String, StageError> {
        info!("Executing stage {}: {}", id.position(), id.title());
        debug!("Platform {}, release decision {}", plan.platform, plan.decision);

        let runner = &self.runner;
        let config = &self.config;
        let ctx = &self.context;

        match id {
            StageId::StageWorkspace => {
                let copied = stages::stage_workspace(ctx.source_root(), ctx.workspace_root())?;
                Ok(format!(
                    "copied {} entries into {}",
                    copied,
                    ctx.workspace_root().display()
                ))
            }

            StageId::StampVersion => {
                let package_dir = self.workspace_path(&config.project.package_dir);
                let version = stages::VersionStamper {
                    package_dir: &package_dir,
                    interpreter: &config.project.interpreter,
                    base: config.project.base_version,
                    build_number: ctx.build_number(),
                }
                .run(runner)
                .await?;
                outputs.version = Some(version);
                Ok(format!("version {}", version))
            }

            StageId::ProvisionEnvironment => {
                let env = stages::EnvironmentProvisioner {
                    conda: &self.conda,
                    settings: &config.environment,
                    platform: plan.platform,
                    extra_channel: &config.channels.extra,
                    python: ctx.python_version(),
                    software_base: ctx.software_base(),
                    base_env: ctx.env(),
                }
                .run(runner)
                .await?;
                let summary = format!("environment '{}' at {}", env.name, env.prefix.display());
                outputs.environment = Some(env);
                Ok(summary)
            }

            StageId::BuildPackage => {
                let version = outputs.version.ok_or(StageError::MissingInput("version"))?;
                let recipe = self.workspace_path(&config.project.recipe_dir);
                let artifact = stages::PackageBuilder {
                    backend: &self.backend,
                    recipe: &recipe,
                    python: ctx.python_version(),
                    channels: &config.channels.build,
                    version: &version,
                    environment: environment(outputs)?,
                }
                .run(runner)
                .await?;
                let summary = format!("built {}", artifact.file.display());
                outputs.artifact = Some(artifact);
                Ok(summary)
            }

            StageId::SmokeTest => {
                let version = outputs.version.ok_or(StageError::MissingInput("version"))?;
                if outputs.artifact.is_none() {
                    return Err(StageError::MissingInput("artifact"));
                }
                stages::SmokeTester {
                    conda: &self.conda,
                    environment: environment(outputs)?,
                    platform: plan.platform,
                    package: &config.project.package,
                    version: &version,
                    extra_channel: &config.channels.extra,
                    install: &config.install,
                    smoke: &config.smoke,
                    process_env: ctx.env(),
                }
                .run(runner)
                .await?;
                Ok(format!(
                    "installed {}={} and imported {}",
                    config.project.package, version, config.smoke.import_module
                ))
            }

            StageId::RunTests => {
                let test_dir = self.workspace_path(&config.tests.dir);
                let report = stages::TestRunner {
                    conda: &self.conda,
                    environment: environment(outputs)?,
                    test_dir: &test_dir,
                    settings: &config.tests,
                }
                .run(runner)
                .await?;
                outputs.coverage_report = Some(report);
                Ok(format!("test suite in {} passed", test_dir.display()))
            }

            StageId::ReportCoverage => {
                let report = outputs
                    .coverage_report
                    .as_deref()
                    .ok_or(StageError::MissingInput("coverage report"))?;
                let token = ctx
                    .coverage_token()
                    .cloned()
                    .or_else(|| config.coverage.token.clone().map(Secret::new));
                stages::CoverageReporter {
                    conda: &self.conda,
                    environment: environment(outputs)?,
                    report,
                    token,
                }
                .run(runner)
                .await?;
                Ok("coverage uploaded".to_string())
            }

            StageId::PublishRelease => {
                let artifact_dir = outputs
                    .artifact
                    .as_ref()
                    .map(|a| a.dir.clone())
                    .ok_or(StageError::MissingInput("artifact"))?;
                let published = stages::ReleasePublisher {
                    conda: &self.conda,
                    environment: environment(outputs)?,
                    token: ctx.upload_token(),
                    user: &config.publish.user,
                    client_package: &config.publish.client_package,
                    package: &config.project.package,
                    artifact_dir: &artifact_dir,
                }
                .run(runner)
                .await?;
                let summary = format!(
                    "published {} artifact(s) to {}",
                    published.len(),
                    config.publish.user
                );
                outputs.published = published;
                Ok(summary)
            }
        }
    }
}

fn environment(outputs: &StageOutputs) -> Result<&ActiveEnvironment, StageError> {
    outputs
        .environment
        .as_ref()
        .ok_or(StageError::MissingInput("environment"))
}
