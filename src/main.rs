use anyhow::{Context, Result};
use release_pipeline::{
    cli::{
        commands::{HistoryCommand, PlanCommand, RunCommand, ValidateCommand},
        output::*,
        Cli, Command,
    },
    core::{
        config::PipelineConfig, ContextDefaults, ExecutionStatus, PipelineContext, BRANCH_VARS,
        SOURCE_DIR_VARS,
    },
    execution::{ExecutionEngine, ExecutionEvent, ExecutionPlan},
    persistence::{
        create_summary, record_execution, ExecutionSummary, InMemoryPersistence, PersistenceBackend,
        SqliteExecutionStore,
    },
    toolchain::{git, SubprocessRunner},
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    init_logging(cli.verbose)?;

    match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd).await?,
        Command::Validate(cmd) => validate_pipeline(cmd)?,
        Command::Plan(cmd) => show_plan(cmd).await?,
        Command::History(cmd) => show_history(cmd).await?,
    }

    Ok(())
}

/// `RUST_LOG` wins unless `--verbose` asks for everything
fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Capture the run parameters, asking git for the branch when CI supplies none
async fn capture_context(
    config: &PipelineConfig,
    runner: &SubprocessRunner,
    source: Option<PathBuf>,
    workspace: Option<PathBuf>,
) -> Result<PipelineContext> {
    let working_dir = std::env::current_dir().context("Failed to read current directory")?;

    let detected_branch = if BRANCH_VARS.iter().any(|name| env_value(name).is_some()) {
        None
    } else {
        let checkout = source
            .clone()
            .or_else(|| SOURCE_DIR_VARS.iter().find_map(|name| env_value(name)).map(PathBuf::from))
            .unwrap_or_else(|| working_dir.clone());
        git::current_branch(runner, &checkout).await
    };

    PipelineContext::capture(ContextDefaults {
        source_root: source,
        workspace_root: workspace,
        python_version: config.environment.python.clone(),
        detected_branch,
        working_dir,
        home_dir: dirs::home_dir(),
    })
    .context("Failed to capture pipeline context")
}

async fn run_pipeline(cmd: &RunCommand) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let config = PipelineConfig::load(cmd.file.as_deref(), &cwd)?;

    println!("{} Loaded pipeline: {}", INFO, style(&config.name).bold());

    let runner = SubprocessRunner::new(config.runner.timeout_secs);
    let context = capture_context(&config, &runner, cmd.source.clone(), cmd.workspace.clone()).await?;

    // Set up persistence
    let mut keep_history = !cmd.no_history;
    let store: Arc<dyn PersistenceBackend> = if cmd.no_history {
        Arc::new(InMemoryPersistence::new())
    } else {
        match SqliteExecutionStore::with_default_path().await {
            Ok(store) => Arc::new(store),
            Err(e) => {
                warn!("History store unavailable, this run will not be recorded: {:#}", e);
                keep_history = false;
                Arc::new(InMemoryPersistence::new())
            }
        }
    };

    let mut pipeline = config.to_pipeline();
    let engine = ExecutionEngine::new(runner, config, context.clone());

    for warning in engine.plan().warnings(&context, engine.executor().config()) {
        println!("{} {}", WARN, style(warning).yellow());
    }

    // Console output and stage-count progress
    let progress = create_progress_bar(pipeline.stages.len());
    let bar = progress.clone();
    engine
        .add_event_handler(move |event| {
            bar.suspend(|| println!("{}", format_execution_event(&event)));
            match &event {
                ExecutionEvent::StageStarted { stage, .. } => bar.set_message(stage.title()),
                ExecutionEvent::StageCompleted { .. } | ExecutionEvent::StageSkipped { .. } => {
                    bar.inc(1)
                }
                _ => {}
            }
        })
        .await;

    println!();
    let result = engine.execute(&mut pipeline).await;
    progress.finish_and_clear();

    let summary = create_summary(&pipeline, &context);
    let recorded = record_execution(store.as_ref(), &summary).await;
    if recorded && keep_history {
        println!(
            "\n{} Execution saved to history (ID: {})",
            INFO,
            style(&summary.execution_id.to_string()[..8]).dim()
        );
    }

    match result {
        Ok(()) => {
            println!(
                "\n{} {} {} completed {}",
                CHECK,
                style(&pipeline.name).bold(),
                summary.version.as_deref().unwrap_or_default(),
                style("successfully").green()
            );
            Ok(())
        }
        Err(err) => {
            println!(
                "\n{} {} {}",
                CROSS,
                style(&pipeline.name).bold(),
                style("failed").red()
            );
            for stage in &pipeline.stages {
                println!(
                    "  {}. {:<26} {}",
                    stage.position(),
                    stage.id.title(),
                    format_stage_state(&stage.state)
                );
            }
            error!("{}", err);
            std::process::exit(1);
        }
    }
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating pipeline...", INFO);

    match PipelineConfig::from_file(&cmd.file) {
        Ok(config) => {
            println!("{} Pipeline configuration is valid!", CHECK);
            println!("  Name: {}", style(&config.name).bold());
            println!(
                "  Package: {} {}.x",
                style(&config.project.package).cyan(),
                config.project.base_version
            );
            println!("  Release branch: {}", style(&config.publish.release_branch).cyan());

            if cmd.json {
                let json = serde_json::to_string_pretty(&config)?;
                println!("\n{}", json);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            std::process::exit(1);
        }
    }
}

async fn show_plan(cmd: &PlanCommand) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let config = PipelineConfig::load(cmd.file.as_deref(), &cwd)?;
    let runner = SubprocessRunner::new(config.runner.timeout_secs);
    let context = capture_context(&config, &runner, cmd.source.clone(), cmd.workspace.clone()).await?;

    let plan = ExecutionPlan::resolve(&context, &config);
    let version = config.project.base_version.with_build(context.build_number());
    let warnings = plan.warnings(&context, &config);

    if cmd.json {
        let data = serde_json::json!({
            "version": version,
            "context": context,
            "plan": plan,
            "warnings": warnings,
        });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    println!(
        "{} {} would build version {} from {}",
        INFO,
        style(&config.name).bold(),
        style(version).cyan(),
        style(context.source_root().display()).dim()
    );
    print!("{}", format_plan(&plan));
    for warning in warnings {
        println!("{} {}", WARN, style(warning).yellow());
    }

    Ok(())
}

async fn show_history(cmd: &HistoryCommand) -> Result<()> {
    let store = SqliteExecutionStore::with_default_path().await?;

    // If specific execution ID is requested
    if let Some(exec_id_str) = &cmd.execution_id {
        let exec_id = uuid::Uuid::parse_str(exec_id_str).context("Invalid execution ID format")?;

        match store.load_execution(exec_id).await? {
            Some(summary) => print_execution_details(&summary, cmd.json)?,
            None => println!("{} Execution not found", WARN),
        }
        return Ok(());
    }

    let executions = match &cmd.pipeline {
        Some(pipeline_name) => {
            let mut execs = store.list_executions(pipeline_name).await?;
            execs.truncate(cmd.limit);
            execs
        }
        None => store.list_recent(cmd.limit).await?,
    };

    if cmd.json {
        let data = serde_json::json!({ "executions": executions });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    if executions.is_empty() {
        println!("{} No executions found", INFO);
        return Ok(());
    }

    println!("{} Execution history (showing latest {}):", INFO, cmd.limit);
    for summary in &executions {
        println!("  {}", format_execution_summary(summary));
    }

    Ok(())
}

fn print_execution_details(summary: &ExecutionSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    println!("{} Execution Details", INFO);
    println!("  ID: {}", style(summary.execution_id).cyan());
    println!("  Pipeline: {}", style(&summary.pipeline_name).bold());
    println!("  Branch: {} (build #{})", style(&summary.branch).cyan(), summary.build_number);
    if let Some(version) = &summary.version {
        println!("  Version: {}", style(version).cyan());
    }
    println!("  Status: {}", format_status(summary.status));
    if let Some(stage) = &summary.failed_stage {
        println!("  Aborted at: {}", style(stage).red());
    }
    println!("  Started: {}", style(summary.started_at.to_rfc3339()).dim());
    if let Some(completed) = summary.completed_at {
        println!("  Completed: {}", style(completed.to_rfc3339()).dim());
        if let Ok(duration) = completed.signed_duration_since(summary.started_at).to_std() {
            println!("  Duration: {}", style(format_duration(duration)).dim());
        }
    }
    println!(
        "  Progress: {} ({}/{})",
        style(format!("{:.0}%", summary.progress * 100.0)).cyan(),
        summary.finished_stages,
        summary.total_stages
    );
    if summary.status == ExecutionStatus::Completed {
        println!("  Published: {}", summary.published);
    }

    Ok(())
}

fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
