//! CLI command definitions

use clap::Args;
use std::path::PathBuf;

/// Run the pipeline
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to pipeline YAML file (defaults to ./release-pipeline.yaml, then built-in defaults)
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Source checkout to stage (overrides SOURCE_DIR / TRAVIS_BUILD_DIR)
    #[arg(long)]
    pub source: Option<PathBuf>,

    /// Working directory the source is staged into (overrides WORKSPACE_DIR)
    #[arg(long)]
    pub workspace: Option<PathBuf>,

    /// Don't save execution to history
    #[arg(long)]
    pub no_history: bool,
}

/// Validate a pipeline configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: PathBuf,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show what a run would do in the current environment
#[derive(Debug, Args, Clone)]
pub struct PlanCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    #[arg(long)]
    pub source: Option<PathBuf>,

    #[arg(long)]
    pub workspace: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show execution history
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Pipeline name to filter by
    #[arg(short, long)]
    pub pipeline: Option<String>,

    /// Number of recent executions to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Show full details of a single execution
    #[arg(long)]
    pub execution_id: Option<String>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}
