//! CLI output formatting

use crate::{
    core::{ExecutionStatus, Gate, StageState},
    execution::{ExecutionEvent, ExecutionPlan},
    persistence::ExecutionSummary,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Stage-count progress bar, drawn on stderr only when it is a terminal
pub fn create_progress_bar(total: usize) -> ProgressBar {
    if !console::Term::stderr().is_term() {
        return ProgressBar::hidden();
    }

    let progress = ProgressBar::with_draw_target(Some(total as u64), ProgressDrawTarget::stderr());
    if let Ok(bar_style) =
        ProgressStyle::default_bar().template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        progress.set_style(bar_style.progress_chars("#>-"));
    }
    progress
}

/// Full-width rule with the stage title, so the aborting stage stands out in CI logs
pub fn stage_banner(position: usize, total: usize, title: &str) -> String {
    let width = term_size::dimensions_stdout().map(|(w, _)| w).unwrap_or(80);
    let label = format!(" [{}/{}] {} ", position, total, title);
    let fill = width.saturating_sub(label.chars().count() + 2);
    format!(
        "{}{}{}",
        style("──").dim(),
        style(label).bold(),
        style("─".repeat(fill)).dim()
    )
}

/// Format a stage state for display
pub fn format_stage_state(state: &StageState) -> String {
    match state {
        StageState::Pending => style("PENDING").dim().to_string(),
        StageState::Running { .. } => style("RUNNING").yellow().to_string(),
        StageState::Completed { .. } => style("COMPLETED").green().to_string(),
        StageState::Failed { .. } => style("FAILED").red().to_string(),
        StageState::Skipped { .. } => style("SKIPPED").dim().to_string(),
    }
}

/// Format an execution status for display
pub fn format_status(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Pending => style("PENDING").dim().to_string(),
        ExecutionStatus::Running => style("RUNNING").yellow().to_string(),
        ExecutionStatus::Completed => style("COMPLETED").green().to_string(),
        ExecutionStatus::Failed => style("FAILED").red().to_string(),
    }
}

fn short_id(id: &uuid::Uuid) -> String {
    id.to_string()[..8].to_string()
}

/// Format execution summary for display
pub fn format_execution_summary(summary: &ExecutionSummary) -> String {
    let status_icon = match summary.status {
        ExecutionStatus::Completed => CHECK,
        ExecutionStatus::Failed => CROSS,
        ExecutionStatus::Running => SPINNER,
        ExecutionStatus::Pending => INFO,
    };

    let mut line = format!(
        "{} {} - {} - {}@{} #{} - {} ({}/{})",
        status_icon,
        style(short_id(&summary.execution_id)).dim(),
        style(&summary.pipeline_name).bold(),
        summary.version.as_deref().unwrap_or("-"),
        style(&summary.branch).cyan(),
        summary.build_number,
        format_status(summary.status),
        summary.finished_stages,
        summary.total_stages,
    );
    if let Some(stage) = &summary.failed_stage {
        line.push_str(&format!(" at {}", style(stage).red()));
    }
    line
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::PipelineStarted {
            execution_id,
            pipeline_name,
            platform,
            decision,
        } => format!(
            "{} Starting pipeline {} ({}) [platform: {}, release: {}]",
            ROCKET,
            style(pipeline_name).bold(),
            style(short_id(execution_id)).dim(),
            style(platform).cyan(),
            style(decision).cyan()
        ),
        ExecutionEvent::StageStarted { stage, total } => {
            stage_banner(stage.position(), *total, stage.title())
        }
        ExecutionEvent::StageCompleted { stage, summary } => format!(
            "{} {}: {}",
            CHECK,
            style(stage.title()).green(),
            style(summary).dim()
        ),
        ExecutionEvent::StageSkipped { stage, reason } => format!(
            "{} {} skipped: {}",
            SKIP,
            style(stage.title()).dim(),
            reason
        ),
        ExecutionEvent::StageFailed { stage, error } => format!(
            "{} {} ({}): {}",
            CROSS,
            style(stage.title()).red(),
            stage.error_class(),
            style(error).red()
        ),
        ExecutionEvent::PipelineCompleted {
            execution_id,
            status,
        } => {
            let status_str = match status {
                ExecutionStatus::Completed => format!("{} completed", style("successfully").green()),
                ExecutionStatus::Failed => style("aborted").red().to_string(),
                other => format!("{:?}", other),
            };
            format!(
                "{} Pipeline ({}) {}",
                INFO,
                style(short_id(execution_id)).dim(),
                status_str
            )
        }
    }
}

fn format_gate(gate: Gate) -> &'static str {
    match gate {
        Gate::Always => "always",
        Gate::LinuxOnly => "linux only",
        Gate::ReleaseBranch => "release branch only",
    }
}

/// Format a resolved plan, one line per stage
pub fn format_plan(plan: &ExecutionPlan) -> String {
    let mut out = format!(
        "{} Branch {} (release branch {}) on {}: {}\n",
        INFO,
        style(&plan.branch).cyan(),
        style(&plan.release_branch).dim(),
        style(plan.platform).cyan(),
        style(plan.decision).bold()
    );
    for stage in &plan.stages {
        let marker = if stage.enabled { CHECK } else { SKIP };
        out.push_str(&format!(
            "  {}{}. {} [{}]",
            marker,
            stage.position,
            style(stage.title).bold(),
            format_gate(stage.gate)
        ));
        if let Some(reason) = &stage.skip_reason {
            out.push_str(&format!(" - {}", style(reason).dim()));
        }
        out.push('\n');
    }
    out
}
