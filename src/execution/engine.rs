//! Main execution engine - orchestrates the entire pipeline run

use crate::{
    core::{
        config::PipelineConfig, ExecutionStatus, Pipeline, PipelineContext, Platform,
        ReleaseDecision, StageId, StageState,
    },
    execution::{ExecutionPlan, PipelineError, StageExecutor},
    toolchain::CommandRunner,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};
use uuid::Uuid;

/// Events that can occur during pipeline execution
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    PipelineStarted {
        execution_id: Uuid,
        pipeline_name: String,
        platform: Platform,
        decision: ReleaseDecision,
    },
    StageStarted {
        stage: StageId,
        total: usize,
    },
    StageCompleted {
        stage: StageId,
        summary: String,
    },
    StageSkipped {
        stage: StageId,
        reason: String,
    },
    StageFailed {
        stage: StageId,
        error: String,
    },
    PipelineCompleted {
        execution_id: Uuid,
        status: ExecutionStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Main pipeline execution engine
///
/// Stages run strictly one after another. The first failure aborts the run:
/// later stages stay `Pending` and never touch the toolchain.
pub struct ExecutionEngine<R> {
    executor: Arc<StageExecutor<R>>,
    event_handlers: Arc<Mutex<Vec<EventHandler>>>,
}

impl<R: CommandRunner + 'static> ExecutionEngine<R> {
    pub fn new(runner: R, config: PipelineConfig, context: PipelineContext) -> Self {
        Self {
            executor: Arc::new(StageExecutor::new(runner, config, context)),
            event_handlers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Resolve the branch decisions for this run
    pub fn plan(&self) -> ExecutionPlan {
        ExecutionPlan::resolve(self.executor.context(), self.executor.config())
    }

    pub fn executor(&self) -> &StageExecutor<R> {
        &self.executor
    }

    /// Add an event handler
    pub async fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.lock().await.push(Arc::new(handler));
    }

    /// Emit an event to all handlers
    async fn emit_event(&self, event: ExecutionEvent) {
        let handlers = self.event_handlers.lock().await;
        for handler in handlers.iter() {
            handler(event.clone());
        }
    }

    /// Execute the entire pipeline
    pub async fn execute(&self, pipeline: &mut Pipeline) -> Result<(), PipelineError> {
        let execution_id = pipeline.state.execution_id;
        let plan = self.plan();
        pipeline.apply_plan(&plan);

        info!(
            "Starting pipeline execution: {} ({}) on branch '{}' [{} / {}]",
            pipeline.name, execution_id, plan.branch, plan.platform, plan.decision
        );
        self.emit_event(ExecutionEvent::PipelineStarted {
            execution_id,
            pipeline_name: pipeline.name.clone(),
            platform: plan.platform,
            decision: plan.decision,
        })
        .await;

        let total = pipeline.stages.len();
        pipeline.state.start(total);

        for index in 0..total {
            let stage_id = pipeline.stages[index].id;

            if !pipeline.stages[index].enabled {
                let reason = plan
                    .skip_reason(stage_id)
                    .unwrap_or("gate closed")
                    .to_string();
                info!("Skipping stage {}: {}", stage_id, reason);
                pipeline.stages[index].state = StageState::Skipped {
                    reason: reason.clone(),
                };
                pipeline.state.advance();
                self.emit_event(ExecutionEvent::StageSkipped {
                    stage: stage_id,
                    reason,
                })
                .await;
                continue;
            }

            let started_at = chrono::Utc::now();
            pipeline.stages[index].state = StageState::Running { started_at };
            self.emit_event(ExecutionEvent::StageStarted {
                stage: stage_id,
                total,
            })
            .await;

            match self
                .executor
                .execute(stage_id, &plan, &mut pipeline.outputs)
                .await
            {
                Ok(summary) => {
                    info!("Stage {} completed: {}", stage_id, summary);
                    pipeline.stages[index].state = StageState::Completed {
                        summary: summary.clone(),
                        started_at,
                        completed_at: chrono::Utc::now(),
                    };
                    pipeline.state.advance();
                    self.emit_event(ExecutionEvent::StageCompleted {
                        stage: stage_id,
                        summary,
                    })
                    .await;
                }
                Err(source) => {
                    let err = PipelineError {
                        stage: stage_id,
                        source,
                    };
                    error!("{}", err);
                    pipeline.stages[index].state = StageState::Failed {
                        error: err.source.to_string(),
                        started_at,
                        failed_at: chrono::Utc::now(),
                    };
                    pipeline.state.fail(stage_id);
                    self.emit_event(ExecutionEvent::StageFailed {
                        stage: stage_id,
                        error: err.source.to_string(),
                    })
                    .await;
                    self.emit_event(ExecutionEvent::PipelineCompleted {
                        execution_id,
                        status: ExecutionStatus::Failed,
                    })
                    .await;
                    return Err(err);
                }
            }
        }

        pipeline.state.complete();
        info!(
            "Pipeline execution finished: {} - {:?}",
            pipeline.name, pipeline.state.status
        );
        self.emit_event(ExecutionEvent::PipelineCompleted {
            execution_id,
            status: ExecutionStatus::Completed,
        })
        .await;

        Ok(())
    }
}
