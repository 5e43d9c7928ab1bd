//! Pipeline execution engine

pub mod engine;
pub mod error;
pub mod executor;
pub mod plan;
pub mod stages;

pub use engine::{EventHandler, ExecutionEngine, ExecutionEvent};
pub use error::{PipelineError, StageError};
pub use executor::StageExecutor;
pub use plan::{ExecutionPlan, PlannedStage};
