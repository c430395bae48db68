//! Local pipeline execution

pub mod engine;
pub mod executor;

pub use engine::{EventHandler, ExecutionEngine, ExecutionEvent};
pub use executor::{ExecutionError, ExecutionResult, TaskExecutor};
