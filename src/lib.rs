//! md-pipeline - molecular dynamics preparation as a compiled workflow graph

pub mod cli;
pub mod client;
pub mod compiler;
pub mod core;
pub mod execution;
pub mod toolkit;

// Re-export commonly used types
pub use client::{KfpClient, PipelineService, Registration, Submitter};
pub use compiler::{Compiler, PipelineDefinition};
pub use crate::core::{Component, ComponentKind, ExecutionStatus, Pipeline, RunContext, Task, TaskState};
pub use execution::{ExecutionEngine, ExecutionEvent, TaskExecutor};
pub use toolkit::{AmberToolkit, Toolkit, ToolkitConfig, ToolkitError};
