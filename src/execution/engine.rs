//! Main execution engine - runs the whole graph on this machine

use crate::{
    core::{ExecutionStatus, Pipeline, RunContext, TaskState},
    execution::{ExecutionError, ExecutionResult, TaskExecutor},
    toolkit::Toolkit,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Events that can occur during pipeline execution
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    PipelineStarted {
        run_id: Uuid,
        pipeline_name: String,
        total_tasks: usize,
    },
    TaskStarted {
        task_id: String,
    },
    TaskCompleted {
        task_id: String,
        outputs: BTreeMap<String, PathBuf>,
    },
    TaskFailed {
        task_id: String,
        error: String,
    },
    TaskSkipped {
        task_id: String,
        reason: String,
    },
    PipelineCompleted {
        run_id: Uuid,
        status: ExecutionStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Sequential pipeline runner
///
/// Tasks run one at a time in topological order. When a task fails every
/// task downstream of it is skipped and the run is reported failed.
pub struct ExecutionEngine<T> {
    executor: TaskExecutor<T>,
    event_handlers: Vec<EventHandler>,
}

impl<T: Toolkit> ExecutionEngine<T> {
    pub fn new(toolkit: T) -> Self {
        Self {
            executor: TaskExecutor::new(toolkit),
            event_handlers: Vec::new(),
        }
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
    }

    /// Emit an event to all handlers
    fn emit_event(&self, event: ExecutionEvent) {
        for handler in &self.event_handlers {
            handler(event.clone());
        }
    }

    /// Execute the entire pipeline
    ///
    /// Task failures are recorded on the pipeline, not returned; an `Err`
    /// means the run could not be carried out at all.
    pub async fn execute(
        &self,
        pipeline: &mut Pipeline,
        context: &mut RunContext,
    ) -> Result<ExecutionStatus, ExecutionError> {
        let run_id = context.run_id;
        pipeline.state.run_id = run_id;
        let pipeline_name = pipeline.name.clone();

        info!("Starting pipeline execution: {} ({})", pipeline_name, run_id);
        pipeline.state.start(pipeline.tasks.len());
        self.emit_event(ExecutionEvent::PipelineStarted {
            run_id,
            pipeline_name: pipeline_name.clone(),
            total_tasks: pipeline.tasks.len(),
        });

        let order = pipeline.execution_order().to_vec();
        for task_id in &order {
            self.execute_task(pipeline, context, task_id).await?;
            self.update_state_counts(pipeline);
        }

        let status = if pipeline.state.failed_tasks > 0 {
            pipeline.state.fail();
            ExecutionStatus::Failed
        } else {
            pipeline.state.complete();
            ExecutionStatus::Completed
        };

        info!("Pipeline execution finished: {} - {:?}", pipeline_name, status);
        self.emit_event(ExecutionEvent::PipelineCompleted { run_id, status });

        Ok(status)
    }

    /// Execute a single task
    async fn execute_task(
        &self,
        pipeline: &mut Pipeline,
        context: &mut RunContext,
        task_id: &str,
    ) -> Result<(), ExecutionError> {
        let task = match pipeline.task(task_id).cloned() {
            Some(t) => t,
            None => return Ok(()),
        };

        // Skipped already, as a dependent of an earlier failure
        if task.state.is_terminal() {
            return Ok(());
        }

        let completed = pipeline.completed_tasks();
        if !task.dependencies_met(&completed) {
            let reason = "a producer did not complete".to_string();
            self.mark_task_skipped(pipeline, task_id, reason);
            return Ok(());
        }

        let io = context.io_for(&task)?;
        let started_at = chrono::Utc::now();
        if let Some(t) = pipeline.task_mut(task_id) {
            t.state = TaskState::Running { started_at };
        }
        self.emit_event(ExecutionEvent::TaskStarted {
            task_id: task_id.to_string(),
        });

        match self.executor.execute(&task, &io).await {
            ExecutionResult::Success { outputs } => {
                context.record_outputs(task_id, &outputs);
                if let Some(t) = pipeline.task_mut(task_id) {
                    t.state = TaskState::Completed {
                        outputs: outputs.clone(),
                        started_at,
                        completed_at: chrono::Utc::now(),
                    };
                }
                self.emit_event(ExecutionEvent::TaskCompleted {
                    task_id: task_id.to_string(),
                    outputs,
                });
            }
            ExecutionResult::Failed { error } => {
                error!("Task {} failed: {}", task_id, error);
                if let Some(t) = pipeline.task_mut(task_id) {
                    t.state = TaskState::Failed {
                        error: error.clone(),
                        started_at,
                        failed_at: chrono::Utc::now(),
                    };
                }
                self.emit_event(ExecutionEvent::TaskFailed {
                    task_id: task_id.to_string(),
                    error,
                });

                for dependent in pipeline.dependents_of(task_id) {
                    let reason = format!("depends on failed task '{}'", task_id);
                    self.mark_task_skipped(pipeline, &dependent, reason);
                }
            }
        }

        Ok(())
    }

    /// Mark a task as skipped
    fn mark_task_skipped(&self, pipeline: &mut Pipeline, task_id: &str, reason: String) {
        if let Some(task) = pipeline.task_mut(task_id) {
            if task.state.is_terminal() {
                return;
            }
            warn!("Skipping task {}: {}", task_id, reason);
            task.state = TaskState::Skipped {
                reason: reason.clone(),
            };
        }
        self.emit_event(ExecutionEvent::TaskSkipped {
            task_id: task_id.to_string(),
            reason,
        });
    }

    /// Update pipeline state counts
    fn update_state_counts(&self, pipeline: &mut Pipeline) {
        let mut completed = 0;
        let mut failed = 0;
        let mut skipped = 0;

        for task in pipeline.tasks.values() {
            match &task.state {
                TaskState::Completed { .. } => completed += 1,
                TaskState::Failed { .. } => failed += 1,
                TaskState::Skipped { .. } => skipped += 1,
                _ => {}
            }
        }

        pipeline.state.completed_tasks = completed;
        pipeline.state.failed_tasks = failed;
        pipeline.state.skipped_tasks = skipped;
    }
}
