//! Execution state models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use uuid::Uuid;

/// Overall pipeline execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Pipeline has not started
    Pending,
    /// Pipeline is currently running
    Running,
    /// Every task completed
    Completed,
    /// At least one task failed
    Failed,
}

/// State of a single task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TaskState {
    /// Task is waiting for its producers
    Pending,
    /// Task is currently running
    Running {
        started_at: DateTime<Utc>,
    },
    /// Task completed and wrote its outputs
    Completed {
        outputs: BTreeMap<String, PathBuf>,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    },
    /// Task failed; no retry is attempted
    Failed {
        error: String,
        started_at: DateTime<Utc>,
        failed_at: DateTime<Utc>,
    },
    /// Task never ran because a producer did not complete
    Skipped {
        reason: String,
    },
}

impl TaskState {
    /// Check if task is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed { .. } | TaskState::Failed { .. } | TaskState::Skipped { .. }
        )
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, TaskState::Completed { .. })
    }
}

/// Overall pipeline state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineState {
    /// Unique run ID
    pub run_id: Uuid,

    /// Current execution status
    pub status: ExecutionStatus,

    /// When execution started
    pub started_at: Option<DateTime<Utc>>,

    /// When execution completed/failed
    pub completed_at: Option<DateTime<Utc>>,

    /// Total number of tasks
    pub total_tasks: usize,

    /// Number of completed tasks
    pub completed_tasks: usize,

    /// Number of failed tasks
    pub failed_tasks: usize,

    /// Number of skipped tasks
    pub skipped_tasks: usize,
}

impl PipelineState {
    /// Create a new pipeline state
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            status: ExecutionStatus::Pending,
            started_at: None,
            completed_at: None,
            total_tasks: 0,
            completed_tasks: 0,
            failed_tasks: 0,
            skipped_tasks: 0,
        }
    }

    /// Mark pipeline as started
    pub fn start(&mut self, total_tasks: usize) {
        self.status = ExecutionStatus::Running;
        self.started_at = Some(Utc::now());
        self.total_tasks = total_tasks;
    }

    /// Mark pipeline as completed
    pub fn complete(&mut self) {
        self.status = ExecutionStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    /// Mark pipeline as failed
    pub fn fail(&mut self) {
        self.status = ExecutionStatus::Failed;
        self.completed_at = Some(Utc::now());
    }

    /// Calculate progress (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        if self.total_tasks == 0 {
            return 0.0;
        }
        (self.completed_tasks + self.failed_tasks + self.skipped_tasks) as f64
            / self.total_tasks as f64
    }
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::new()
    }
}
