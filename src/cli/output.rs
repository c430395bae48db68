//! CLI output formatting

use crate::{
    client::Registration,
    core::{ExecutionStatus, Task, TaskState},
    execution::ExecutionEvent,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Create a progress bar
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    progress.set_style(style);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Format a task state for display
pub fn format_task_state(state: &TaskState) -> String {
    match state {
        TaskState::Pending => style("PENDING").dim().to_string(),
        TaskState::Running { .. } => style("RUNNING").yellow().to_string(),
        TaskState::Completed { .. } => style("COMPLETED").green().to_string(),
        TaskState::Failed { .. } => style("FAILED").red().to_string(),
        TaskState::Skipped { .. } => style("SKIPPED").dim().to_string(),
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

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::PipelineStarted {
            run_id,
            pipeline_name,
            total_tasks,
        } => format!(
            "{} Starting pipeline {} ({}, {} tasks)",
            ROCKET,
            style(pipeline_name).bold(),
            style(&run_id.to_string()[..8]).dim(),
            total_tasks
        ),
        ExecutionEvent::TaskStarted { task_id } => {
            format!("{} {}", SPINNER, style(task_id).cyan())
        }
        ExecutionEvent::TaskCompleted { task_id, outputs } => {
            let mut line = format!("{} {}", CHECK, style(task_id).green());
            for (name, path) in outputs {
                line.push_str(&format!(
                    "\n    {} {}",
                    style(format!("{}:", name)).dim(),
                    path.display()
                ));
            }
            line
        }
        ExecutionEvent::TaskFailed { task_id, error } => {
            format!("{} {}: {}", CROSS, style(task_id).red(), style(error).dim())
        }
        ExecutionEvent::TaskSkipped { task_id, reason } => {
            format!("{} {} ({})", WARN, style(task_id).yellow(), reason)
        }
        ExecutionEvent::PipelineCompleted { run_id, status } => {
            let status_str = match status {
                ExecutionStatus::Completed => {
                    format!("{} completed", style("successfully").green())
                }
                ExecutionStatus::Failed => style("failed").red().to_string(),
                _ => format_status(*status),
            };
            format!(
                "{} Pipeline ({}) {}",
                INFO,
                style(&run_id.to_string()[..8]).dim(),
                status_str
            )
        }
    }
}

/// Format a task as its id and what its component does
pub fn format_task_summary(task: &Task) -> String {
    format!(
        "{}  {}",
        style(&task.id).cyan(),
        style(task.kind().description()).dim()
    )
}

/// Format the registration step of a submission
pub fn format_registration(registration: &Registration) -> String {
    match registration {
        Registration::Created { pipeline_id } => format!(
            "{} Created pipeline {}",
            CHECK,
            style(pipeline_id).cyan()
        ),
        Registration::Updated {
            pipeline_id,
            version_name,
            ..
        } => format!(
            "{} Uploaded {} to pipeline {}",
            CHECK,
            style(version_name).bold(),
            style(pipeline_id).cyan()
        ),
    }
}

/// Format a duration as `1h 2m 3s`
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
