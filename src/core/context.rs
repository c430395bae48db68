//! Run context - artifact layout and bindings for a local run

use crate::core::{InputSource, PipelineError, Task};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Resolved paths and values for one task invocation
///
/// This is what `run-task` receives on its command line, and what the
/// local runner builds from the artifact layout.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskIo {
    /// Parameter input name -> value
    pub parameters: BTreeMap<String, String>,

    /// Artifact input name -> existing file
    pub inputs: BTreeMap<String, PathBuf>,

    /// Output name -> path the task must write
    pub outputs: BTreeMap<String, PathBuf>,

    /// Scratch directory for staged files and tool outputs
    pub workdir: PathBuf,
}

impl TaskIo {
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    pub fn input(&self, name: &str) -> Option<&Path> {
        self.inputs.get(name).map(PathBuf::as_path)
    }

    pub fn output(&self, name: &str) -> Option<&Path> {
        self.outputs.get(name).map(PathBuf::as_path)
    }
}

/// Execution context for a local pipeline run
///
/// Artifacts live at `<root>/<run id>/<task>/<output>`; once a task
/// completes its outputs are recorded and never rewritten.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Artifact root directory
    pub root: PathBuf,

    /// Unique run ID
    pub run_id: Uuid,

    /// Run parameter values
    pub parameters: BTreeMap<String, String>,

    /// Produced artifacts, keyed by (producer, output)
    artifacts: BTreeMap<(String, String), PathBuf>,
}

impl RunContext {
    /// Create a new context with the given run parameters
    pub fn new(root: impl Into<PathBuf>, run_id: Uuid, parameters: BTreeMap<String, String>) -> Self {
        Self {
            root: root.into(),
            run_id,
            parameters,
            artifacts: BTreeMap::new(),
        }
    }

    /// Directory holding everything this run produces
    pub fn run_dir(&self) -> PathBuf {
        self.root.join(self.run_id.to_string())
    }

    /// Directory holding a task's output artifacts
    pub fn task_dir(&self, task_id: &str) -> PathBuf {
        self.run_dir().join(task_id)
    }

    /// Path of an output artifact
    pub fn artifact_path(&self, task_id: &str, output: &str) -> PathBuf {
        self.task_dir(task_id).join(output)
    }

    /// Path of a produced artifact, if its producer completed
    pub fn artifact(&self, producer: &str, output: &str) -> Option<&Path> {
        self.artifacts
            .get(&(producer.to_string(), output.to_string()))
            .map(PathBuf::as_path)
    }

    /// Record the outputs of a completed task
    pub fn record_outputs(&mut self, task_id: &str, outputs: &BTreeMap<String, PathBuf>) {
        for (output, path) in outputs {
            self.artifacts
                .entry((task_id.to_string(), output.clone()))
                .or_insert_with(|| path.clone());
        }
    }

    /// Resolve the bindings of `task` against this run
    pub fn io_for(&self, task: &Task) -> Result<TaskIo, PipelineError> {
        let mut io = TaskIo {
            workdir: self.task_dir(&task.id).join("work"),
            ..TaskIo::default()
        };

        for (input, source) in &task.inputs {
            match source {
                InputSource::Parameter(parameter) => {
                    let value = self.parameters.get(parameter).ok_or_else(|| {
                        PipelineError::MissingParameterValue {
                            task: task.id.clone(),
                            parameter: parameter.clone(),
                        }
                    })?;
                    io.parameters.insert(input.clone(), value.clone());
                }
                InputSource::TaskOutput { producer, output } => {
                    let path = self.artifact(producer, output).ok_or_else(|| {
                        PipelineError::MissingArtifact {
                            task: task.id.clone(),
                            producer: producer.clone(),
                            output: output.clone(),
                        }
                    })?;
                    io.inputs.insert(input.clone(), path.to_path_buf());
                }
            }
        }

        for output in task.outputs() {
            io.outputs
                .insert(output.to_string(), self.artifact_path(&task.id, output));
        }

        Ok(io)
    }
}
