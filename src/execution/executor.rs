//! Task executor - runs individual tasks with the toolkit

use crate::{
    core::{
        params::{validate_pdb_code, MinimizeParams, ParamsError, TopologyParams},
        Component, ComponentKind, PipelineError, Task, TaskIo,
    },
    toolkit::{MinimizationRequest, Toolkit, ToolkitError, TopologyRequest},
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info};

/// Error types for task execution
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Task '{task}' is missing parameter '{name}'")]
    MissingParameter { task: String, name: String },

    #[error("Task '{task}' is missing input artifact '{name}'")]
    MissingInput { task: String, name: String },

    #[error("Task '{task}' has no destination for output '{name}'")]
    MissingOutput { task: String, name: String },

    #[error("Failed to {action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Params(#[from] ParamsError),

    #[error(transparent)]
    Toolkit(#[from] ToolkitError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Result of executing a task
#[derive(Debug, Clone)]
pub enum ExecutionResult {
    /// Task completed and wrote every declared output
    Success { outputs: BTreeMap<String, PathBuf> },
    /// Task failed; nothing is retried
    Failed { error: String },
}

fn io_error(action: &'static str, path: &Path) -> impl FnOnce(std::io::Error) -> ExecutionError {
    let path = path.to_path_buf();
    move |source| ExecutionError::Io {
        action,
        path,
        source,
    }
}

/// Scratch file prefix of each minimization pass
fn minimization_prefix(kind: ComponentKind) -> &'static str {
    match kind {
        ComponentKind::RestrainedMinimization => "sander.h_min",
        _ => "sander.n_min",
    }
}

/// Executes a single task
pub struct TaskExecutor<T> {
    toolkit: T,
}

impl<T: Toolkit> TaskExecutor<T> {
    pub fn new(toolkit: T) -> Self {
        Self { toolkit }
    }

    pub fn toolkit(&self) -> &T {
        &self.toolkit
    }

    /// Execute a task and return the result
    pub async fn execute(&self, task: &Task, io: &TaskIo) -> ExecutionResult {
        info!("Executing task: {}", task.id);

        match self.run(task, io).await {
            Ok(outputs) => {
                info!("Task {} completed successfully", task.id);
                ExecutionResult::Success { outputs }
            }
            Err(e) => {
                error!("Task {} failed: {}", task.id, e);
                ExecutionResult::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    /// Execute a task, propagating the error
    pub async fn run(
        &self,
        task: &Task,
        io: &TaskIo,
    ) -> Result<BTreeMap<String, PathBuf>, ExecutionError> {
        let mut staging = Staging::open(task, io).await?;

        match &task.component {
            Component::FetchStructure(params) => {
                let pdb_code = staging.parameter("pdb_code")?;
                validate_pdb_code(pdb_code)?;
                let local = staging.local(&format!("{}.pdb", pdb_code));
                self.toolkit
                    .fetch_structure(pdb_code, params, &local)
                    .await?;
                staging.collect(&local, "structure").await?;
            }
            Component::PrepareStructure(params) => {
                let input = staging.stage("structure", "input.pdb").await?;
                let output = staging.local("output.pdb");
                self.toolkit.repair_structure(&input, &output, params).await?;
                staging.collect(&output, "prepared_structure").await?;
            }
            Component::BuildTopology(params) => {
                self.build_topology(&mut staging, params).await?;
            }
            Component::RestrainedMinimization(params) => {
                let topology = staging.stage("topology", "system.top").await?;
                let coordinates = staging.stage("coordinates", "system.crd").await?;
                self.minimize(&mut staging, task.kind(), params, &topology, &coordinates)
                    .await?;
            }
            Component::UnrestrainedMinimization(params) => {
                let topology = staging.stage("topology", "system.top").await?;
                let restart = staging.stage("restart", "previous_min.rst").await?;
                self.minimize(&mut staging, task.kind(), params, &topology, &restart)
                    .await?;
            }
        }

        Ok(staging.collected)
    }

    async fn build_topology(
        &self,
        staging: &mut Staging<'_>,
        params: &TopologyParams,
    ) -> Result<(), ExecutionError> {
        let input = staging.stage("structure", "input.pdb").await?;
        let output_pdb = staging.local("output.pdb");
        let output_top = staging.local("system.top");
        let output_crd = staging.local("system.crd");

        self.toolkit
            .generate_topology(&TopologyRequest {
                params,
                input_pdb: &input,
                output_pdb: &output_pdb,
                output_top: &output_top,
                output_crd: &output_crd,
                workdir: &staging.workdir,
            })
            .await?;

        staging.collect(&output_pdb, "regularized_structure").await?;
        staging.collect(&output_top, "topology").await?;
        staging.collect(&output_crd, "coordinates").await
    }

    async fn minimize(
        &self,
        staging: &mut Staging<'_>,
        kind: ComponentKind,
        params: &MinimizeParams,
        topology: &Path,
        coordinates: &Path,
    ) -> Result<(), ExecutionError> {
        let prefix = minimization_prefix(kind);
        let trajectory = staging.local(&format!("{}.x", prefix));
        let restart = staging.local(&format!("{}.rst", prefix));
        let log = staging.local(&format!("{}.log", prefix));
        let energy = staging.local(&format!("{}.energy.dat", prefix));

        // The starting coordinates double as the restraint reference
        let reference = params.mdin.is_restrained().then_some(coordinates);

        self.toolkit
            .run_minimization(&MinimizationRequest {
                params: &params.mdin,
                topology,
                coordinates,
                reference,
                trajectory: &trajectory,
                restart: &restart,
                log: &log,
                workdir: &staging.workdir,
            })
            .await?;
        info!("Minimization completed: {}", log.display());

        let series = self
            .toolkit
            .process_minout(&log, &energy, &params.energy_terms)
            .await?;
        info!("Extracted {} energy records", series.len());

        // Trajectory stays in scratch
        staging.collect(&restart, "restart").await?;
        staging.collect(&log, "log").await?;
        staging.collect(&energy, "energy").await
    }
}

/// Scratch directory of one task invocation
struct Staging<'a> {
    task: &'a Task,
    io: &'a TaskIo,
    workdir: PathBuf,
    collected: BTreeMap<String, PathBuf>,
}

impl<'a> Staging<'a> {
    async fn open(task: &'a Task, io: &'a TaskIo) -> Result<Staging<'a>, ExecutionError> {
        tokio::fs::create_dir_all(&io.workdir)
            .await
            .map_err(io_error("create", &io.workdir))?;
        // Tools run with the scratch directory as cwd, so paths must not be relative
        let workdir = tokio::fs::canonicalize(&io.workdir)
            .await
            .map_err(io_error("resolve", &io.workdir))?;

        for output in task.outputs() {
            if io.output(output).is_none() {
                return Err(ExecutionError::MissingOutput {
                    task: task.id.clone(),
                    name: output.to_string(),
                });
            }
        }

        Ok(Staging {
            task,
            io,
            workdir,
            collected: BTreeMap::new(),
        })
    }

    fn local(&self, name: &str) -> PathBuf {
        self.workdir.join(name)
    }

    fn parameter(&self, name: &str) -> Result<&'a str, ExecutionError> {
        self.io
            .parameter(name)
            .ok_or_else(|| ExecutionError::MissingParameter {
                task: self.task.id.clone(),
                name: name.to_string(),
            })
    }

    /// Copy an input artifact to its fixed local name
    async fn stage(&self, input: &str, local_name: &str) -> Result<PathBuf, ExecutionError> {
        let source = self
            .io
            .input(input)
            .ok_or_else(|| ExecutionError::MissingInput {
                task: self.task.id.clone(),
                name: input.to_string(),
            })?;
        let local = self.local(local_name);

        tokio::fs::copy(source, &local)
            .await
            .map_err(io_error("stage", source))?;
        info!("Copied input {} from {} to {}", input, source.display(), local.display());
        Ok(local)
    }

    /// Copy a local tool output to the declared artifact path
    async fn collect(&mut self, local: &Path, output: &str) -> Result<(), ExecutionError> {
        let destination = self
            .io
            .output(output)
            .ok_or_else(|| ExecutionError::MissingOutput {
                task: self.task.id.clone(),
                name: output.to_string(),
            })?
            .to_path_buf();

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(io_error("create", parent))?;
        }
        tokio::fs::copy(local, &destination)
            .await
            .map_err(io_error("collect", local))?;
        debug!("Collected {} -> {}", local.display(), destination.display());
        info!("  {}: {}", output, destination.display());

        self.collected.insert(output.to_string(), destination);
        Ok(())
    }
}
