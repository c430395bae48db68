//! Compilation of a pipeline graph into a workflow definition

pub mod definition;

use crate::core::{config::PipelineConfig, InputSource, Pipeline, Task};
use definition::{
    ArtifactBinding, ArtifactSpec, CachingOptions, ComponentRef, ComponentSpec, ContainerSpec,
    DagSpec, DagTask, DeploymentSpec, ExecutorSpec, InterfaceDefinitions, ParameterBinding,
    ParameterSpec, PipelineInfo, RootSpec, TaskInfo, TaskInputs, TaskOutputArtifact,
    SCHEMA_VERSION,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

pub use definition::PipelineDefinition;

/// Subcommand the compiled containers invoke
pub const RUN_TASK_COMMAND: &str = "run-task";

/// Error types for compilation
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Failed to encode parameters of task '{task}': {source}")]
    Params {
        task: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize definition: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Lower-case, dash-separated form of a display name
pub fn sanitize_name(name: &str) -> String {
    let mut sanitized = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            sanitized.push(c.to_ascii_lowercase());
        } else if !sanitized.is_empty() && !sanitized.ends_with('-') {
            sanitized.push('-');
        }
    }
    sanitized.trim_end_matches('-').to_string()
}

fn component_name(task_id: &str) -> String {
    format!("comp-{}", task_id)
}

fn executor_name(task_id: &str) -> String {
    format!("exec-{}", task_id)
}

/// Turns a [`Pipeline`] into a [`PipelineDefinition`]
#[derive(Debug, Clone)]
pub struct Compiler {
    image: String,
    command: Vec<String>,
}

impl Compiler {
    /// `command` is the executable prefix inside `image`
    pub fn new(image: impl Into<String>, command: Vec<String>) -> Self {
        Self {
            image: image.into(),
            command,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(&config.image, config.task_command.clone())
    }

    /// Compile the graph
    pub fn compile(&self, pipeline: &Pipeline) -> Result<PipelineDefinition, CompileError> {
        let mut components = BTreeMap::new();
        let mut executors = BTreeMap::new();
        let mut tasks = BTreeMap::new();

        for task_id in pipeline.execution_order() {
            let Some(task) = pipeline.task(task_id) else {
                continue;
            };
            debug!("Compiling task {}", task.id);

            components.insert(component_name(&task.id), self.component_spec(task));
            executors.insert(
                executor_name(&task.id),
                ExecutorSpec {
                    container: self.container_spec(task)?,
                },
            );
            tasks.insert(task.id.clone(), self.dag_task(task));
        }

        let root_parameters: BTreeMap<String, ParameterSpec> = pipeline
            .parameters
            .iter()
            .map(|(name, default)| (name.clone(), ParameterSpec::string_with_default(default)))
            .collect();

        Ok(PipelineDefinition {
            components,
            deployment_spec: DeploymentSpec { executors },
            pipeline_info: PipelineInfo {
                description: Some(pipeline.description.clone()).filter(|d| !d.is_empty()),
                name: sanitize_name(&pipeline.name),
            },
            root: RootSpec {
                dag: DagSpec { tasks },
                input_definitions: (!root_parameters.is_empty()).then(|| InterfaceDefinitions {
                    artifacts: BTreeMap::new(),
                    parameters: root_parameters,
                }),
            },
            schema_version: SCHEMA_VERSION.to_string(),
            sdk_version: format!("md-pipeline-{}", env!("CARGO_PKG_VERSION")),
        })
    }

    /// Compile to the YAML document
    pub fn compile_to_string(&self, pipeline: &Pipeline) -> Result<String, CompileError> {
        Ok(self.compile(pipeline)?.to_yaml()?)
    }

    /// Compile and write the definition file, creating parent directories
    pub fn compile_to_file(&self, pipeline: &Pipeline, path: &Path) -> Result<String, CompileError> {
        let yaml = self.compile_to_string(pipeline)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| CompileError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, &yaml).map_err(|source| CompileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Wrote workflow definition to {}", path.display());
        Ok(yaml)
    }

    fn component_spec(&self, task: &Task) -> ComponentSpec {
        let kind = task.kind();

        let mut inputs = InterfaceDefinitions::default();
        for name in kind.parameter_inputs() {
            inputs
                .parameters
                .insert(name.to_string(), ParameterSpec::string());
        }
        for name in kind.artifact_inputs() {
            inputs
                .artifacts
                .insert(name.to_string(), ArtifactSpec::default());
        }

        let mut outputs = InterfaceDefinitions::default();
        for name in kind.outputs() {
            outputs
                .artifacts
                .insert(name.to_string(), ArtifactSpec::default());
        }

        let is_empty = |defs: &InterfaceDefinitions| {
            defs.artifacts.is_empty() && defs.parameters.is_empty()
        };

        ComponentSpec {
            executor_label: executor_name(&task.id),
            input_definitions: Some(inputs).filter(|d| !is_empty(d)),
            output_definitions: Some(outputs).filter(|d| !is_empty(d)),
        }
    }

    fn container_spec(&self, task: &Task) -> Result<ContainerSpec, CompileError> {
        let kind = task.kind();
        let params = task
            .component
            .params_json()
            .map_err(|source| CompileError::Params {
                task: task.id.clone(),
                source,
            })?;

        let mut args = vec![
            "--component".to_string(),
            kind.name().to_string(),
            "--params".to_string(),
            params,
        ];
        for name in kind.parameter_inputs() {
            args.push("--parameter".to_string());
            args.push(format!("{}={{{{$.inputs.parameters['{}']}}}}", name, name));
        }
        for name in kind.artifact_inputs() {
            args.push("--input".to_string());
            args.push(format!("{}={{{{$.inputs.artifacts['{}'].path}}}}", name, name));
        }
        for name in kind.outputs() {
            args.push("--output".to_string());
            args.push(format!("{}={{{{$.outputs.artifacts['{}'].path}}}}", name, name));
        }

        let mut command = self.command.clone();
        command.push(RUN_TASK_COMMAND.to_string());

        Ok(ContainerSpec {
            args,
            command,
            image: self.image.clone(),
        })
    }

    fn dag_task(&self, task: &Task) -> DagTask {
        let mut inputs = TaskInputs::default();
        for (input, source) in &task.inputs {
            match source {
                InputSource::Parameter(parameter) => {
                    inputs.parameters.insert(
                        input.clone(),
                        ParameterBinding {
                            component_input_parameter: parameter.clone(),
                        },
                    );
                }
                InputSource::TaskOutput { producer, output } => {
                    inputs.artifacts.insert(
                        input.clone(),
                        ArtifactBinding {
                            task_output_artifact: TaskOutputArtifact {
                                output_artifact_key: output.clone(),
                                producer_task: producer.clone(),
                            },
                        },
                    );
                }
            }
        }

        DagTask {
            caching_options: CachingOptions { enable_cache: true },
            component_ref: ComponentRef {
                name: component_name(&task.id),
            },
            dependent_tasks: task.dependencies.clone(),
            inputs: (!task.inputs.is_empty()).then_some(inputs),
            task_info: TaskInfo {
                name: task.id.clone(),
            },
        }
    }
}
