//! Pipeline domain model

use crate::core::{
    config::PipelineConfig,
    params::{MinimizeParams, ParamsError},
    state::{ExecutionStatus, PipelineState, TaskState},
    task::{Component, ComponentKind, InputSource, Task},
};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

/// Run parameter carrying the structure identifier
pub const PDB_CODE_PARAMETER: &str = "pdb_code";

/// Wiring and validation errors for a pipeline graph
#[derive(Debug, Error, PartialEq)]
pub enum PipelineError {
    #[error("Duplicate task ID: {0}")]
    DuplicateTask(String),

    #[error("Task '{task}' has invalid parameters: {source}")]
    InvalidParams {
        task: String,
        #[source]
        source: ParamsError,
    },

    #[error("Task '{task}' does not bind its input '{input}'")]
    UnboundInput { task: String, input: String },

    #[error("Task '{task}' binds '{input}', which its component does not accept")]
    UnexpectedInput { task: String, input: String },

    #[error("Task '{task}' binds '{input}' to the wrong kind of source")]
    WrongInputKind { task: String, input: String },

    #[error("Task '{task}' reads undeclared run parameter '{parameter}'")]
    UnknownParameter { task: String, parameter: String },

    #[error("Task '{task}' input '{input}' references non-existent task '{producer}'")]
    UnknownProducer {
        task: String,
        input: String,
        producer: String,
    },

    #[error("Task '{task}' reads '{output}' from '{producer}', which does not declare it")]
    UndeclaredOutput {
        task: String,
        producer: String,
        output: String,
    },

    #[error("Cycle detected in dependency graph involving task '{0}'")]
    Cycle(String),

    #[error("Task '{task}' needs '{output}' from '{producer}', which has not been produced")]
    MissingArtifact {
        task: String,
        producer: String,
        output: String,
    },

    #[error("No value for run parameter '{parameter}' needed by task '{task}'")]
    MissingParameterValue { task: String, parameter: String },
}

/// A data edge of the graph: `producer.output -> consumer.input`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Edge {
    pub producer: String,
    pub output: String,
    pub consumer: String,
    pub input: String,
}

/// A validated workflow graph
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Display name
    pub name: String,

    pub description: String,

    /// Version label used when registering updates
    pub version: String,

    /// Run parameters and their default values
    pub parameters: BTreeMap<String, String>,

    /// Tasks keyed by id
    pub tasks: BTreeMap<String, Task>,

    /// Execution state (local runs)
    pub state: PipelineState,

    /// Task execution order (topological sort)
    execution_order: Vec<String>,
}

/// Incremental construction of a [`Pipeline`]
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    name: String,
    description: String,
    version: String,
    parameters: BTreeMap<String, String>,
    tasks: Vec<Task>,
}

impl PipelineBuilder {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Declare a run parameter with its default value
    pub fn parameter(mut self, name: impl Into<String>, default: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), default.into());
        self
    }

    pub fn task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    /// Validate the wiring and produce the pipeline
    pub fn build(self) -> Result<Pipeline, PipelineError> {
        let mut tasks = BTreeMap::new();
        for task in self.tasks {
            if tasks.contains_key(&task.id) {
                return Err(PipelineError::DuplicateTask(task.id));
            }
            tasks.insert(task.id.clone(), task);
        }

        for task in tasks.values() {
            Self::validate_task(task, &tasks, &self.parameters)?;
        }

        Pipeline::check_cycles(&tasks)?;
        let execution_order = Pipeline::topological_sort(&tasks);

        Ok(Pipeline {
            name: self.name,
            description: self.description,
            version: self.version,
            parameters: self.parameters,
            tasks,
            state: PipelineState::new(),
            execution_order,
        })
    }

    fn validate_task(
        task: &Task,
        tasks: &BTreeMap<String, Task>,
        parameters: &BTreeMap<String, String>,
    ) -> Result<(), PipelineError> {
        let kind = task.kind();

        task.component
            .validate()
            .map_err(|source| PipelineError::InvalidParams {
                task: task.id.clone(),
                source,
            })?;

        for input in kind
            .parameter_inputs()
            .iter()
            .chain(kind.artifact_inputs().iter())
        {
            if !task.inputs.contains_key(*input) {
                return Err(PipelineError::UnboundInput {
                    task: task.id.clone(),
                    input: input.to_string(),
                });
            }
        }

        for (input, source) in &task.inputs {
            if !kind.accepts_input(input) {
                return Err(PipelineError::UnexpectedInput {
                    task: task.id.clone(),
                    input: input.clone(),
                });
            }

            let expects_parameter = kind.parameter_inputs().contains(&input.as_str());
            match source {
                InputSource::Parameter(parameter) => {
                    if !expects_parameter {
                        return Err(PipelineError::WrongInputKind {
                            task: task.id.clone(),
                            input: input.clone(),
                        });
                    }
                    if !parameters.contains_key(parameter) {
                        return Err(PipelineError::UnknownParameter {
                            task: task.id.clone(),
                            parameter: parameter.clone(),
                        });
                    }
                }
                InputSource::TaskOutput { producer, output } => {
                    if expects_parameter {
                        return Err(PipelineError::WrongInputKind {
                            task: task.id.clone(),
                            input: input.clone(),
                        });
                    }
                    let producer_task =
                        tasks
                            .get(producer)
                            .ok_or_else(|| PipelineError::UnknownProducer {
                                task: task.id.clone(),
                                input: input.clone(),
                                producer: producer.clone(),
                            })?;
                    if !producer_task.outputs().contains(&output.as_str()) {
                        return Err(PipelineError::UndeclaredOutput {
                            task: task.id.clone(),
                            producer: producer.clone(),
                            output: output.clone(),
                        });
                    }
                }
            }
        }

        Ok(())
    }
}

impl Pipeline {
    /// Start building a pipeline
    pub fn builder(name: impl Into<String>) -> PipelineBuilder {
        PipelineBuilder {
            name: name.into(),
            description: String::new(),
            version: String::new(),
            parameters: BTreeMap::new(),
            tasks: Vec::new(),
        }
    }

    /// Build the molecular dynamics preparation graph
    ///
    /// fetch -> prepare -> topology -> restrained minimization, with the
    /// unrestrained pass reading the topology and the first restart.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, PipelineError> {
        let fetch = ComponentKind::FetchStructure.name();
        let prepare = ComponentKind::PrepareStructure.name();
        let topology = ComponentKind::BuildTopology.name();
        let restrained = ComponentKind::RestrainedMinimization.name();
        let unrestrained = ComponentKind::UnrestrainedMinimization.name();

        let minimize = |mdin: &crate::core::params::MinimizationParams| {
            MinimizeParams::new(mdin.clone(), config.energy_terms.clone())
        };

        Pipeline::builder(&config.name)
            .description(&config.description)
            .version(&config.version)
            .parameter(PDB_CODE_PARAMETER, &config.pdb_code)
            .task(
                Task::new(fetch, Component::FetchStructure(config.fetch.clone()))
                    .with_parameter(PDB_CODE_PARAMETER, PDB_CODE_PARAMETER),
            )
            .task(
                Task::new(prepare, Component::PrepareStructure(config.prepare.clone()))
                    .with_artifact("structure", fetch, "structure"),
            )
            .task(
                Task::new(topology, Component::BuildTopology(config.topology.clone()))
                    .with_artifact("structure", prepare, "prepared_structure"),
            )
            .task(
                Task::new(
                    restrained,
                    Component::RestrainedMinimization(minimize(&config.restrained_minimization)),
                )
                .with_artifact("topology", topology, "topology")
                .with_artifact("coordinates", topology, "coordinates"),
            )
            .task(
                Task::new(
                    unrestrained,
                    Component::UnrestrainedMinimization(minimize(
                        &config.unrestrained_minimization,
                    )),
                )
                .with_artifact("topology", topology, "topology")
                .with_artifact("restart", restrained, "restart"),
            )
            .build()
    }

    /// Get a task by ID
    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    /// Get a mutable task by ID
    pub fn task_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.get_mut(id)
    }

    /// Check if every task reached a terminal state
    pub fn is_complete(&self) -> bool {
        self.tasks.values().all(|t| t.state.is_terminal())
    }

    /// Check if pipeline has failed
    pub fn has_failed(&self) -> bool {
        self.state.status == ExecutionStatus::Failed
    }

    /// Get execution order (topological sort)
    pub fn execution_order(&self) -> &[String] {
        &self.execution_order
    }

    /// All data edges, sorted
    pub fn edges(&self) -> Vec<Edge> {
        let mut edges: Vec<Edge> = self
            .tasks
            .values()
            .flat_map(|task| {
                task.artifact_inputs().map(|(input, producer, output)| Edge {
                    producer: producer.to_string(),
                    output: output.to_string(),
                    consumer: task.id.clone(),
                    input: input.to_string(),
                })
            })
            .collect();
        edges.sort();
        edges
    }

    /// Tasks reading `producer.output`
    pub fn consumers_of(&self, producer: &str, output: &str) -> Vec<&str> {
        self.tasks
            .values()
            .filter(|task| {
                task.artifact_inputs()
                    .any(|(_, p, o)| p == producer && o == output)
            })
            .map(|task| task.id.as_str())
            .collect()
    }

    /// Outputs no task consumes, i.e. the final artifacts of a run
    pub fn terminal_outputs(&self) -> Vec<(&str, &'static str)> {
        self.execution_order
            .iter()
            .filter_map(|id| self.tasks.get(id))
            .flat_map(|task| {
                task.outputs()
                    .iter()
                    .map(move |output| (task.id.as_str(), *output))
            })
            .filter(|(task, output)| self.consumers_of(task, output).is_empty())
            .collect()
    }

    /// Tasks that transitively depend on `task_id`
    pub fn dependents_of(&self, task_id: &str) -> Vec<String> {
        let mut found: Vec<String> = Vec::new();
        let mut frontier = vec![task_id.to_string()];
        while let Some(current) = frontier.pop() {
            for task in self.tasks.values() {
                if task.dependencies.contains(&current) && !found.contains(&task.id) {
                    found.push(task.id.clone());
                    frontier.push(task.id.clone());
                }
            }
        }
        found.sort();
        found
    }

    /// Completed task ids
    pub fn completed_tasks(&self) -> HashSet<String> {
        self.tasks
            .values()
            .filter(|t| matches!(t.state, TaskState::Completed { .. }))
            .map(|t| t.id.clone())
            .collect()
    }

    /// Check for cycles in the task dependency graph
    fn check_cycles(tasks: &BTreeMap<String, Task>) -> Result<(), PipelineError> {
        let mut visited = HashSet::new();
        let mut recursion_stack = HashSet::new();

        for id in tasks.keys() {
            if !visited.contains(id) {
                Self::dfs_check(id, tasks, &mut visited, &mut recursion_stack)?;
            }
        }

        Ok(())
    }

    fn dfs_check(
        task_id: &str,
        tasks: &BTreeMap<String, Task>,
        visited: &mut HashSet<String>,
        recursion_stack: &mut HashSet<String>,
    ) -> Result<(), PipelineError> {
        visited.insert(task_id.to_string());
        recursion_stack.insert(task_id.to_string());

        if let Some(task) = tasks.get(task_id) {
            for dep in &task.dependencies {
                if recursion_stack.contains(dep) {
                    return Err(PipelineError::Cycle(dep.clone()));
                }
                if !visited.contains(dep) {
                    Self::dfs_check(dep, tasks, visited, recursion_stack)?;
                }
            }
        }

        recursion_stack.remove(task_id);
        Ok(())
    }

    /// Calculate topological sort of tasks based on dependencies
    fn topological_sort(tasks: &BTreeMap<String, Task>) -> Vec<String> {
        let mut result = Vec::new();
        let mut visited = HashSet::new();

        // BTreeMap keys are already sorted, so the order is deterministic
        for task_id in tasks.keys() {
            if !visited.contains(task_id) {
                Self::visit(task_id, tasks, &mut visited, &mut result);
            }
        }

        result
    }

    fn visit(
        task_id: &str,
        tasks: &BTreeMap<String, Task>,
        visited: &mut HashSet<String>,
        result: &mut Vec<String>,
    ) {
        if visited.contains(task_id) {
            return;
        }
        visited.insert(task_id.to_string());

        if let Some(task) = tasks.get(task_id) {
            for dep in &task.dependencies {
                Self::visit(dep, tasks, visited, result);
            }
        }

        result.push(task_id.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::params::{FetchParams, PrepareParams, TopologyParams};

    fn md_pipeline() -> Pipeline {
        PipelineConfig::default().to_pipeline().unwrap()
    }

    #[test]
    fn test_md_pipeline_has_five_tasks_in_order() {
        let pipeline = md_pipeline();
        assert_eq!(pipeline.tasks.len(), 5);
        assert_eq!(
            pipeline.execution_order(),
            &[
                "fetch-structure",
                "prepare-structure",
                "build-topology",
                "restrained-minimization",
                "unrestrained-minimization",
            ]
        );
        assert_eq!(pipeline.parameters.get("pdb_code"), Some(&"1aki".to_string()));
    }

    #[test]
    fn test_md_pipeline_edges() {
        let pipeline = md_pipeline();
        let edges: Vec<(String, String)> = pipeline
            .edges()
            .into_iter()
            .map(|e| (e.producer, e.consumer))
            .collect();

        assert_eq!(
            edges,
            vec![
                ("build-topology".to_string(), "restrained-minimization".to_string()),
                ("build-topology".to_string(), "restrained-minimization".to_string()),
                ("build-topology".to_string(), "unrestrained-minimization".to_string()),
                ("fetch-structure".to_string(), "prepare-structure".to_string()),
                ("prepare-structure".to_string(), "build-topology".to_string()),
                ("restrained-minimization".to_string(), "unrestrained-minimization".to_string()),
            ]
        );
    }

    #[test]
    fn test_unrestrained_reads_topology_and_restart() {
        let pipeline = md_pipeline();
        let task = pipeline.task("unrestrained-minimization").unwrap();
        let inputs: Vec<_> = task.artifact_inputs().collect();
        assert_eq!(
            inputs,
            vec![
                ("restart", "restrained-minimization", "restart"),
                ("topology", "build-topology", "topology"),
            ]
        );
        assert_eq!(
            task.dependencies,
            vec!["build-topology".to_string(), "restrained-minimization".to_string()]
        );
    }

    #[test]
    fn test_terminal_outputs() {
        let pipeline = md_pipeline();
        assert_eq!(
            pipeline.terminal_outputs(),
            vec![
                ("build-topology", "regularized_structure"),
                ("restrained-minimization", "log"),
                ("restrained-minimization", "energy"),
                ("unrestrained-minimization", "restart"),
                ("unrestrained-minimization", "log"),
                ("unrestrained-minimization", "energy"),
            ]
        );
        assert_eq!(
            pipeline.consumers_of("build-topology", "topology"),
            vec!["restrained-minimization", "unrestrained-minimization"]
        );
    }

    #[test]
    fn test_dependents_of() {
        let pipeline = md_pipeline();
        assert_eq!(
            pipeline.dependents_of("build-topology"),
            vec!["restrained-minimization".to_string(), "unrestrained-minimization".to_string()]
        );
        assert!(pipeline.dependents_of("unrestrained-minimization").is_empty());
    }

    #[test]
    fn test_undeclared_output_fails() {
        let result = Pipeline::builder("bad")
            .parameter("pdb_code", "1aki")
            .task(
                Task::new("fetch", Component::FetchStructure(FetchParams::default()))
                    .with_parameter("pdb_code", "pdb_code"),
            )
            .task(
                Task::new("prepare", Component::PrepareStructure(PrepareParams::default()))
                    .with_artifact("structure", "fetch", "output_pdb_file"),
            )
            .build();

        assert!(matches!(
            result,
            Err(PipelineError::UndeclaredOutput { ref output, .. }) if output == "output_pdb_file"
        ));
    }

    #[test]
    fn test_unknown_producer_fails() {
        let result = Pipeline::builder("bad")
            .task(
                Task::new("prepare", Component::PrepareStructure(PrepareParams::default()))
                    .with_artifact("structure", "nonexistent", "structure"),
            )
            .build();

        assert!(matches!(result, Err(PipelineError::UnknownProducer { .. })));
    }

    #[test]
    fn test_unbound_and_unknown_parameter_fail() {
        let result = Pipeline::builder("bad")
            .task(Task::new("fetch", Component::FetchStructure(FetchParams::default())))
            .build();
        assert!(matches!(result, Err(PipelineError::UnboundInput { .. })));

        let result = Pipeline::builder("bad")
            .task(
                Task::new("fetch", Component::FetchStructure(FetchParams::default()))
                    .with_parameter("pdb_code", "structure_id"),
            )
            .build();
        assert!(matches!(result, Err(PipelineError::UnknownParameter { .. })));
    }

    #[test]
    fn test_duplicate_task_fails() {
        let result = Pipeline::builder("bad")
            .task(Task::new("topology", Component::BuildTopology(TopologyParams::default()))
                .with_artifact("structure", "topology", "structure"))
            .task(Task::new("topology", Component::BuildTopology(TopologyParams::default())))
            .build();
        assert_eq!(
            result.unwrap_err(),
            PipelineError::DuplicateTask("topology".to_string())
        );
    }

    #[test]
    fn test_cycle_fails() {
        let result = Pipeline::builder("bad")
            .task(
                Task::new("a", Component::PrepareStructure(PrepareParams::default()))
                    .with_artifact("structure", "b", "prepared_structure"),
            )
            .task(
                Task::new("b", Component::PrepareStructure(PrepareParams::default()))
                    .with_artifact("structure", "a", "prepared_structure"),
            )
            .build();
        assert!(matches!(result, Err(PipelineError::Cycle(_))));
    }
}
