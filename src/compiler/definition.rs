//! Portable workflow definition (pipeline IR)
//!
//! Keys serialize in alphabetical order and every map is a `BTreeMap`, so
//! the same graph always produces the same document.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

/// IR schema version understood by the orchestration service
pub const SCHEMA_VERSION: &str = "2.1.0";

/// Artifact type of every input and output
pub const ARTIFACT_SCHEMA_TITLE: &str = "system.Artifact";
pub const ARTIFACT_SCHEMA_VERSION: &str = "0.0.1";

/// Root of a compiled workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineDefinition {
    pub components: BTreeMap<String, ComponentSpec>,
    pub deployment_spec: DeploymentSpec,
    pub pipeline_info: PipelineInfo,
    pub root: RootSpec,
    pub schema_version: String,
    pub sdk_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSpec {
    pub executor_label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_definitions: Option<InterfaceDefinitions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_definitions: Option<InterfaceDefinitions>,
}

/// Declared artifacts and parameters of a component or of the root
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceDefinitions {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub artifacts: BTreeMap<String, ArtifactSpec>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, ParameterSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactSpec {
    pub artifact_type: ArtifactType,
}

impl Default for ArtifactSpec {
    fn default() -> Self {
        Self {
            artifact_type: ArtifactType {
                schema_title: ARTIFACT_SCHEMA_TITLE.to_string(),
                schema_version: ARTIFACT_SCHEMA_VERSION.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactType {
    pub schema_title: String,
    pub schema_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_optional: Option<bool>,
    pub parameter_type: String,
}

impl ParameterSpec {
    pub fn string() -> Self {
        Self {
            default_value: None,
            is_optional: None,
            parameter_type: "STRING".to_string(),
        }
    }

    pub fn string_with_default(default: impl Into<String>) -> Self {
        Self {
            default_value: Some(default.into()),
            is_optional: Some(true),
            parameter_type: "STRING".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentSpec {
    pub executors: BTreeMap<String, ExecutorSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorSpec {
    pub container: ContainerSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub args: Vec<String>,
    pub command: Vec<String>,
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootSpec {
    pub dag: DagSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_definitions: Option<InterfaceDefinitions>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DagSpec {
    pub tasks: BTreeMap<String, DagTask>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DagTask {
    pub caching_options: CachingOptions,
    pub component_ref: ComponentRef,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependent_tasks: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<TaskInputs>,
    pub task_info: TaskInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachingOptions {
    pub enable_cache: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentRef {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInfo {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskInputs {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub artifacts: BTreeMap<String, ArtifactBinding>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, ParameterBinding>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactBinding {
    pub task_output_artifact: TaskOutputArtifact,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskOutputArtifact {
    pub output_artifact_key: String,
    pub producer_task: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterBinding {
    pub component_input_parameter: String,
}

impl PipelineDefinition {
    /// Comment block written above the document
    pub fn header(&self) -> String {
        let mut header = String::from("# PIPELINE DEFINITION\n");
        let _ = writeln!(header, "# Name: {}", self.pipeline_info.name);
        if let Some(description) = &self.pipeline_info.description {
            let _ = writeln!(header, "# Description: {}", description);
        }

        let parameters = self
            .root
            .input_definitions
            .as_ref()
            .map(|defs| &defs.parameters);
        if let Some(parameters) = parameters.filter(|p| !p.is_empty()) {
            header.push_str("# Inputs:\n");
            for (name, spec) in parameters {
                match &spec.default_value {
                    Some(default) => {
                        let _ = writeln!(header, "#    {}: str [Default: '{}']", name, default);
                    }
                    None => {
                        let _ = writeln!(header, "#    {}: str", name);
                    }
                }
            }
        }
        header
    }

    /// Serialize with the comment header
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        let body = serde_yaml::to_string(self)?;
        Ok(format!("{}{}", self.header(), body))
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Task names of the root DAG
    pub fn task_names(&self) -> Vec<&str> {
        self.root.dag.tasks.keys().map(String::as_str).collect()
    }

    /// (producer, consumer) pairs implied by the artifact bindings
    pub fn edges(&self) -> BTreeSet<(&str, &str)> {
        self.root
            .dag
            .tasks
            .iter()
            .flat_map(|(name, task)| {
                task.inputs
                    .iter()
                    .flat_map(|inputs| inputs.artifacts.values())
                    .map(move |binding| {
                        (
                            binding.task_output_artifact.producer_task.as_str(),
                            name.as_str(),
                        )
                    })
            })
            .collect()
    }
}
