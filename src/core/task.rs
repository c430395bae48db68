//! Task domain model

use crate::core::{
    params::{
        FetchParams, MinimizeParams, ParamsError, PrepareParams, TopologyParams,
    },
    state::TaskState,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// The five task bodies the workflow is built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComponentKind {
    FetchStructure,
    PrepareStructure,
    BuildTopology,
    RestrainedMinimization,
    UnrestrainedMinimization,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 5] = [
        ComponentKind::FetchStructure,
        ComponentKind::PrepareStructure,
        ComponentKind::BuildTopology,
        ComponentKind::RestrainedMinimization,
        ComponentKind::UnrestrainedMinimization,
    ];

    /// Stable identifier, also used as the task id in the workflow
    pub fn name(self) -> &'static str {
        match self {
            ComponentKind::FetchStructure => "fetch-structure",
            ComponentKind::PrepareStructure => "prepare-structure",
            ComponentKind::BuildTopology => "build-topology",
            ComponentKind::RestrainedMinimization => "restrained-minimization",
            ComponentKind::UnrestrainedMinimization => "unrestrained-minimization",
        }
    }

    /// One-line summary shown by `validate`
    pub fn description(self) -> &'static str {
        match self {
            ComponentKind::FetchStructure => "Download a structure from the RCSB PDB archive",
            ComponentKind::PrepareStructure => "Prepare a structure for AMBER with pdb4amber",
            ComponentKind::BuildTopology => "Build AMBER topology and coordinates with tleap",
            ComponentKind::RestrainedMinimization => {
                "Minimize with sander while restraining heavy atoms"
            }
            ComponentKind::UnrestrainedMinimization => {
                "Minimize with sander starting from a previous restart"
            }
        }
    }

    /// Run parameters this component reads
    pub fn parameter_inputs(self) -> &'static [&'static str] {
        match self {
            ComponentKind::FetchStructure => &["pdb_code"],
            _ => &[],
        }
    }

    /// Artifacts this component consumes
    pub fn artifact_inputs(self) -> &'static [&'static str] {
        match self {
            ComponentKind::FetchStructure => &[],
            ComponentKind::PrepareStructure | ComponentKind::BuildTopology => &["structure"],
            ComponentKind::RestrainedMinimization => &["topology", "coordinates"],
            ComponentKind::UnrestrainedMinimization => &["topology", "restart"],
        }
    }

    /// Artifacts this component produces
    pub fn outputs(self) -> &'static [&'static str] {
        match self {
            ComponentKind::FetchStructure => &["structure"],
            ComponentKind::PrepareStructure => &["prepared_structure"],
            ComponentKind::BuildTopology => &["regularized_structure", "topology", "coordinates"],
            ComponentKind::RestrainedMinimization | ComponentKind::UnrestrainedMinimization => {
                &["restart", "log", "energy"]
            }
        }
    }

    /// Whether `input` is a declared parameter or artifact input
    pub fn accepts_input(self, input: &str) -> bool {
        self.parameter_inputs().contains(&input) || self.artifact_inputs().contains(&input)
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ComponentKind {
    type Err = ParamsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| ParamsError::Parse(format!("unknown component '{}'", s)))
    }
}

/// A component with its typed parameters
#[derive(Debug, Clone, PartialEq)]
pub enum Component {
    FetchStructure(FetchParams),
    PrepareStructure(PrepareParams),
    BuildTopology(TopologyParams),
    RestrainedMinimization(MinimizeParams),
    UnrestrainedMinimization(MinimizeParams),
}

impl Component {
    pub fn kind(&self) -> ComponentKind {
        match self {
            Component::FetchStructure(_) => ComponentKind::FetchStructure,
            Component::PrepareStructure(_) => ComponentKind::PrepareStructure,
            Component::BuildTopology(_) => ComponentKind::BuildTopology,
            Component::RestrainedMinimization(_) => ComponentKind::RestrainedMinimization,
            Component::UnrestrainedMinimization(_) => ComponentKind::UnrestrainedMinimization,
        }
    }

    pub fn validate(&self) -> Result<(), ParamsError> {
        match self {
            Component::FetchStructure(params) => params.validate(),
            Component::PrepareStructure(_) => Ok(()),
            Component::BuildTopology(params) => params.validate(),
            Component::RestrainedMinimization(params) => {
                params.validate()?;
                if !params.mdin.is_restrained() {
                    return Err(ParamsError::Invalid {
                        field: "mdin.restraint",
                        reason: "a restrained minimization needs a restraint".to_string(),
                    });
                }
                Ok(())
            }
            Component::UnrestrainedMinimization(params) => params.validate(),
        }
    }

    /// Serialize the parameters as compact JSON for the task command line
    pub fn params_json(&self) -> Result<String, serde_json::Error> {
        match self {
            Component::FetchStructure(params) => serde_json::to_string(params),
            Component::PrepareStructure(params) => serde_json::to_string(params),
            Component::BuildTopology(params) => serde_json::to_string(params),
            Component::RestrainedMinimization(params)
            | Component::UnrestrainedMinimization(params) => serde_json::to_string(params),
        }
    }

    /// Rebuild a component from its kind and JSON parameters
    ///
    /// Unknown keys and invalid values are rejected here.
    pub fn from_json(kind: ComponentKind, json: &str) -> Result<Self, ParamsError> {
        fn parse<T: serde::de::DeserializeOwned>(json: &str) -> Result<T, ParamsError> {
            serde_json::from_str(json).map_err(|e| ParamsError::Parse(e.to_string()))
        }

        let component = match kind {
            ComponentKind::FetchStructure => Component::FetchStructure(parse(json)?),
            ComponentKind::PrepareStructure => Component::PrepareStructure(parse(json)?),
            ComponentKind::BuildTopology => Component::BuildTopology(parse(json)?),
            ComponentKind::RestrainedMinimization => {
                Component::RestrainedMinimization(parse(json)?)
            }
            ComponentKind::UnrestrainedMinimization => {
                Component::UnrestrainedMinimization(parse(json)?)
            }
        };
        component.validate()?;
        Ok(component)
    }
}

/// Where a task input comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputSource {
    /// A run parameter of the pipeline
    Parameter(String),
    /// An output artifact of another task
    TaskOutput { producer: String, output: String },
}

/// A single node in the workflow graph
#[derive(Debug, Clone)]
pub struct Task {
    /// Unique task identifier
    pub id: String,

    /// The body this task runs
    pub component: Component,

    /// Input bindings (input name -> source)
    pub inputs: BTreeMap<String, InputSource>,

    /// Producer tasks, derived from the artifact bindings
    pub dependencies: Vec<String>,

    /// Runtime state (local runs only)
    pub state: TaskState,
}

impl Task {
    /// Create an unbound task
    pub fn new(id: impl Into<String>, component: Component) -> Self {
        Self {
            id: id.into(),
            component,
            inputs: BTreeMap::new(),
            dependencies: Vec::new(),
            state: TaskState::Pending,
        }
    }

    /// Bind an input to a pipeline run parameter
    pub fn with_parameter(mut self, input: &str, parameter: &str) -> Self {
        self.inputs
            .insert(input.to_string(), InputSource::Parameter(parameter.to_string()));
        self
    }

    /// Bind an input to another task's output artifact
    pub fn with_artifact(mut self, input: &str, producer: &str, output: &str) -> Self {
        self.inputs.insert(
            input.to_string(),
            InputSource::TaskOutput {
                producer: producer.to_string(),
                output: output.to_string(),
            },
        );
        if !self.dependencies.iter().any(|dep| dep == producer) {
            self.dependencies.push(producer.to_string());
            self.dependencies.sort();
        }
        self
    }

    pub fn kind(&self) -> ComponentKind {
        self.component.kind()
    }

    /// Declared output artifact names
    pub fn outputs(&self) -> &'static [&'static str] {
        self.kind().outputs()
    }

    /// Artifact bindings only, as (input, producer, output)
    pub fn artifact_inputs(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.inputs.iter().filter_map(|(input, source)| match source {
            InputSource::TaskOutput { producer, output } => {
                Some((input.as_str(), producer.as_str(), output.as_str()))
            }
            InputSource::Parameter(_) => None,
        })
    }

    /// Parameter bindings only, as (input, parameter)
    pub fn parameter_inputs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inputs.iter().filter_map(|(input, source)| match source {
            InputSource::Parameter(parameter) => Some((input.as_str(), parameter.as_str())),
            InputSource::TaskOutput { .. } => None,
        })
    }

    /// Check if all dependencies have completed
    pub fn dependencies_met(&self, completed: &HashSet<String>) -> bool {
        self.dependencies.iter().all(|dep| completed.contains(dep))
    }
}
