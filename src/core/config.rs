//! Pipeline configuration from YAML

use crate::core::{
    params::{
        validate_pdb_code, EnergyTerm, FetchParams, MinimizationParams, PrepareParams,
        TopologyParams,
    },
    Pipeline, PipelineError,
};
use crate::toolkit::ToolkitConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default location of the compiled workflow definition
pub const DEFAULT_DEFINITION_PATH: &str = "pipelines/molecular_dynamics_pipeline.yaml";

/// Default orchestration service endpoint
pub const DEFAULT_SERVICE_HOST: &str = "http://localhost:8080";

/// Orchestration service connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Base URL of the service
    pub host: String,

    /// Request timeout (in seconds)
    pub timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SERVICE_HOST.to_string(),
            timeout_secs: 30,
        }
    }
}

/// Top-level pipeline configuration loaded from YAML
///
/// Every field is optional. An empty file reproduces the standard
/// preparation workflow for `1aki`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Pipeline display name, also the lookup key on the service
    pub name: String,

    pub description: String,

    /// Version label
    pub version: String,

    /// Default value of the `pdb_code` run parameter
    pub pdb_code: String,

    /// Container image the compiled tasks run in
    pub image: String,

    /// Command prefix inside the image, `run-task` is appended
    pub task_command: Vec<String>,

    /// Where `compile` writes the workflow definition
    pub definition_path: PathBuf,

    /// Root directory for local run artifacts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_root: Option<PathBuf>,

    pub service: ServiceConfig,

    pub fetch: FetchParams,

    pub prepare: PrepareParams,

    pub topology: TopologyParams,

    /// First pass, heavy atoms restrained
    pub restrained_minimization: MinimizationParams,

    /// Second pass, starting from the first pass restart
    pub unrestrained_minimization: MinimizationParams,

    /// Terms extracted from both minimization logs
    pub energy_terms: Vec<EnergyTerm>,

    pub toolkit: ToolkitConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name: "Molecular Dynamics Pipeline".to_string(),
            description: "Pipeline for setting up and running molecular dynamics simulations"
                .to_string(),
            version: "1.0".to_string(),
            pdb_code: "1aki".to_string(),
            image: "md-pipeline:latest".to_string(),
            task_command: vec!["md-pipeline".to_string()],
            definition_path: PathBuf::from(DEFAULT_DEFINITION_PATH),
            artifact_root: None,
            service: ServiceConfig::default(),
            fetch: FetchParams::default(),
            prepare: PrepareParams::default(),
            topology: TopologyParams::default(),
            restrained_minimization: MinimizationParams::restrained_heavy_atoms(),
            unrestrained_minimization: MinimizationParams::default(),
            energy_terms: vec![EnergyTerm::Energy],
            toolkit: ToolkitConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load pipeline configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Parse pipeline configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty document deserializes as null rather than an empty map
        let config: PipelineConfig = if yaml.trim().is_empty() {
            PipelineConfig::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the pipeline configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            anyhow::bail!("Pipeline name must not be empty");
        }
        validate_pdb_code(&self.pdb_code).context("Invalid default pdb_code")?;
        if self.image.trim().is_empty() {
            anyhow::bail!("Container image must not be empty");
        }
        if self.task_command.is_empty() {
            anyhow::bail!("task_command must name at least the executable");
        }
        if !(self.service.host.starts_with("http://") || self.service.host.starts_with("https://"))
        {
            anyhow::bail!("Service host '{}' is not an http(s) URL", self.service.host);
        }

        // Wiring and parameter checks live on the graph itself
        self.to_pipeline()?;
        Ok(())
    }

    /// Root directory for local run artifacts
    pub fn artifact_root(&self) -> PathBuf {
        self.artifact_root.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("md-pipeline")
                .join("runs")
        })
    }

    /// Convert config to a Pipeline domain model
    pub fn to_pipeline(&self) -> Result<Pipeline, PipelineError> {
        Pipeline::from_config(self)
    }
}
