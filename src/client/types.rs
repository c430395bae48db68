//! Request and response bodies of the pipelines REST API (v2beta1)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A registered pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRecord {
    pub pipeline_id: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// A version of a registered pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineVersionRecord {
    pub pipeline_id: String,
    pub pipeline_version_id: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// One page of `GET /pipelines`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListPipelinesResponse {
    #[serde(default)]
    pub pipelines: Vec<PipelineRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// Runtime parameter values of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub parameters: BTreeMap<String, serde_json::Value>,
}

/// Body of `POST /runs`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The compiled definition, inline
    pub pipeline_spec: serde_json::Value,
    pub runtime_config: RuntimeConfig,
}

/// A created run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}
