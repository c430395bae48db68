//! Register-or-update and run creation

use crate::client::{
    types::{RunRecord, RunRequest, RuntimeConfig},
    ClientError, PipelineService, PipelineUpload,
};
use crate::compiler::PipelineDefinition;
use crate::core::Pipeline;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::info;

/// Name of a new pipeline version created at `now`, prefixed with the
/// pipeline's version label (`version` when the label is blank)
pub fn version_name(version: &str, now: DateTime<Utc>) -> String {
    let label = match version.trim() {
        "" => "version",
        label => label,
    };
    format!("{}-{}", label, now.format("%Y%m%d-%H%M%S"))
}

/// Everything a submission sends
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    /// Pipeline display name, the lookup key on the service
    pub display_name: String,
    pub description: String,
    /// Used when the pipeline already exists
    pub version_name: String,
    pub run_name: String,
    /// File name of the uploaded definition
    pub file_name: String,
    /// Definition YAML, uploaded for registration
    pub package: String,
    /// Definition as JSON, sent inline with the run
    pub pipeline_spec: serde_json::Value,
    /// Run parameter values
    pub parameters: BTreeMap<String, String>,
}

impl Submission {
    pub fn new(
        pipeline: &Pipeline,
        definition: &PipelineDefinition,
        now: DateTime<Utc>,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            display_name: pipeline.name.clone(),
            description: pipeline.description.clone(),
            version_name: version_name(&pipeline.version, now),
            run_name: format!("{} {}", pipeline.name, now.format("%Y-%m-%d %H:%M:%S")),
            file_name: format!("{}.yaml", definition.pipeline_info.name),
            package: definition.to_yaml()?,
            pipeline_spec: serde_json::to_value(definition)?,
            parameters: BTreeMap::new(),
        })
    }

    /// Set a run parameter value
    pub fn parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }
}

/// Outcome of the registration step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// No pipeline had the display name; it was uploaded
    Created { pipeline_id: String },
    /// The pipeline existed; a new version was uploaded
    Updated {
        pipeline_id: String,
        pipeline_version_id: String,
        version_name: String,
    },
}

impl Registration {
    pub fn pipeline_id(&self) -> &str {
        match self {
            Registration::Created { pipeline_id } | Registration::Updated { pipeline_id, .. } => {
                pipeline_id
            }
        }
    }
}

/// Result of a full submission
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionOutcome {
    pub registration: Registration,
    pub run: RunRecord,
}

/// Submits compiled definitions to a [`PipelineService`]
pub struct Submitter<S> {
    service: S,
}

impl<S: PipelineService> Submitter<S> {
    pub fn new(service: S) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Upload the definition as a new version, or as a new pipeline if
    /// none carries the display name yet
    pub async fn register(&self, submission: &Submission) -> Result<Registration, ClientError> {
        let existing = self.service.find_pipeline(&submission.display_name).await?;

        match existing {
            Some(pipeline) => {
                info!("Found existing pipeline with ID: {}", pipeline.pipeline_id);
                let upload = PipelineUpload {
                    name: submission.version_name.clone(),
                    description: submission.description.clone(),
                    file_name: submission.file_name.clone(),
                    package: submission.package.clone(),
                };
                let version = self
                    .service
                    .upload_pipeline_version(&pipeline.pipeline_id, &upload)
                    .await?;
                info!(
                    "Uploaded version {} ({})",
                    version.display_name, version.pipeline_version_id
                );
                Ok(Registration::Updated {
                    pipeline_id: pipeline.pipeline_id,
                    pipeline_version_id: version.pipeline_version_id,
                    version_name: version.display_name,
                })
            }
            None => {
                let upload = PipelineUpload {
                    name: submission.display_name.clone(),
                    description: submission.description.clone(),
                    file_name: submission.file_name.clone(),
                    package: submission.package.clone(),
                };
                let pipeline = self.service.upload_pipeline(&upload).await?;
                info!("Created new pipeline with ID: {}", pipeline.pipeline_id);
                Ok(Registration::Created {
                    pipeline_id: pipeline.pipeline_id,
                })
            }
        }
    }

    /// Start a run of the inline definition
    pub async fn create_run(&self, submission: &Submission) -> Result<RunRecord, ClientError> {
        let parameters = submission
            .parameters
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();

        let request = RunRequest {
            display_name: submission.run_name.clone(),
            description: Some(submission.description.clone()).filter(|d| !d.is_empty()),
            pipeline_spec: submission.pipeline_spec.clone(),
            runtime_config: RuntimeConfig { parameters },
        };
        let run = self.service.create_run(&request).await?;
        info!("Created run {}", run.run_id);
        Ok(run)
    }

    /// Register, then start a run
    pub async fn submit(&self, submission: &Submission) -> Result<SubmissionOutcome, ClientError> {
        let registration = self.register(submission).await?;
        let run = self.create_run(submission).await?;
        Ok(SubmissionOutcome { registration, run })
    }
}
