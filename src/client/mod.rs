//! Orchestration service client and submission

pub mod http;
pub mod submit;
pub mod types;

use async_trait::async_trait;
use thiserror::Error;
use types::{
    ListPipelinesResponse, PipelineRecord, PipelineVersionRecord, RunRecord, RunRequest,
};

pub use http::KfpClient;
pub use submit::{version_name, Registration, Submission, SubmissionOutcome, Submitter};

/// Error types for service operations
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Failed to encode definition: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid service host: {0}")]
    InvalidHost(String),
}

/// A definition file to register, as a new pipeline or a new version
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineUpload {
    /// Display name of the pipeline or version
    pub name: String,
    pub description: String,
    /// File name sent with the multipart body
    pub file_name: String,
    /// YAML document
    pub package: String,
}

/// Operations of the pipelines REST API
#[async_trait]
pub trait PipelineService: Send + Sync {
    /// Fetch one page of registered pipelines
    async fn list_pipelines(
        &self,
        page_token: Option<&str>,
    ) -> Result<ListPipelinesResponse, ClientError>;

    async fn upload_pipeline(&self, upload: &PipelineUpload)
        -> Result<PipelineRecord, ClientError>;

    async fn upload_pipeline_version(
        &self,
        pipeline_id: &str,
        upload: &PipelineUpload,
    ) -> Result<PipelineVersionRecord, ClientError>;

    async fn create_run(&self, request: &RunRequest) -> Result<RunRecord, ClientError>;

    /// Find a pipeline by display name, walking every page
    async fn find_pipeline(
        &self,
        display_name: &str,
    ) -> Result<Option<PipelineRecord>, ClientError> {
        let mut page_token: Option<String> = None;
        loop {
            let page = self.list_pipelines(page_token.as_deref()).await?;
            if let Some(found) = page
                .pipelines
                .into_iter()
                .find(|p| p.display_name == display_name)
            {
                return Ok(Some(found));
            }

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) if page_token.as_deref() != Some(next.as_str()) => {
                    page_token = Some(next);
                }
                _ => return Ok(None),
            }
        }
    }
}
