//! HTTP client for the pipelines REST API

use crate::client::{
    types::{ListPipelinesResponse, PipelineRecord, PipelineVersionRecord, RunRecord, RunRequest},
    ClientError, PipelineService, PipelineUpload,
};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::debug;

/// API prefix of the service
pub const API_PREFIX: &str = "/apis/v2beta1";

const PAGE_SIZE: &str = "100";

/// HTTP client for the orchestration service
#[derive(Debug, Clone)]
pub struct KfpClient {
    client: Client,
    base_url: String,
}

impl KfpClient {
    /// Create a new client for `host`, e.g. `http://localhost:8080`
    pub fn new(host: &str, timeout_secs: u64) -> Result<Self, ClientError> {
        if !(host.starts_with("http://") || host.starts_with("https://")) {
            return Err(ClientError::InvalidHost(host.to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: host.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, API_PREFIX, path)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ClientError> {
        let url = self.url(path);
        debug!("GET {}", url);
        let response = self.client.get(&url).query(query).send().await?;
        self.handle_response(response).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let url = self.url(path);
        debug!("POST {}", url);
        let response = self.client.post(&url).json(body).send().await?;
        self.handle_response(response).await
    }

    async fn post_file<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        upload: &PipelineUpload,
    ) -> Result<T, ClientError> {
        let url = self.url(path);
        debug!("POST {} ({} bytes)", url, upload.package.len());
        let part = Part::text(upload.package.clone())
            .file_name(upload.file_name.clone())
            .mime_str("application/x-yaml")?;
        let form = Form::new().part("uploadfile", part);

        let response = self
            .client
            .post(&url)
            .query(query)
            .multipart(form)
            .send()
            .await?;
        self.handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();

        if status.is_success() {
            Ok(response.json().await?)
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(ClientError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[async_trait]
impl PipelineService for KfpClient {
    async fn list_pipelines(
        &self,
        page_token: Option<&str>,
    ) -> Result<ListPipelinesResponse, ClientError> {
        let mut query = vec![("page_size", PAGE_SIZE)];
        if let Some(token) = page_token {
            query.push(("page_token", token));
        }
        self.get("/pipelines", &query).await
    }

    async fn upload_pipeline(
        &self,
        upload: &PipelineUpload,
    ) -> Result<PipelineRecord, ClientError> {
        let query = [
            ("name", upload.name.as_str()),
            ("display_name", upload.name.as_str()),
            ("description", upload.description.as_str()),
        ];
        self.post_file("/pipelines/upload", &query, upload).await
    }

    async fn upload_pipeline_version(
        &self,
        pipeline_id: &str,
        upload: &PipelineUpload,
    ) -> Result<PipelineVersionRecord, ClientError> {
        let query = [
            ("name", upload.name.as_str()),
            ("display_name", upload.name.as_str()),
            ("pipelineid", pipeline_id),
            ("description", upload.description.as_str()),
        ];
        self.post_file("/pipelines/upload_version", &query, upload)
            .await
    }

    async fn create_run(&self, request: &RunRequest) -> Result<RunRecord, ClientError> {
        self.post("/runs", request).await
    }
}
