//! Test utilities for md-pipeline
#![allow(dead_code)]

use async_trait::async_trait;
use md_pipeline::client::types::{
    ListPipelinesResponse, PipelineRecord, PipelineVersionRecord, RunRecord, RunRequest,
};
use md_pipeline::client::{ClientError, PipelineService, PipelineUpload};
use md_pipeline::core::params::{FetchParams, PrepareParams};
use md_pipeline::core::{ExecutionStatus, Pipeline, RunContext, TaskState};
use md_pipeline::execution::{ExecutionEngine, ExecutionEvent};
use md_pipeline::toolkit::{MinimizationRequest, Toolkit, ToolkitError, TopologyRequest};
use std::path::Path;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Two energy blocks and the final summary, as sander prints them
pub const SANDER_LOG: &str = "
          -------------------------------------------------------
          Amber 22 SANDER                              2022
          -------------------------------------------------------

   NSTEP       ENERGY          RMS            GMAX         NAME    NUMBER
      1      -1.8012E+03     2.1045E+01     1.9876E+02     O        1021

 BOND    =       98.1234  ANGLE   =      312.4567  DIHED      =     1402.1100
 VDWAALS =     -702.3300  EEL     =    -9120.4400  HBOND      =        0.0000
 1-4 VDW =      498.7700  1-4 EEL =     6601.2200  RESTRAINT  =        0.0000


   NSTEP       ENERGY          RMS            GMAX         NAME    NUMBER
     10      -2.4501E+03     8.1200E+00     6.5400E+01     CA        77

 BOND    =       80.0000  ANGLE   =      290.0000  DIHED      =     1390.0000
 VDWAALS =     -760.0000  EEL     =    -9200.0000  HBOND      =        0.0000
 1-4 VDW =      495.0000  1-4 EEL =     6590.0000  RESTRAINT  =       14.2500


                    FINAL RESULTS



   NSTEP       ENERGY          RMS            GMAX         NAME    NUMBER
     10      -2.4501E+03     8.1200E+00     6.5400E+01     CA        77

 BOND    =       80.0000  ANGLE   =      290.0000  DIHED      =     1390.0000
";

/// Toolkit operations a [`MockToolkit`] can be told to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Fetch,
    Repair,
    Topology,
    Minimization,
}

/// Toolkit that writes placeholder files and records every call
#[derive(Clone, Default)]
pub struct MockToolkit {
    fail_at: Option<FailAt>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockToolkit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_at(fail_at: FailAt) -> Self {
        Self {
            fail_at: Some(fail_at),
            ..Self::default()
        }
    }

    /// Shared call log, readable after the toolkit has been moved
    pub fn calls(&self) -> Arc<Mutex<Vec<String>>> {
        self.calls.clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn should_fail(&self, at: FailAt, tool: &str) -> Result<(), ToolkitError> {
        if self.fail_at == Some(at) {
            return Err(ToolkitError::Exit {
                tool: tool.to_string(),
                code: 1,
                stderr: format!("{} exploded", tool),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Toolkit for MockToolkit {
    async fn fetch_structure(
        &self,
        pdb_code: &str,
        _params: &FetchParams,
        output: &Path,
    ) -> Result<(), ToolkitError> {
        self.record(format!("fetch_structure {}", pdb_code));
        self.should_fail(FailAt::Fetch, "fetch")?;
        std::fs::write(
            output,
            format!(
                "HEADER    {}\nATOM      1  N   LYS A   1      35.365  22.342 -11.980  1.00 18.89           N\nEND\n",
                pdb_code
            ),
        )?;
        Ok(())
    }

    async fn repair_structure(
        &self,
        input: &Path,
        output: &Path,
        _params: &PrepareParams,
    ) -> Result<(), ToolkitError> {
        self.record("repair_structure".to_string());
        self.should_fail(FailAt::Repair, "pdb4amber")?;
        let content = std::fs::read_to_string(input)?;
        std::fs::write(output, format!("REMARK prepared\n{}", content))?;
        Ok(())
    }

    async fn generate_topology(&self, request: &TopologyRequest<'_>) -> Result<(), ToolkitError> {
        self.record("generate_topology".to_string());
        self.should_fail(FailAt::Topology, "tleap")?;
        let structure = std::fs::read_to_string(request.input_pdb)?;
        std::fs::write(request.output_pdb, structure)?;
        std::fs::write(request.output_top, "%VERSION  VERSION_STAMP = V0001.000\n")?;
        std::fs::write(request.output_crd, "default_name\n  1231\n")?;
        Ok(())
    }

    async fn run_minimization(
        &self,
        request: &MinimizationRequest<'_>,
    ) -> Result<(), ToolkitError> {
        let coordinates = std::fs::read_to_string(request.coordinates)?;
        self.record(format!(
            "run_minimization reference={} coordinates={}",
            request.reference.is_some(),
            coordinates.lines().next().unwrap_or_default()
        ));
        self.should_fail(FailAt::Minimization, "sander")?;

        let restart_name = request
            .restart
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        std::fs::write(request.restart, format!("RESTART {}\n", restart_name))?;
        std::fs::write(request.trajectory, "trajectory\n")?;
        std::fs::write(request.log, SANDER_LOG)?;
        Ok(())
    }
}

/// Outcome of a local run
pub struct RunResult {
    pub status: ExecutionStatus,
    pub pipeline: Pipeline,
    pub context: RunContext,
    pub events: Vec<ExecutionEvent>,
}

impl RunResult {
    pub fn state(&self, task_id: &str) -> &TaskState {
        &self
            .pipeline
            .task(task_id)
            .unwrap_or_else(|| panic!("Task '{}' not found", task_id))
            .state
    }

    /// Task ids in the order they completed
    pub fn completed_order(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ExecutionEvent::TaskCompleted { task_id, .. } => Some(task_id.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn artifact_content(&self, task_id: &str, output: &str) -> String {
        let path = self
            .context
            .artifact(task_id, output)
            .unwrap_or_else(|| panic!("No artifact {}.{}", task_id, output));
        std::fs::read_to_string(path).unwrap()
    }
}

/// Run a pipeline locally under `root` with the given toolkit
pub async fn run_pipeline_with<T: Toolkit>(
    mut pipeline: Pipeline,
    toolkit: T,
    root: &Path,
) -> RunResult {
    let mut context = RunContext::new(root, Uuid::new_v4(), pipeline.parameters.clone());

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let mut engine = ExecutionEngine::new(toolkit);
    engine.add_event_handler(move |event| sink.lock().unwrap().push(event));

    let status = engine.execute(&mut pipeline, &mut context).await.unwrap();
    let events = events.lock().unwrap().clone();

    RunResult {
        status,
        pipeline,
        context,
        events,
    }
}

pub fn assert_completed(result: &RunResult, task_id: &str) {
    assert!(
        matches!(result.state(task_id), TaskState::Completed { .. }),
        "Task '{}' should be completed, but was in state: {:?}",
        task_id,
        result.state(task_id)
    );
}

pub fn assert_failed(result: &RunResult, task_id: &str, expected_error: &str) {
    match result.state(task_id) {
        TaskState::Failed { error, .. } => assert!(
            error.contains(expected_error),
            "Task '{}' error:\n{}\n\ndoes not contain:\n{}",
            task_id,
            error,
            expected_error
        ),
        other => panic!("Task '{}' should have failed, but was: {:?}", task_id, other),
    }
}

pub fn assert_skipped(result: &RunResult, task_id: &str) {
    assert!(
        matches!(result.state(task_id), TaskState::Skipped { .. }),
        "Task '{}' should be skipped, but was in state: {:?}",
        task_id,
        result.state(task_id)
    );
}

/// In-memory orchestration service
///
/// Pipelines are served one per page so lookups exercise pagination.
#[derive(Default)]
pub struct MockService {
    pipelines: Mutex<Vec<PipelineRecord>>,
    versions: Mutex<Vec<(String, PipelineUpload)>>,
    uploads: Mutex<Vec<PipelineUpload>>,
    runs: Mutex<Vec<RunRequest>>,
}

impl MockService {
    pub fn with_pipelines(names: &[&str]) -> Self {
        let service = Self::default();
        {
            let mut pipelines = service.pipelines.lock().unwrap();
            for (i, name) in names.iter().enumerate() {
                pipelines.push(PipelineRecord {
                    pipeline_id: format!("pipeline-{}", i),
                    display_name: name.to_string(),
                    description: None,
                    created_at: None,
                });
            }
        }
        service
    }

    pub fn uploads(&self) -> Vec<PipelineUpload> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn versions(&self) -> Vec<(String, PipelineUpload)> {
        self.versions.lock().unwrap().clone()
    }

    pub fn runs(&self) -> Vec<RunRequest> {
        self.runs.lock().unwrap().clone()
    }
}

#[async_trait]
impl PipelineService for MockService {
    async fn list_pipelines(
        &self,
        page_token: Option<&str>,
    ) -> Result<ListPipelinesResponse, ClientError> {
        let pipelines = self.pipelines.lock().unwrap();
        let index = match page_token {
            Some(token) => token.parse::<usize>().map_err(|_| ClientError::Api {
                status: 400,
                message: format!("bad page token {}", token),
            })?,
            None => 0,
        };
        Ok(ListPipelinesResponse {
            pipelines: pipelines.get(index).cloned().into_iter().collect(),
            total_size: Some(pipelines.len() as u64),
            next_page_token: (index + 1 < pipelines.len()).then(|| (index + 1).to_string()),
        })
    }

    async fn upload_pipeline(&self, upload: &PipelineUpload) -> Result<PipelineRecord, ClientError> {
        self.uploads.lock().unwrap().push(upload.clone());
        let mut pipelines = self.pipelines.lock().unwrap();
        let record = PipelineRecord {
            pipeline_id: format!("pipeline-{}", pipelines.len()),
            display_name: upload.name.clone(),
            description: Some(upload.description.clone()),
            created_at: None,
        };
        pipelines.push(record.clone());
        Ok(record)
    }

    async fn upload_pipeline_version(
        &self,
        pipeline_id: &str,
        upload: &PipelineUpload,
    ) -> Result<PipelineVersionRecord, ClientError> {
        let mut versions = self.versions.lock().unwrap();
        versions.push((pipeline_id.to_string(), upload.clone()));
        Ok(PipelineVersionRecord {
            pipeline_id: pipeline_id.to_string(),
            pipeline_version_id: format!("version-{}", versions.len()),
            display_name: upload.name.clone(),
            created_at: None,
        })
    }

    async fn create_run(&self, request: &RunRequest) -> Result<RunRecord, ClientError> {
        let mut runs = self.runs.lock().unwrap();
        runs.push(request.clone());
        Ok(RunRecord {
            run_id: format!("run-{}", runs.len()),
            display_name: Some(request.display_name.clone()),
            state: Some("PENDING".to_string()),
        })
    }
}
