//! Test: Submission - register or update, then run

use crate::helpers::*;
use chrono::{TimeZone, Utc};
use md_pipeline::client::{Registration, Submission, Submitter};
use md_pipeline::compiler::{Compiler, PipelineDefinition};
use md_pipeline::core::config::PipelineConfig;
use md_pipeline::core::PDB_CODE_PARAMETER;

fn submission(pdb_code: &str, second: u32) -> Submission {
    let config = PipelineConfig::default();
    let pipeline = config.to_pipeline().unwrap();
    let definition = Compiler::from_config(&config).compile(&pipeline).unwrap();
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, second).unwrap();
    Submission::new(&pipeline, &definition, now)
        .unwrap()
        .parameter(PDB_CODE_PARAMETER, pdb_code)
}

#[tokio::test]
async fn test_first_submission_creates_then_second_updates() {
    let submitter = Submitter::new(MockService::default());

    let first = submitter.submit(&submission("1aki", 0)).await.unwrap();
    assert!(matches!(first.registration, Registration::Created { .. }));
    assert_eq!(submitter.service().uploads().len(), 1);
    assert!(submitter.service().versions().is_empty());

    let second = submitter.submit(&submission("4ake", 5)).await.unwrap();
    match &second.registration {
        Registration::Updated {
            pipeline_id,
            version_name,
            ..
        } => {
            assert_eq!(pipeline_id, first.registration.pipeline_id());
            assert_eq!(version_name, "1.0-20240601-093005");
        }
        other => panic!("expected a version upload, got {:?}", other),
    }
    // Still exactly one pipeline upload
    assert_eq!(submitter.service().uploads().len(), 1);
    assert_eq!(submitter.service().versions().len(), 1);

    let runs = submitter.service().runs();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].runtime_config.parameters[PDB_CODE_PARAMETER], "1aki");
    assert_eq!(runs[1].runtime_config.parameters[PDB_CODE_PARAMETER], "4ake");
    assert_eq!(second.run.run_id, "run-2");
}

#[tokio::test]
async fn test_existing_pipeline_found_on_later_page() {
    let service = MockService::with_pipelines(&[
        "Protein Folding",
        "Docking Screen",
        "Molecular Dynamics Pipeline",
    ]);
    let submitter = Submitter::new(service);

    let registration = submitter.register(&submission("1aki", 0)).await.unwrap();

    assert_eq!(registration.pipeline_id(), "pipeline-2");
    assert!(submitter.service().uploads().is_empty());
    assert!(submitter.service().runs().is_empty());

    let versions = submitter.service().versions();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].0, "pipeline-2");
}

#[tokio::test]
async fn test_uploaded_package_is_the_compiled_definition() {
    let submitter = Submitter::new(MockService::default());
    submitter.submit(&submission("1aki", 0)).await.unwrap();

    let upload = &submitter.service().uploads()[0];
    assert_eq!(upload.name, "Molecular Dynamics Pipeline");
    assert_eq!(upload.file_name, "molecular-dynamics-pipeline.yaml");
    assert!(upload.package.starts_with("# PIPELINE DEFINITION\n"));

    let definition = PipelineDefinition::from_yaml(&upload.package).unwrap();
    assert_eq!(definition.task_names().len(), 5);

    // The run carries the same definition inline
    let run = &submitter.service().runs()[0];
    assert_eq!(run.pipeline_spec, serde_json::to_value(&definition).unwrap());
}
