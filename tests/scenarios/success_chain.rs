//! Test: Success Chain - the full graph runs in order and hands artifacts on

use crate::helpers::*;
use md_pipeline::core::config::PipelineConfig;
use md_pipeline::core::{ExecutionStatus, PDB_CODE_PARAMETER};

#[tokio::test]
async fn test_full_run_completes_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = PipelineConfig::default().to_pipeline().unwrap();

    let result = run_pipeline_with(pipeline, MockToolkit::new(), dir.path()).await;

    assert_eq!(result.status, ExecutionStatus::Completed);
    assert_eq!(
        result.completed_order(),
        vec![
            "fetch-structure",
            "prepare-structure",
            "build-topology",
            "restrained-minimization",
            "unrestrained-minimization",
        ]
    );
    assert_eq!(result.pipeline.state.completed_tasks, 5);
    assert_eq!(result.pipeline.state.status, ExecutionStatus::Completed);
}

#[tokio::test]
async fn test_artifacts_flow_between_tasks() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = PipelineConfig::default().to_pipeline().unwrap();
    let toolkit = MockToolkit::new();
    let calls = toolkit.calls();

    let result = run_pipeline_with(pipeline, toolkit, dir.path()).await;
    assert_eq!(result.status, ExecutionStatus::Completed);

    // The prepared structure is the fetched one, passed through pdb4amber
    let prepared = result.artifact_content("prepare-structure", "prepared_structure");
    assert!(prepared.starts_with("REMARK prepared\nHEADER    1aki"));

    let calls = calls.lock().unwrap().clone();
    assert_eq!(
        calls,
        vec![
            "fetch_structure 1aki".to_string(),
            "repair_structure".to_string(),
            "generate_topology".to_string(),
            "run_minimization reference=true coordinates=default_name".to_string(),
            "run_minimization reference=false coordinates=RESTART sander.h_min.rst".to_string(),
        ]
    );

    assert_eq!(
        result.artifact_content("unrestrained-minimization", "restart"),
        "RESTART sander.n_min.rst\n"
    );
}

#[tokio::test]
async fn test_energy_series_are_written_for_both_passes() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::from_yaml(
        r#"
energy_terms: [ENERGY, BOND, RESTRAINT]
"#,
    )
    .unwrap();
    let pipeline = config.to_pipeline().unwrap();

    let result = run_pipeline_with(pipeline, MockToolkit::new(), dir.path()).await;
    assert_eq!(result.status, ExecutionStatus::Completed);

    for task in ["restrained-minimization", "unrestrained-minimization"] {
        let dat = result.artifact_content(task, "energy");
        let lines: Vec<&str> = dat.lines().collect();
        assert_eq!(lines[0], "# step ENERGY BOND RESTRAINT");
        assert_eq!(lines.len(), 3, "two steps expected in {}:\n{}", task, dat);
        assert_eq!(
            lines[2].split_whitespace().collect::<Vec<_>>(),
            vec!["10", "-2450.1000", "80.0000", "14.2500"]
        );

        let log = result.artifact_content(task, "log");
        assert!(log.contains("FINAL RESULTS"));
    }
}

#[tokio::test]
async fn test_pdb_code_override() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = PipelineConfig::default().to_pipeline().unwrap();
    pipeline
        .parameters
        .insert(PDB_CODE_PARAMETER.to_string(), "4ake".to_string());

    let result = run_pipeline_with(pipeline, MockToolkit::new(), dir.path()).await;

    assert_eq!(result.status, ExecutionStatus::Completed);
    assert!(result
        .artifact_content("fetch-structure", "structure")
        .starts_with("HEADER    4ake"));
}

#[tokio::test]
async fn test_artifacts_live_under_run_directory() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = PipelineConfig::default().to_pipeline().unwrap();

    let result = run_pipeline_with(pipeline, MockToolkit::new(), dir.path()).await;

    let run_dir = result.context.run_dir();
    assert!(run_dir.starts_with(dir.path()));
    for (task, output) in result.pipeline.terminal_outputs() {
        let path = result.context.artifact(task, output).unwrap();
        assert!(path.starts_with(&run_dir), "{} outside the run", path.display());
        assert!(path.is_file());
    }
}
