//! Test: Failure Handling - a failed task stops everything downstream of it

use crate::helpers::*;
use md_pipeline::core::config::PipelineConfig;
use md_pipeline::core::ExecutionStatus;
use md_pipeline::execution::ExecutionEvent;

#[tokio::test]
async fn test_topology_failure_skips_minimizations() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = PipelineConfig::default().to_pipeline().unwrap();

    let result =
        run_pipeline_with(pipeline, MockToolkit::failing_at(FailAt::Topology), dir.path()).await;

    assert_eq!(result.status, ExecutionStatus::Failed);
    assert_eq!(result.pipeline.state.status, ExecutionStatus::Failed);
    assert_completed(&result, "fetch-structure");
    assert_completed(&result, "prepare-structure");
    assert_failed(&result, "build-topology", "tleap exploded");
    assert_skipped(&result, "restrained-minimization");
    assert_skipped(&result, "unrestrained-minimization");

    // Nothing from the failed task is visible to consumers
    assert!(result.context.artifact("build-topology", "topology").is_none());
}

#[tokio::test]
async fn test_fetch_failure_skips_everything_else() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = PipelineConfig::default().to_pipeline().unwrap();
    let toolkit = MockToolkit::failing_at(FailAt::Fetch);
    let calls = toolkit.calls();

    let result = run_pipeline_with(pipeline, toolkit, dir.path()).await;

    assert_eq!(result.status, ExecutionStatus::Failed);
    assert_failed(&result, "fetch-structure", "fetch exploded");
    for task in [
        "prepare-structure",
        "build-topology",
        "restrained-minimization",
        "unrestrained-minimization",
    ] {
        assert_skipped(&result, task);
    }
    assert_eq!(result.pipeline.state.skipped_tasks, 4);
    assert_eq!(*calls.lock().unwrap(), vec!["fetch_structure 1aki".to_string()]);
}

#[tokio::test]
async fn test_first_pass_failure_keeps_topology() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = PipelineConfig::default().to_pipeline().unwrap();

    let result = run_pipeline_with(
        pipeline,
        MockToolkit::failing_at(FailAt::Minimization),
        dir.path(),
    )
    .await;

    assert_eq!(result.status, ExecutionStatus::Failed);
    assert_completed(&result, "build-topology");
    assert_failed(&result, "restrained-minimization", "sander exploded");
    assert_skipped(&result, "unrestrained-minimization");
    assert!(result.context.artifact("build-topology", "topology").is_some());
}

#[tokio::test]
async fn test_skip_events_name_the_failed_task() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = PipelineConfig::default().to_pipeline().unwrap();

    let result =
        run_pipeline_with(pipeline, MockToolkit::failing_at(FailAt::Repair), dir.path()).await;

    let skipped: Vec<(&str, &str)> = result
        .events
        .iter()
        .filter_map(|event| match event {
            ExecutionEvent::TaskSkipped { task_id, reason } => {
                Some((task_id.as_str(), reason.as_str()))
            }
            _ => None,
        })
        .collect();

    assert_eq!(skipped.len(), 3);
    for (_, reason) in &skipped {
        assert!(reason.contains("prepare-structure"), "unexpected reason: {}", reason);
    }
    assert!(matches!(
        result.events.last(),
        Some(ExecutionEvent::PipelineCompleted {
            status: ExecutionStatus::Failed,
            ..
        })
    ));
}
