//! Test: Task Entry - compiled container command lines drive `run-task`

use crate::helpers::*;
use md_pipeline::cli::commands::RunTaskCommand;
use md_pipeline::cli::{Cli, Command};
use md_pipeline::compiler::Compiler;
use md_pipeline::core::config::PipelineConfig;
use md_pipeline::core::{Component, ComponentKind, Task, TaskIo};
use md_pipeline::execution::TaskExecutor;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Command line of a compiled task with placeholders filled in, the way
/// the orchestration service launches the container
fn launch_args(task: &str, values: &BTreeMap<String, String>) -> Vec<String> {
    let config = PipelineConfig::default();
    let definition = Compiler::from_config(&config)
        .compile(&config.to_pipeline().unwrap())
        .unwrap();
    let container = &definition.deployment_spec.executors[&format!("exec-{}", task)].container;

    container
        .command
        .iter()
        .chain(container.args.iter())
        .map(|arg| {
            values.iter().fold(arg.clone(), |arg, (placeholder, value)| {
                arg.replace(placeholder.as_str(), value)
            })
        })
        .collect()
}

fn artifact_placeholder(direction: &str, name: &str) -> String {
    format!("{{{{$.{}.artifacts['{}'].path}}}}", direction, name)
}

fn parse_run_task(args: &[String]) -> RunTaskCommand {
    match Cli::try_parse_from(args).unwrap().command {
        Command::RunTask(cmd) => cmd,
        other => panic!("expected run-task, got {:?}", other),
    }
}

fn task_io(cmd: &RunTaskCommand, workdir: &Path) -> TaskIo {
    let paths = |pairs: &[(String, String)]| -> BTreeMap<String, PathBuf> {
        pairs
            .iter()
            .map(|(k, v)| (k.clone(), PathBuf::from(v)))
            .collect()
    };
    TaskIo {
        parameters: cmd.parameter.iter().cloned().collect(),
        inputs: paths(&cmd.input),
        outputs: paths(&cmd.output),
        workdir: workdir.to_path_buf(),
    }
}

#[tokio::test]
async fn test_fetch_task_from_compiled_command() {
    let dir = tempfile::tempdir().unwrap();
    let structure = dir.path().join("outputs/structure");

    let mut values = BTreeMap::new();
    values.insert(
        "{{$.inputs.parameters['pdb_code']}}".to_string(),
        "2lzm".to_string(),
    );
    values.insert(
        artifact_placeholder("outputs", "structure"),
        structure.display().to_string(),
    );

    let args = launch_args("fetch-structure", &values);
    assert_eq!(&args[..2], ["md-pipeline", "run-task"]);

    let cmd = parse_run_task(&args);
    let kind: ComponentKind = cmd.component.parse().unwrap();
    assert_eq!(kind, ComponentKind::FetchStructure);

    let task = Task::new(kind.name(), Component::from_json(kind, &cmd.params).unwrap());
    let io = task_io(&cmd, &dir.path().join("work"));
    let outputs = TaskExecutor::new(MockToolkit::new())
        .run(&task, &io)
        .await
        .unwrap();

    assert_eq!(outputs["structure"], structure);
    assert!(std::fs::read_to_string(&structure)
        .unwrap()
        .starts_with("HEADER    2lzm"));
}

#[tokio::test]
async fn test_unrestrained_task_from_compiled_command() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = dir.path().join("inputs");
    std::fs::create_dir_all(&inputs).unwrap();
    std::fs::write(inputs.join("topology"), "%VERSION\n").unwrap();
    std::fs::write(inputs.join("restart"), "RESTART sander.h_min.rst\n").unwrap();

    let mut values = BTreeMap::new();
    for name in ["topology", "restart"] {
        values.insert(
            artifact_placeholder("inputs", name),
            inputs.join(name).display().to_string(),
        );
    }
    for name in ["restart", "log", "energy"] {
        values.insert(
            artifact_placeholder("outputs", name),
            dir.path().join("outputs").join(name).display().to_string(),
        );
    }

    let cmd = parse_run_task(&launch_args("unrestrained-minimization", &values));
    assert!(cmd.parameter.is_empty());
    assert_eq!(cmd.input.len(), 2);
    assert_eq!(cmd.output.len(), 3);

    let kind: ComponentKind = cmd.component.parse().unwrap();
    let task = Task::new(kind.name(), Component::from_json(kind, &cmd.params).unwrap());
    let toolkit = MockToolkit::new();
    let calls = toolkit.calls();
    let outputs = TaskExecutor::new(toolkit)
        .run(&task, &task_io(&cmd, &dir.path().join("work")))
        .await
        .unwrap();

    assert_eq!(
        outputs.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["energy", "log", "restart"]
    );
    assert_eq!(
        *calls.lock().unwrap(),
        vec!["run_minimization reference=false coordinates=RESTART sander.h_min.rst".to_string()]
    );
    // The trajectory stays in the scratch directory
    assert!(!dir.path().join("outputs").join("trajectory").exists());
    assert!(dir.path().join("work").join("sander.n_min.x").exists());
}

#[tokio::test]
async fn test_missing_input_file_fails_task() {
    let dir = tempfile::tempdir().unwrap();
    let mut values = BTreeMap::new();
    values.insert(
        artifact_placeholder("inputs", "structure"),
        dir.path().join("absent.pdb").display().to_string(),
    );
    values.insert(
        artifact_placeholder("outputs", "prepared_structure"),
        dir.path().join("out.pdb").display().to_string(),
    );

    let cmd = parse_run_task(&launch_args("prepare-structure", &values));
    let kind: ComponentKind = cmd.component.parse().unwrap();
    let task = Task::new(kind.name(), Component::from_json(kind, &cmd.params).unwrap());

    let result = TaskExecutor::new(MockToolkit::new())
        .run(&task, &task_io(&cmd, &dir.path().join("work")))
        .await;

    assert!(result.is_err());
    assert!(!dir.path().join("out.pdb").exists());
}
