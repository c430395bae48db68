use anyhow::{Context, Result};
use md_pipeline::cli::commands::{
    CompileCommand, RunCommand, RunTaskCommand, SubmitCommand, ValidateCommand,
};
use md_pipeline::cli::output::*;
use md_pipeline::cli::{Cli, Command};
use md_pipeline::client::{KfpClient, Submission, Submitter};
use md_pipeline::compiler::Compiler;
use md_pipeline::core::config::PipelineConfig;
use md_pipeline::core::params::validate_pdb_code;
use md_pipeline::core::{
    Component, ComponentKind, ExecutionStatus, RunContext, Task, TaskIo, PDB_CODE_PARAMETER,
};
use md_pipeline::execution::{ExecutionEngine, ExecutionEvent, TaskExecutor};
use md_pipeline::toolkit::AmberToolkit;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    // Execute command
    match &cli.command {
        Command::Compile(cmd) => compile_pipeline(cmd, &cli)?,
        Command::Submit(cmd) => submit_pipeline(cmd, &cli).await?,
        Command::Run(cmd) => run_pipeline(cmd, &cli).await?,
        Command::RunTask(cmd) => run_task(cmd, &cli).await?,
        Command::Validate(cmd) => validate_pipeline(cmd, &cli)?,
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    match &cli.config {
        Some(path) => PipelineConfig::from_file(path).context("Failed to load pipeline config"),
        None => Ok(PipelineConfig::default()),
    }
}

fn compile_pipeline(cmd: &CompileCommand, cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let pipeline = config.to_pipeline()?;
    let path = cmd
        .output
        .clone()
        .unwrap_or_else(|| config.definition_path.clone());

    Compiler::from_config(&config)
        .compile_to_file(&pipeline, &path)
        .context("Failed to compile pipeline")?;

    println!(
        "{} Compiled {} to {}",
        CHECK,
        style(&config.name).bold(),
        style(path.display()).cyan()
    );
    Ok(())
}

async fn submit_pipeline(cmd: &SubmitCommand, cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let pipeline = config.to_pipeline()?;
    let pdb_code = cmd.pdb_code.clone().unwrap_or_else(|| config.pdb_code.clone());
    validate_pdb_code(&pdb_code)?;
    let host = cmd.host.as_deref().unwrap_or(&config.service.host);

    // The definition file is rewritten on every submission
    let compiler = Compiler::from_config(&config);
    compiler
        .compile_to_file(&pipeline, &config.definition_path)
        .context("Failed to compile pipeline")?;
    let definition = compiler.compile(&pipeline)?;

    let submission = Submission::new(&pipeline, &definition, chrono::Utc::now())?
        .parameter(PDB_CODE_PARAMETER, &pdb_code);

    println!(
        "{} Submitting {} to {} ({} = {})",
        ROCKET,
        style(&config.name).bold(),
        style(host).dim(),
        style(PDB_CODE_PARAMETER).cyan(),
        style(&pdb_code).dim()
    );

    let client = KfpClient::new(host, config.service.timeout_secs)?;
    let submitter = Submitter::new(client);
    let outcome = submitter
        .submit(&submission)
        .await
        .context("Submission failed")?;

    println!("{}", format_registration(&outcome.registration));
    println!(
        "{} Run created with ID: {}",
        CHECK,
        style(&outcome.run.run_id).cyan()
    );
    Ok(())
}

async fn run_pipeline(cmd: &RunCommand, cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let mut pipeline = config.to_pipeline()?;

    if let Some(pdb_code) = &cmd.pdb_code {
        validate_pdb_code(pdb_code)?;
        pipeline
            .parameters
            .insert(PDB_CODE_PARAMETER.to_string(), pdb_code.clone());
        println!(
            "{} Parameter override: {} = {}",
            INFO,
            style(PDB_CODE_PARAMETER).cyan(),
            style(pdb_code).dim()
        );
    }

    let root = cmd.artifacts.clone().unwrap_or_else(|| config.artifact_root());
    let mut context = RunContext::new(root, Uuid::new_v4(), pipeline.parameters.clone());

    let toolkit = AmberToolkit::new(config.toolkit.clone())?;
    let mut engine = ExecutionEngine::new(toolkit);

    let progress = create_progress_bar(pipeline.tasks.len());
    let bar = progress.clone();
    engine.add_event_handler(move |event| {
        bar.println(format_execution_event(&event));
        match &event {
            ExecutionEvent::TaskStarted { task_id } => bar.set_message(task_id.clone()),
            ExecutionEvent::TaskCompleted { .. }
            | ExecutionEvent::TaskFailed { .. }
            | ExecutionEvent::TaskSkipped { .. } => bar.inc(1),
            _ => {}
        }
    });

    println!();
    let started = Instant::now();
    let status = engine.execute(&mut pipeline, &mut context).await;
    progress.finish_and_clear();
    let status = status?;

    println!(
        "\n{} Artifacts in {} ({})",
        INFO,
        style(context.run_dir().display()).cyan(),
        style(format_duration(started.elapsed())).dim()
    );

    if status == ExecutionStatus::Completed {
        for (task_id, output) in pipeline.terminal_outputs() {
            if let Some(path) = context.artifact(task_id, output) {
                println!("  {}.{}: {}", task_id, output, path.display());
            }
        }
        println!(
            "\n{} {} completed {}",
            CHECK,
            style(&pipeline.name).bold(),
            style("successfully").green()
        );
    } else {
        println!(
            "\n{} {} {}",
            CROSS,
            style(&pipeline.name).bold(),
            style("failed").red()
        );
        for task in pipeline.tasks.values() {
            println!("  {} {}", format_task_state(&task.state), task.id);
        }
        std::process::exit(1);
    }

    Ok(())
}

async fn run_task(cmd: &RunTaskCommand, cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let kind: ComponentKind = cmd.component.parse()?;
    let component = Component::from_json(kind, &cmd.params)
        .with_context(|| format!("Invalid parameters for {}", kind.name()))?;
    let task = Task::new(kind.name(), component);

    let collect = |pairs: &[(String, String)]| -> BTreeMap<String, PathBuf> {
        pairs
            .iter()
            .map(|(k, v)| (k.clone(), PathBuf::from(v)))
            .collect()
    };
    let io = TaskIo {
        parameters: cmd.parameter.iter().cloned().collect(),
        inputs: collect(&cmd.input),
        outputs: collect(&cmd.output),
        workdir: cmd.workdir.clone().unwrap_or_else(|| {
            std::env::temp_dir().join(format!("md-pipeline-{}", Uuid::new_v4()))
        }),
    };

    let executor = TaskExecutor::new(AmberToolkit::new(config.toolkit.clone())?);
    match executor.run(&task, &io).await {
        Ok(outputs) => {
            for (name, path) in &outputs {
                println!("{} {}: {}", CHECK, style(name).green(), path.display());
            }
            Ok(())
        }
        Err(e) => {
            error!("Task {} failed: {}", task.id, e);
            Err(e).with_context(|| format!("Task {} failed", task.id))
        }
    }
}

fn validate_pipeline(cmd: &ValidateCommand, cli: &Cli) -> Result<()> {
    println!("{} Validating pipeline...", INFO);

    let result = load_config(cli).and_then(|config| {
        config.validate()?;
        let pipeline = config.to_pipeline()?;
        Ok((config, pipeline))
    });

    match result {
        Ok((config, pipeline)) => {
            println!("{} Pipeline configuration is valid!", CHECK);
            println!("  Name: {}", style(&config.name).bold());
            println!("  Tasks: {}", style(pipeline.tasks.len()).cyan());
            for task in pipeline
                .execution_order()
                .iter()
                .filter_map(|id| pipeline.task(id))
            {
                println!("    {}", format_task_summary(task));
            }
            println!("  Edges:");
            for edge in pipeline.edges() {
                println!(
                    "    {}.{} -> {}.{}",
                    edge.producer, edge.output, edge.consumer, edge.input
                );
            }

            if cmd.json {
                let data = serde_json::json!({
                    "name": config.name,
                    "parameters": pipeline.parameters,
                    "tasks": pipeline
                        .execution_order()
                        .iter()
                        .filter_map(|id| pipeline.task(id))
                        .map(|task| serde_json::json!({
                            "id": task.id,
                            "component": task.kind().name(),
                            "description": task.kind().description(),
                        }))
                        .collect::<Vec<_>>(),
                    "edges": pipeline.edges(),
                    "terminal_outputs": pipeline.terminal_outputs(),
                });
                println!("\n{}", serde_json::to_string_pretty(&data)?);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            std::process::exit(1);
        }
    }
}
