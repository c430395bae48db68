//! CLI command definitions

use clap::Args;
use std::path::PathBuf;

/// Write the workflow definition file
#[derive(Debug, Args, Clone)]
pub struct CompileCommand {
    /// Output path (defaults to `definition_path` from the configuration)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Register the workflow and create a run
#[derive(Debug, Args, Clone)]
pub struct SubmitCommand {
    /// Structure to prepare in this run
    #[arg(long)]
    pub pdb_code: Option<String>,

    /// Orchestration service URL
    #[arg(long)]
    pub host: Option<String>,
}

/// Run the workflow locally
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Structure to prepare
    #[arg(long)]
    pub pdb_code: Option<String>,

    /// Artifact root directory
    #[arg(long)]
    pub artifacts: Option<PathBuf>,
}

/// Execute one task, as invoked by the compiled container command
#[derive(Debug, Args, Clone)]
pub struct RunTaskCommand {
    /// Component name, e.g. `build-topology`
    #[arg(long)]
    pub component: String,

    /// Task parameters as JSON
    #[arg(long)]
    pub params: String,

    /// Parameter input (name=value)
    #[arg(long, value_parser = parse_key_value)]
    pub parameter: Vec<(String, String)>,

    /// Artifact input (name=path)
    #[arg(long, value_parser = parse_key_value)]
    pub input: Vec<(String, String)>,

    /// Output destination (name=path)
    #[arg(long, value_parser = parse_key_value)]
    pub output: Vec<(String, String)>,

    /// Scratch directory (defaults to a temporary one)
    #[arg(long)]
    pub workdir: Option<PathBuf>,
}

/// Validate a pipeline configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("Invalid key=value pair: {}", s)),
    }
}
