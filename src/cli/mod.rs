//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{CompileCommand, RunCommand, RunTaskCommand, SubmitCommand, ValidateCommand};
use std::ffi::OsString;

/// Molecular dynamics preparation pipeline
#[derive(Debug, Parser, Clone)]
#[command(name = "md-pipeline")]
#[command(version)]
#[command(
    about = "Compile, submit and run a molecular dynamics preparation workflow",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to pipeline configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Write the workflow definition file
    Compile(CompileCommand),

    /// Register the workflow with the service and start a run
    Submit(SubmitCommand),

    /// Run the whole workflow on this machine
    Run(RunCommand),

    /// Execute a single task (container entry point)
    RunTask(RunTaskCommand),

    /// Validate the configuration and print the graph
    Validate(ValidateCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
