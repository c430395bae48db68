//! AmberTools toolkit wrapper
//!
//! Each operation invokes exactly one external program (or the structure
//! archive) and checks that the files it promised were written.

pub mod config;
pub mod error;
pub mod leap;
pub mod minout;
pub mod pdb;
pub mod sander;
pub mod subprocess;

use crate::core::params::{EnergyTerm, FetchParams, PrepareParams};
use async_trait::async_trait;
use std::ffi::{OsStr, OsString};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

pub use config::ToolkitConfig;
pub use error::ToolkitError;
pub use leap::TopologyRequest;
pub use minout::EnergySeries;
pub use sander::MinimizationRequest;
pub use subprocess::{ToolOutput, ToolRunner};

/// Trait for toolkit operations - allows for different implementations
#[async_trait]
pub trait Toolkit: Send + Sync {
    /// Download a structure entry to `output`
    async fn fetch_structure(
        &self,
        pdb_code: &str,
        params: &FetchParams,
        output: &Path,
    ) -> Result<(), ToolkitError>;

    /// Normalize a structure for the force field (pdb4amber)
    async fn repair_structure(
        &self,
        input: &Path,
        output: &Path,
        params: &PrepareParams,
    ) -> Result<(), ToolkitError>;

    /// Build topology and coordinates (tleap)
    async fn generate_topology(&self, request: &TopologyRequest<'_>) -> Result<(), ToolkitError>;

    /// Run an energy minimization (sander)
    async fn run_minimization(
        &self,
        request: &MinimizationRequest<'_>,
    ) -> Result<(), ToolkitError>;

    /// Extract an energy series from a minimization log
    async fn process_minout(
        &self,
        log: &Path,
        output: &Path,
        terms: &[EnergyTerm],
    ) -> Result<EnergySeries, ToolkitError> {
        let content = tokio::fs::read_to_string(log).await?;
        let series = minout::parse_minout(&content);
        if series.is_empty() {
            warn!("No energy records found in {}", log.display());
        }
        tokio::fs::write(output, series.to_dat(terms)).await?;
        debug!("Wrote {} energy records to {}", series.len(), output.display());
        Ok(series)
    }
}

fn ensure_written(path: &Path) -> Result<(), ToolkitError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ToolkitError::MissingOutput(path.to_path_buf()))
    }
}

fn parent_or_current(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Toolkit backed by the AmberTools executables and the RCSB archive
#[derive(Debug, Clone)]
pub struct AmberToolkit {
    config: ToolkitConfig,
    runner: ToolRunner,
    http: reqwest::Client,
}

impl AmberToolkit {
    /// Create a new toolkit
    pub fn new(config: ToolkitConfig) -> Result<Self, ToolkitError> {
        let runner = ToolRunner::new(config.timeout_secs);
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            config,
            runner,
            http,
        })
    }

    pub fn config(&self) -> &ToolkitConfig {
        &self.config
    }
}

#[async_trait]
impl Toolkit for AmberToolkit {
    async fn fetch_structure(
        &self,
        pdb_code: &str,
        params: &FetchParams,
        output: &Path,
    ) -> Result<(), ToolkitError> {
        let content = pdb::download_structure(&self.http, pdb_code, params).await?;
        tokio::fs::write(output, &content).await?;
        info!(
            "Downloaded {} ({} lines) to {}",
            pdb_code,
            content.lines().count(),
            output.display()
        );
        Ok(())
    }

    async fn repair_structure(
        &self,
        input: &Path,
        output: &Path,
        params: &PrepareParams,
    ) -> Result<(), ToolkitError> {
        let mut args: Vec<OsString> = vec![
            "-i".into(),
            input.as_os_str().to_owned(),
            "-o".into(),
            output.as_os_str().to_owned(),
        ];
        if params.remove_hydrogens {
            args.push("-y".into());
        }
        if params.remove_waters {
            args.push("-d".into());
        }

        let cwd = parent_or_current(output);
        let result: ToolOutput = self
            .runner
            .run(&self.config.pdb4amber, args, cwd)
            .await?;
        debug!("pdb4amber: {}", result.stderr.trim());
        ensure_written(output)
    }

    async fn generate_topology(&self, request: &TopologyRequest<'_>) -> Result<(), ToolkitError> {
        let script_path = request.workdir.join(leap::LEAP_SCRIPT);
        tokio::fs::write(&script_path, leap::render_script(request)).await?;

        let output = self
            .runner
            .run(
                &self.config.tleap,
                [OsStr::new("-f"), script_path.as_os_str()],
                request.workdir,
            )
            .await?;
        debug!("tleap: {}", output.stdout.trim());

        // tleap reports most failures on stdout and still exits 0
        ensure_written(request.output_top)?;
        ensure_written(request.output_crd)?;
        ensure_written(request.output_pdb)
    }

    async fn run_minimization(
        &self,
        request: &MinimizationRequest<'_>,
    ) -> Result<(), ToolkitError> {
        request.params.validate()?;

        let mdin_path = request.workdir.join(sander::MDIN_FILE);
        tokio::fs::write(&mdin_path, sander::render_mdin(request.params)).await?;

        self.runner
            .run(
                &self.config.sander,
                sander::sander_args(request, &mdin_path),
                request.workdir,
            )
            .await?;

        ensure_written(request.restart)?;
        ensure_written(request.log)
    }
}
