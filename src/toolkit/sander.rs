//! sander input rendering

use crate::core::params::{MinimizationParams, SimulationType};
use std::ffi::OsString;
use std::path::Path;

/// Name of the generated namelist file inside the working directory
pub const MDIN_FILE: &str = "sander.mdin";

/// Files a minimization run reads and writes
#[derive(Debug, Clone, Copy)]
pub struct MinimizationRequest<'a> {
    pub params: &'a MinimizationParams,
    pub topology: &'a Path,
    pub coordinates: &'a Path,
    /// Reference coordinates for the positional restraint
    pub reference: Option<&'a Path>,
    pub trajectory: &'a Path,
    pub restart: &'a Path,
    pub log: &'a Path,
    pub workdir: &'a Path,
}

// Fortran namelists read `50` and `50.0` alike, but keep the decimal point
fn real(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

/// Render the `&cntrl` namelist for a minimization
pub fn render_mdin(params: &MinimizationParams) -> String {
    let mut lines = Vec::new();
    lines.push(match params.restraint {
        Some(_) => "Minimization with positional restraints".to_string(),
        None => "Minimization".to_string(),
    });
    lines.push(" &cntrl".to_string());
    lines.push("  imin = 1,".to_string());
    lines.push(format!("  maxcyc = {},", params.maxcyc));
    if let Some(ncyc) = params.ncyc {
        lines.push(format!("  ncyc = {},", ncyc));
    }
    lines.push(format!("  ntpr = {},", params.ntpr));
    lines.push(format!("  ntb = {},", params.simulation_type.ntb()));
    if params.simulation_type == SimulationType::MinVacuo {
        lines.push("  igb = 0,".to_string());
    }
    lines.push(format!("  cut = {},", real(params.simulation_type.cutoff())));
    if let Some(restraint) = &params.restraint {
        lines.push("  ntr = 1,".to_string());
        lines.push(format!("  restraint_wt = {},", real(restraint.weight)));
        lines.push(format!("  restraintmask = \"{}\",", restraint.mask));
    }
    lines.push(" /".to_string());

    let mut mdin = lines.join("\n");
    mdin.push('\n');
    mdin
}

/// Command line for `sander` given the namelist path
pub fn sander_args(request: &MinimizationRequest<'_>, mdin: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-O".into(),
        "-i".into(),
        mdin.into(),
        "-p".into(),
        request.topology.into(),
        "-c".into(),
        request.coordinates.into(),
        "-r".into(),
        request.restart.into(),
        "-x".into(),
        request.trajectory.into(),
        "-o".into(),
        request.log.into(),
    ];
    if let Some(reference) = request.reference {
        args.push("-ref".into());
        args.push(reference.into());
    }
    args
}
