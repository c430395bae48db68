//! tleap input generation

use crate::core::params::TopologyParams;
use std::fmt::Write;
use std::path::Path;

/// Name of the generated leap script inside the working directory
pub const LEAP_SCRIPT: &str = "leap.in";

/// Files a topology build reads and writes
#[derive(Debug, Clone, Copy)]
pub struct TopologyRequest<'a> {
    pub params: &'a TopologyParams,
    pub input_pdb: &'a Path,
    pub output_pdb: &'a Path,
    pub output_top: &'a Path,
    pub output_crd: &'a Path,
    pub workdir: &'a Path,
}

/// Render the leap script for a topology build
pub fn render_script(request: &TopologyRequest<'_>) -> String {
    let mut script = String::new();
    for forcefield in &request.params.forcefield {
        let _ = writeln!(script, "source leaprc.{}", forcefield);
    }
    let _ = writeln!(script, "mol = loadpdb {}", request.input_pdb.display());
    let _ = writeln!(
        script,
        "saveamberparm mol {} {}",
        request.output_top.display(),
        request.output_crd.display()
    );
    let _ = writeln!(script, "savepdb mol {}", request.output_pdb.display());
    script.push_str("quit\n");
    script
}
