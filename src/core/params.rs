//! Typed parameters for each toolkit operation
//!
//! Every structure rejects unknown keys when deserialized and exposes a
//! `validate` method, so a bad option fails while the pipeline is being
//! built rather than when the external tool runs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default structure archive download endpoint
pub const DEFAULT_PDB_URL: &str = "https://files.rcsb.org/download";

/// Restraint mask selecting every non-hydrogen atom
pub const HEAVY_ATOM_MASK: &str = ":*&!@H=";

/// Errors raised while building or validating parameters
#[derive(Debug, Error, PartialEq)]
pub enum ParamsError {
    #[error("Invalid value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("Unknown energy term: {0}")]
    UnknownEnergyTerm(String),

    #[error("Failed to parse parameters: {0}")]
    Parse(String),
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ParamsError {
    ParamsError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// Check that a structure code is a bare archive identifier
///
/// The code names a local file and part of the download URL, so anything
/// other than ASCII letters and digits is rejected.
pub fn validate_pdb_code(code: &str) -> Result<(), ParamsError> {
    if code.is_empty() {
        return Err(invalid("pdb_code", "must not be empty"));
    }
    if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(invalid(
            "pdb_code",
            format!("'{}' must contain only ASCII letters and digits", code),
        ));
    }
    Ok(())
}

/// Structure download options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchParams {
    /// Base URL of the structure archive
    pub pdb_url: String,

    /// Record groups to keep (empty keeps every line)
    pub filter: Vec<String>,
}

impl Default for FetchParams {
    fn default() -> Self {
        Self {
            pdb_url: DEFAULT_PDB_URL.to_string(),
            filter: vec!["ATOM".to_string(), "MODEL".to_string(), "ENDMDL".to_string()],
        }
    }
}

impl FetchParams {
    pub fn validate(&self) -> Result<(), ParamsError> {
        if !(self.pdb_url.starts_with("http://") || self.pdb_url.starts_with("https://")) {
            return Err(invalid("pdb_url", format!("'{}' is not an http(s) URL", self.pdb_url)));
        }
        if self.filter.iter().any(|group| group.trim().is_empty()) {
            return Err(invalid("filter", "record groups must not be blank"));
        }
        Ok(())
    }
}

/// pdb4amber options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PrepareParams {
    /// Strip all hydrogen atoms
    pub remove_hydrogens: bool,

    /// Strip crystallographic waters
    pub remove_waters: bool,
}

/// tleap options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TopologyParams {
    /// Force fields to source, e.g. `protein.ff14SB`
    pub forcefield: Vec<String>,
}

impl Default for TopologyParams {
    fn default() -> Self {
        Self {
            forcefield: vec!["protein.ff14SB".to_string()],
        }
    }
}

impl TopologyParams {
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.forcefield.is_empty() {
            return Err(invalid("forcefield", "at least one force field is required"));
        }
        if let Some(bad) = self
            .forcefield
            .iter()
            .find(|ff| ff.is_empty() || ff.chars().any(char::is_whitespace))
        {
            return Err(invalid("forcefield", format!("'{}' is not a force field name", bad)));
        }
        Ok(())
    }
}

/// Minimization flavour, selects the periodic/solvent settings of the run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationType {
    /// Non-periodic minimization in vacuum
    #[default]
    MinVacuo,
    /// Minimization under periodic boundary conditions
    Minimization,
}

impl SimulationType {
    /// Value of `ntb` for this simulation type
    pub fn ntb(self) -> u8 {
        match self {
            SimulationType::MinVacuo => 0,
            SimulationType::Minimization => 1,
        }
    }

    /// Non-bonded cutoff in Angstrom
    pub fn cutoff(self) -> f64 {
        match self {
            SimulationType::MinVacuo => 12.0,
            SimulationType::Minimization => 10.0,
        }
    }
}

/// Positional restraint applied during minimization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Restraint {
    /// Atom selection mask
    pub mask: String,

    /// Force constant in kcal/mol/A^2
    pub weight: f64,
}

/// sander minimization options
///
/// Fields omitted from a configuration file fall back to an unrestrained
/// 500-cycle vacuum minimization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MinimizationParams {
    pub simulation_type: SimulationType,

    /// Maximum number of minimization cycles
    pub maxcyc: u32,

    /// Number of steepest descent cycles before switching to conjugate gradient
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ncyc: Option<u32>,

    /// Print frequency (cycles)
    pub ntpr: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub restraint: Option<Restraint>,
}

impl Default for MinimizationParams {
    fn default() -> Self {
        Self {
            simulation_type: SimulationType::MinVacuo,
            maxcyc: 500,
            ncyc: None,
            ntpr: 5,
            restraint: None,
        }
    }
}

impl MinimizationParams {
    /// Minimization with every heavy atom held in place
    pub fn restrained_heavy_atoms() -> Self {
        Self {
            restraint: Some(Restraint {
                mask: HEAVY_ATOM_MASK.to_string(),
                weight: 50.0,
            }),
            ..Self::default()
        }
    }

    /// Whether this run needs reference coordinates
    pub fn is_restrained(&self) -> bool {
        self.restraint.is_some()
    }

    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.maxcyc == 0 {
            return Err(invalid("maxcyc", "must be greater than zero"));
        }
        if self.ntpr == 0 {
            return Err(invalid("ntpr", "must be greater than zero"));
        }
        if let Some(ncyc) = self.ncyc {
            if ncyc > self.maxcyc {
                return Err(invalid(
                    "ncyc",
                    format!("{} exceeds maxcyc ({})", ncyc, self.maxcyc),
                ));
            }
        }
        if let Some(restraint) = &self.restraint {
            if restraint.mask.trim().is_empty() {
                return Err(invalid("restraint.mask", "must not be empty"));
            }
            if restraint.mask.contains(|c: char| c == '"' || c == '\'') {
                return Err(invalid("restraint.mask", "must not contain quotes"));
            }
            if !restraint.weight.is_finite() || restraint.weight <= 0.0 {
                return Err(invalid(
                    "restraint.weight",
                    format!("{} is not a positive force constant", restraint.weight),
                ));
            }
        }
        Ok(())
    }
}

/// Energy terms that can be extracted from a minimization log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EnergyTerm {
    Energy,
    Rms,
    Gmax,
    Bond,
    Angle,
    Dihed,
    Vdwaals,
    Eel,
    Hbond,
    Vdw14,
    Eel14,
    Restraint,
    Egb,
    Esurf,
}

impl EnergyTerm {
    pub const ALL: [EnergyTerm; 14] = [
        EnergyTerm::Energy,
        EnergyTerm::Rms,
        EnergyTerm::Gmax,
        EnergyTerm::Bond,
        EnergyTerm::Angle,
        EnergyTerm::Dihed,
        EnergyTerm::Vdwaals,
        EnergyTerm::Eel,
        EnergyTerm::Hbond,
        EnergyTerm::Vdw14,
        EnergyTerm::Eel14,
        EnergyTerm::Restraint,
        EnergyTerm::Egb,
        EnergyTerm::Esurf,
    ];

    /// Column label used in energy series files
    pub fn label(self) -> &'static str {
        match self {
            EnergyTerm::Energy => "ENERGY",
            EnergyTerm::Rms => "RMS",
            EnergyTerm::Gmax => "GMAX",
            EnergyTerm::Bond => "BOND",
            EnergyTerm::Angle => "ANGLE",
            EnergyTerm::Dihed => "DIHED",
            EnergyTerm::Vdwaals => "VDWAALS",
            EnergyTerm::Eel => "EEL",
            EnergyTerm::Hbond => "HBOND",
            EnergyTerm::Vdw14 => "VDW14",
            EnergyTerm::Eel14 => "EEL14",
            EnergyTerm::Restraint => "RESTRAINT",
            EnergyTerm::Egb => "EGB",
            EnergyTerm::Esurf => "ESURF",
        }
    }

    /// Name as printed in sander output
    pub fn log_label(self) -> &'static str {
        match self {
            EnergyTerm::Vdw14 => "1-4 VDW",
            EnergyTerm::Eel14 => "1-4 EEL",
            other => other.label(),
        }
    }

    /// Look up a term by its sander output name
    pub fn from_log_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|term| term.log_label() == label)
    }
}

impl fmt::Display for EnergyTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for EnergyTerm {
    type Err = ParamsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|term| term.label() == wanted || term.log_label() == wanted)
            .ok_or_else(|| ParamsError::UnknownEnergyTerm(s.to_string()))
    }
}

/// Options for a minimization task: the run itself plus log post-processing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MinimizeParams {
    pub mdin: MinimizationParams,

    /// Terms written to the energy series file
    pub energy_terms: Vec<EnergyTerm>,
}

impl Default for MinimizeParams {
    fn default() -> Self {
        Self {
            mdin: MinimizationParams::default(),
            energy_terms: vec![EnergyTerm::Energy],
        }
    }
}

impl MinimizeParams {
    pub fn new(mdin: MinimizationParams, energy_terms: Vec<EnergyTerm>) -> Self {
        Self { mdin, energy_terms }
    }

    pub fn validate(&self) -> Result<(), ParamsError> {
        self.mdin.validate()?;
        if self.energy_terms.is_empty() {
            return Err(invalid("energy_terms", "at least one term is required"));
        }
        Ok(())
    }
}
