//! Toolkit configuration

use serde::{Deserialize, Serialize};

/// Locations of the AmberTools executables and the subprocess timeout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolkitConfig {
    /// Path to pdb4amber (defaults to "pdb4amber" on PATH)
    pub pdb4amber: String,

    /// Path to tleap
    pub tleap: String,

    /// Path to sander
    pub sander: String,

    /// Timeout for a single tool invocation in seconds
    pub timeout_secs: u64,
}

impl Default for ToolkitConfig {
    fn default() -> Self {
        Self {
            pdb4amber: "pdb4amber".to_string(),
            tleap: "tleap".to_string(),
            sander: "sander".to_string(),
            timeout_secs: 10800,
        }
    }
}

impl ToolkitConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pdb4amber(mut self, path: impl Into<String>) -> Self {
        self.pdb4amber = path.into();
        self
    }

    pub fn with_tleap(mut self, path: impl Into<String>) -> Self {
        self.tleap = path.into();
        self
    }

    pub fn with_sander(mut self, path: impl Into<String>) -> Self {
        self.sander = path.into();
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}
