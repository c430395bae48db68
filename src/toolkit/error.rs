//! Toolkit error types

use crate::core::params::ParamsError;
use std::path::PathBuf;
use thiserror::Error;

/// Error types for toolkit operations
#[derive(Debug, Error)]
pub enum ToolkitError {
    #[error("Failed to spawn {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with code {code}: {stderr}")]
    Exit {
        tool: String,
        code: i32,
        stderr: String,
    },

    #[error("{tool} timed out after {secs} seconds")]
    Timeout { tool: String, secs: u64 },

    #[error("Expected output was not written: {}", .0.display())]
    MissingOutput(PathBuf),

    #[error("Request to {url} failed with status {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Params(#[from] ParamsError),
}
