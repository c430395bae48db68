//! External tool invocation

use crate::toolkit::ToolkitError;
use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Captured output of a finished tool
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs external executables with a timeout
#[derive(Debug, Clone)]
pub struct ToolRunner {
    /// Timeout for a single invocation in seconds
    timeout_secs: u64,
}

impl ToolRunner {
    pub fn new(timeout_secs: u64) -> Self {
        Self { timeout_secs }
    }

    /// Run `program` with `args` in `cwd` and capture its output
    ///
    /// # Errors
    /// Returns `ToolkitError` if:
    /// - The executable cannot be spawned
    /// - It exits with a non-zero status
    /// - It does not finish within the timeout (the child is killed)
    pub async fn run<I, S>(
        &self,
        program: &str,
        args: I,
        cwd: &Path,
    ) -> Result<ToolOutput, ToolkitError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        debug!("Spawning {} in {}", program, cwd.display());

        let timeout_duration = Duration::from_secs(self.timeout_secs);

        let result = timeout(
            timeout_duration,
            Command::new(program)
                .args(args)
                .current_dir(cwd)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| ToolkitError::Timeout {
            tool: program.to_string(),
            secs: self.timeout_secs,
        })?;

        let output = result.map_err(|source| ToolkitError::Spawn {
            tool: program.to_string(),
            source,
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            let exit_code = output.status.code().unwrap_or(-1);
            warn!("{} exited with code {}: {}", program, exit_code, stderr.trim());
            return Err(ToolkitError::Exit {
                tool: program.to_string(),
                code: exit_code,
                stderr: stderr.trim().to_string(),
            });
        }

        debug!("{} returned {} bytes of output", program, stdout.len());

        Ok(ToolOutput { stdout, stderr })
    }
}
