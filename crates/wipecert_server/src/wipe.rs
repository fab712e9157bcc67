//! Bounded invocation of the external wipe executable.
//!
//! The executable is called as `<exe> --path <path> --method <method>`.
//! A run that outlives the configured limit is killed and reported as
//! [`WipeError::Timeout`].

use serde::Serialize;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use wipecert_certify::WipeConfig;

/// Wipe execution errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WipeError {
    /// No executable configured
    #[error("wipe executable not configured")]
    NotConfigured,

    /// The process could not be started
    #[error("failed to start wipe executable: {0}")]
    Spawn(String),

    /// The process exited unsuccessfully
    #[error("wipe failed (exit code {code:?}): {stderr}")]
    Failed {
        /// Exit code, absent if killed by a signal
        code: Option<i32>,
        /// Captured standard error
        stderr: String,
    },

    /// The process was killed after the limit elapsed
    #[error("wipe timed out after {after_ms}ms")]
    Timeout {
        /// Limit in milliseconds
        after_ms: u64,
    },
}

/// Result of a successful wipe run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WipeOutcome {
    /// Always true; failures are errors
    pub success: bool,
    /// Captured standard output
    pub log: String,
}

/// Runs the wipe executable with a hard deadline
#[derive(Debug, Clone)]
pub struct WipeRunner {
    executable: Option<PathBuf>,
    timeout: Duration,
}

impl WipeRunner {
    /// Create a runner
    #[must_use]
    pub fn new(executable: Option<PathBuf>, timeout: Duration) -> Self {
        Self {
            executable,
            timeout,
        }
    }

    /// Create a runner from the `[wipe]` config section
    #[must_use]
    pub fn from_config(config: &WipeConfig) -> Self {
        Self::new(
            config.executable.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Whether an executable is configured
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.executable.is_some()
    }

    /// Run a wipe of `path` using `method`
    ///
    /// # Errors
    ///
    /// See [`WipeError`]
    pub async fn run(&self, path: &str, method: &str) -> Result<WipeOutcome, WipeError> {
        let executable = self.executable.as_ref().ok_or(WipeError::NotConfigured)?;

        let child = Command::new(executable)
            .arg("--path")
            .arg(path)
            .arg("--method")
            .arg(method)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| WipeError::Spawn(format!("{}: {}", executable.display(), e)))?;

        tracing::info!(%path, %method, pid = child.id(), "wipe started");

        // Dropping the wait future on timeout drops the child, which kills it
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| WipeError::Spawn(e.to_string()))?,
            Err(_) => {
                tracing::warn!(%path, "wipe timed out, child killed");
                return Err(WipeError::Timeout {
                    after_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                });
            }
        };

        if output.status.success() {
            tracing::info!(%path, "wipe finished");
            Ok(WipeOutcome {
                success: true,
                log: String::from_utf8_lossy(&output.stdout).into_owned(),
            })
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            tracing::warn!(%path, code = ?output.status.code(), "wipe failed");
            Err(WipeError::Failed {
                code: output.status.code(),
                stderr,
            })
        }
    }
}
