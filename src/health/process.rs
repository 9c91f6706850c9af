//! Local process presence check.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;

/// The check tool itself could not give an answer.
#[derive(Debug, Error)]
pub enum ProcessCheckError {
    #[error("failed to execute {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} did not finish within {timeout:?}")]
    Timeout { program: String, timeout: Duration },
}

/// Reports whether the control daemon's process exists.
pub trait ProcessChecker: Send + Sync + 'static {
    /// `Ok(false)` means the check ran and found nothing.
    fn is_running(&self) -> impl Future<Output = Result<bool, ProcessCheckError>> + Send;
}

/// `pgrep <name>`: exit status zero means at least one match.
#[derive(Debug, Clone)]
pub struct Pgrep {
    program: String,
    name: String,
    timeout: Duration,
}

impl Pgrep {
    pub fn new(name: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: "pgrep".to_string(),
            name: name.into(),
            timeout,
        }
    }

    /// Use a different binary than `pgrep` (same exit status contract).
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

impl ProcessChecker for Pgrep {
    async fn is_running(&self) -> Result<bool, ProcessCheckError> {
        let mut cmd = Command::new(&self.program);
        cmd.arg(&self.name)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true);

        match tokio::time::timeout(self.timeout, cmd.status()).await {
            Ok(Ok(status)) => {
                if !status.success() {
                    tracing::debug!(name = %self.name, status = %status, "Process not found");
                }
                Ok(status.success())
            }
            Ok(Err(source)) => Err(ProcessCheckError::Spawn {
                program: self.program.clone(),
                source,
            }),
            Err(_) => Err(ProcessCheckError::Timeout {
                program: self.program.clone(),
                timeout: self.timeout,
            }),
        }
    }
}
