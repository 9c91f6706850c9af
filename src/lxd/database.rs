//! Cluster membership read straight from the local database.
//!
//! `lxd cluster list-database` works without the daemon answering on its
//! socket, which is exactly the situation before a cluster regains quorum.
//! The output is a text table with one `address:port` per row.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use thiserror::Error;
use tokio::process::Command;

/// Errors from the database listing command.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("{program} did not finish within {timeout:?}")]
    Timeout { program: String, timeout: Duration },
}

fn member_row() -> &'static Regex {
    static ROW: OnceLock<Regex> = OnceLock::new();
    ROW.get_or_init(|| Regex::new(r"(?m)^\|\s*(.+:\d+)\s*\|$").expect("member row pattern is valid"))
}

/// Extract member addresses from `list-database` table output, in order.
///
/// Rows that do not look like `| host:port |` are skipped.
pub fn parse_member_table(output: &str) -> Vec<String> {
    member_row()
        .captures_iter(output)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim_end().to_string())
        .collect()
}

/// Runs the database listing command.
#[derive(Debug, Clone)]
pub struct DatabaseLister {
    program: String,
    timeout: Duration,
}

impl DatabaseLister {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// List the members recorded in the local cluster database.
    pub async fn list_members(&self) -> Result<Vec<String>, DatabaseError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(["cluster", "list-database"]).kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                return Err(DatabaseError::Spawn {
                    program: self.program.clone(),
                    source,
                })
            }
            Err(_) => {
                return Err(DatabaseError::Timeout {
                    program: self.program.clone(),
                    timeout: self.timeout,
                })
            }
        };

        if !output.status.success() {
            return Err(DatabaseError::Failed {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let members = parse_member_table(&String::from_utf8_lossy(&output.stdout));
        tracing::debug!(count = members.len(), "Read cluster members from database");
        Ok(members)
    }
}
