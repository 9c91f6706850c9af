//! One OOM sweep: check memory, pick a victim, stop it, kill it if needed.
//!
//! # Escalation
//! ```text
//! graceful stop ── success ──▶ Stopped
//!     │ failure / error
//!     ▼
//! forced stop ── success ──▶ Killed
//!     │ failure / error
//!     ▼
//! SweepError::Escalation
//! ```

use std::future::Future;

use hyper::Method;
use thiserror::Error;

use crate::lxd::types::{Instance, LxdError, LxdResult, StateRequest, STATUS_SUCCESS};
use crate::lxd::LxdClient;
use crate::observability::metrics;
use crate::oom::memory::{MemoryError, MemoryProbe};
use crate::oom::selector::{select_victim, Workload};

/// Result of a sweep that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvictionOutcome {
    /// Enough memory was available.
    NoAction { available: u64 },
    /// The victim shut down gracefully.
    Stopped { name: String },
    /// The victim had to be killed.
    Killed { name: String },
}

impl EvictionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvictionOutcome::NoAction { .. } => "no_action",
            EvictionOutcome::Stopped { .. } => "stopped",
            EvictionOutcome::Killed { .. } => "killed",
        }
    }
}

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("unable to determine free memory: {0}")]
    Memory(#[from] MemoryError),

    #[error("failed to list instances: {0}")]
    List(#[source] LxdError),

    #[error("failed to find OOM candidate")]
    NoCandidate,

    #[error("failed to kill instance {name}: {reason}")]
    Escalation { name: String, reason: String },
}

impl SweepError {
    pub fn as_str(&self) -> &'static str {
        match self {
            SweepError::Memory(_) => "memory_error",
            SweepError::List(_) => "list_error",
            SweepError::NoCandidate => "no_candidate",
            SweepError::Escalation { .. } => "escalation_failed",
        }
    }
}

/// Access to workloads and their run state.
pub trait InstanceApi: Send + Sync + 'static {
    /// All workloads, freshly read.
    fn list_workloads(&self) -> impl Future<Output = LxdResult<Vec<Workload>>> + Send;

    /// Apply a state change and return the final operation status code.
    fn change_state(
        &self,
        name: &str,
        request: StateRequest,
        op_timeout: u64,
    ) -> impl Future<Output = LxdResult<i64>> + Send;
}

/// [`InstanceApi`] backed by the control-plane REST API.
#[derive(Debug, Clone)]
pub struct LxdInstances {
    client: LxdClient,
    skip_key: String,
}

impl LxdInstances {
    pub fn new(client: LxdClient, skip_key: impl Into<String>) -> Self {
        Self {
            client,
            skip_key: skip_key.into(),
        }
    }
}

impl InstanceApi for LxdInstances {
    async fn list_workloads(&self) -> LxdResult<Vec<Workload>> {
        let res = self.client.request(Method::GET, "/1.0/instances", None, None).await?;
        let paths: Vec<String> = res.metadata_as()?;

        let mut workloads = Vec::with_capacity(paths.len());
        for path in paths {
            let res = self.client.request(Method::GET, &path, None, None).await?;
            let instance: Instance = res.metadata_as()?;
            workloads.push(Workload::from_instance(instance, &self.skip_key));
        }
        Ok(workloads)
    }

    async fn change_state(&self, name: &str, request: StateRequest, op_timeout: u64) -> LxdResult<i64> {
        let path = format!("/1.0/instances/{name}/state");
        let body = serde_json::to_value(&request).map_err(|e| LxdError::Parse(e.to_string()))?;
        let res = self
            .client
            .request(Method::PUT, &path, Some(body), Some(op_timeout))
            .await?;
        Ok(res.status_code)
    }
}

/// Something the watchdog can run on every tick.
pub trait Sweep: Send + Sync + 'static {
    fn sweep(&self) -> impl Future<Output = Result<EvictionOutcome, SweepError>> + Send;
}

/// Frees memory by stopping the least recently used workload.
#[derive(Debug)]
pub struct OomSweeper<M, I> {
    memory: M,
    instances: I,
    min_free: u64,
    stop_timeout_secs: u32,
    operation_timeout_secs: u64,
}

impl<M: MemoryProbe, I: InstanceApi> OomSweeper<M, I> {
    /// `min_free` is in bytes.
    pub fn new(memory: M, instances: I, min_free: u64) -> Self {
        Self {
            memory,
            instances,
            min_free,
            stop_timeout_secs: 5,
            operation_timeout_secs: 10,
        }
    }

    /// Guest-side stop timeout and time allowed for the operation to finish.
    pub fn with_timeouts(mut self, stop_timeout_secs: u32, operation_timeout_secs: u64) -> Self {
        self.stop_timeout_secs = stop_timeout_secs;
        self.operation_timeout_secs = operation_timeout_secs;
        self
    }

    /// Run one sweep.
    pub async fn run_once(&self) -> Result<EvictionOutcome, SweepError> {
        let available = self.memory.available_bytes().await?;
        metrics::record_memory_available(available);

        if available >= self.min_free {
            return Ok(EvictionOutcome::NoAction { available });
        }

        tracing::warn!(
            available_mib = available / (1024 * 1024),
            min_free_mib = self.min_free / (1024 * 1024),
            "Low on memory, looking for OOM victim"
        );

        let workloads = self.instances.list_workloads().await.map_err(SweepError::List)?;
        let victim = select_victim(&workloads).ok_or(SweepError::NoCandidate)?;

        self.evict(&victim.name).await
    }

    async fn evict(&self, name: &str) -> Result<EvictionOutcome, SweepError> {
        tracing::warn!(instance = %name, "Stopping instance");
        let graceful = StateRequest::stop(self.stop_timeout_secs, false);
        match self
            .instances
            .change_state(name, graceful, self.operation_timeout_secs)
            .await
        {
            Ok(STATUS_SUCCESS) => return Ok(EvictionOutcome::Stopped { name: name.to_string() }),
            Ok(status) => {
                tracing::warn!(instance = %name, status, "Failed to stop instance, killing");
            }
            Err(e) => {
                tracing::warn!(instance = %name, error = %e, "Failed to stop instance, killing");
            }
        }

        let forced = StateRequest::stop(self.stop_timeout_secs, true);
        match self
            .instances
            .change_state(name, forced, self.operation_timeout_secs)
            .await
        {
            Ok(STATUS_SUCCESS) => Ok(EvictionOutcome::Killed { name: name.to_string() }),
            Ok(status) => Err(SweepError::Escalation {
                name: name.to_string(),
                reason: format!("kill returned non-OK status {status}"),
            }),
            Err(e) => Err(SweepError::Escalation {
                name: name.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

impl<M: MemoryProbe, I: InstanceApi> Sweep for OomSweeper<M, I> {
    async fn sweep(&self) -> Result<EvictionOutcome, SweepError> {
        let result = self.run_once().await;
        metrics::record_sweep(match &result {
            Ok(outcome) => outcome.as_str(),
            Err(e) => e.as_str(),
        });
        result
    }
}
