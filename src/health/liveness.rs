//! Liveness evaluation.
//!
//! # Flow (one evaluation per health probe)
//! ```text
//! process check ── absent / tool failed ──▶ Unhealthy
//!     │
//!     ▼
//! membership probe ── hard error ──▶ Unhealthy
//!     │
//!     ├── API answered ──▶ initialized ? (clear leniency, Healthy) : Unhealthy
//!     │
//!     └── database fallback ──▶ leniency gate ? Healthy : Unhealthy
//! ```
//!
//! No retries happen inside an evaluation; the orchestrator probes again.

use std::future::Future;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::cluster::{MembershipProber, NodeIdentity};
use crate::health::leniency::{Clock, QuorumLeniencyGate, SystemClock};
use crate::health::process::ProcessChecker;

/// Outcome of one liveness evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Healthy,
    Unhealthy,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Healthy => "healthy",
            Verdict::Unhealthy => "unhealthy",
        }
    }

    pub fn is_healthy(self) -> bool {
        self == Verdict::Healthy
    }
}

impl From<bool> for Verdict {
    fn from(healthy: bool) -> Self {
        if healthy {
            Verdict::Healthy
        } else {
            Verdict::Unhealthy
        }
    }
}

/// `204 No Content` or `500 Internal Server Error`, never a body.
impl IntoResponse for Verdict {
    fn into_response(self) -> Response {
        match self {
            Verdict::Healthy => StatusCode::NO_CONTENT.into_response(),
            Verdict::Unhealthy => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}

/// Anything that can answer a liveness probe.
pub trait CheckLiveness: Send + Sync + 'static {
    fn check(&self) -> impl Future<Output = Verdict> + Send;
}

/// Evaluates node liveness from process, API and quorum state.
#[derive(Debug)]
pub struct LivenessEvaluator<P, C, K = SystemClock> {
    identity: NodeIdentity,
    process: C,
    prober: P,
    gate: QuorumLeniencyGate<K>,
}

impl<P, C, K> LivenessEvaluator<P, C, K>
where
    P: MembershipProber,
    C: ProcessChecker,
    K: Clock,
{
    pub fn new(identity: NodeIdentity, process: C, prober: P, gate: QuorumLeniencyGate<K>) -> Self {
        Self {
            identity,
            process,
            prober,
            gate,
        }
    }

    pub fn identity(&self) -> NodeIdentity {
        self.identity
    }

    pub fn gate(&self) -> &QuorumLeniencyGate<K> {
        &self.gate
    }

    /// Run one evaluation.
    pub async fn evaluate(&self) -> Verdict {
        match self.process.is_running().await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!("Control daemon process is not running");
                return Verdict::Unhealthy;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to execute process check");
                return Verdict::Unhealthy;
            }
        }

        let snapshot = match self.prober.probe().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::error!(error = %e, "Failed to get cluster members");
                return Verdict::Unhealthy;
            }
        };

        if snapshot.is_fallback() {
            let granted = self
                .gate
                .should_grant(self.identity.replica, snapshot.member_count());
            if !granted {
                tracing::debug!(
                    replica = self.identity.replica,
                    member_count = snapshot.member_count(),
                    "Control plane unreachable and no leniency applies"
                );
            }
            return granted.into();
        }

        if !snapshot.initialized {
            tracing::debug!(members = ?snapshot.members, "Cluster not initialized");
            return Verdict::Unhealthy;
        }

        self.gate.mark_initialized();
        Verdict::Healthy
    }
}

impl<P, C, K> CheckLiveness for LivenessEvaluator<P, C, K>
where
    P: MembershipProber,
    C: ProcessChecker,
    K: Clock,
{
    async fn check(&self) -> Verdict {
        self.evaluate().await
    }
}
