//! Quorum leniency gate.
//!
//! # States
//! ```text
//! Unset ── minority + API down ──▶ GrantedAt(t)
//! GrantedAt(t) ── elapsed >= window ──▶ (deny, stays GrantedAt)
//! any ── cluster initialized ──▶ Cleared (terminal)
//! ```
//!
//! A node in the numeric minority of a cluster that has lost quorum cannot
//! make its control plane answer: it waits for a majority that may still be
//! booting. The gate lets such a node pass its liveness check for a bounded
//! time during bootstrap. Once the cluster has been seen healthy the
//! allowance is gone for the rest of the process lifetime.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::observability::metrics;

/// Source of the current time.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;
}

/// Wall clock backed by [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        *offset += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C: Clock> Clock for std::sync::Arc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// Leniency bookkeeping held across liveness checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeniencyState {
    /// No allowance has been made yet.
    Unset,
    /// The allowance started at this instant.
    GrantedAt(Instant),
    /// The cluster was seen initialized; no allowance will be made again.
    Cleared,
}

/// True when `replica` sits strictly below half the member count.
pub fn is_minority(replica: u32, member_count: usize) -> bool {
    (replica as usize) < member_count / 2
}

/// Decides whether an unreachable control plane should be tolerated.
#[derive(Debug)]
pub struct QuorumLeniencyGate<K = SystemClock> {
    window: Duration,
    clock: K,
    state: Mutex<LeniencyState>,
}

impl QuorumLeniencyGate<SystemClock> {
    pub fn new(window: Duration) -> Self {
        Self::with_clock(window, SystemClock)
    }
}

impl<K: Clock> QuorumLeniencyGate<K> {
    /// A zero `window` never expires.
    pub fn with_clock(window: Duration, clock: K) -> Self {
        Self {
            window,
            clock,
            state: Mutex::new(LeniencyState::Unset),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn state(&self) -> LeniencyState {
        *self.lock()
    }

    /// Evaluate the gate now. Only call this when the API is unreachable.
    pub fn should_grant(&self, replica: u32, member_count: usize) -> bool {
        self.should_grant_at(replica, member_count, self.clock.now())
    }

    /// Evaluate the gate at `now`.
    ///
    /// The minority check and the recording of the grant happen under one
    /// lock so concurrent probes record a single start time.
    pub fn should_grant_at(&self, replica: u32, member_count: usize, now: Instant) -> bool {
        if !is_minority(replica, member_count) {
            tracing::debug!(replica, member_count, "Not in cluster minority, no leniency");
            return false;
        }

        let mut state = self.lock();
        let granted = match *state {
            LeniencyState::Cleared => {
                tracing::debug!("Cluster was already initialized, no leniency");
                false
            }
            LeniencyState::Unset => {
                *state = LeniencyState::GrantedAt(now);
                tracing::info!(
                    replica,
                    member_count,
                    window = ?self.window,
                    "Control plane unreachable while in cluster minority, granting leniency"
                );
                true
            }
            LeniencyState::GrantedAt(start) => {
                let elapsed = now.saturating_duration_since(start);
                if !self.window.is_zero() && elapsed >= self.window {
                    tracing::warn!(
                        elapsed = ?elapsed,
                        window = ?self.window,
                        "Initial cluster member readiness has taken longer than the lenience period, giving up"
                    );
                    false
                } else {
                    true
                }
            }
        };

        if granted {
            metrics::record_leniency_grant();
        }
        granted
    }

    /// Record that the cluster has been observed initialized.
    pub fn mark_initialized(&self) {
        let mut state = self.lock();
        if *state != LeniencyState::Cleared {
            tracing::debug!(previous = ?*state, "Cluster initialized, clearing leniency");
            *state = LeniencyState::Cleared;
        }
    }

    fn lock(&self) -> MutexGuard<'_, LeniencyState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
