//! Liveness subsystem.
//!
//! # Data Flow
//! ```text
//! GET /liveness
//!     → liveness.rs (one evaluation per request)
//!         → process.rs (is the control daemon running?)
//!         → cluster::membership (API, or database fallback)
//!         → leniency.rs (bootstrap allowance for minority nodes)
//!     → Verdict → 204 / 500
//! ```
//!
//! # Design Decisions
//! - Failure detail goes to the log, never to the prober
//! - The leniency state is owned by the evaluator and lock-guarded
//! - Time is injected through [`Clock`] so expiry can be tested

pub mod leniency;
pub mod liveness;
pub mod process;

pub use leniency::{Clock, LeniencyState, ManualClock, QuorumLeniencyGate, SystemClock};
pub use liveness::{CheckLiveness, LivenessEvaluator, Verdict};
pub use process::{Pgrep, ProcessCheckError, ProcessChecker};
