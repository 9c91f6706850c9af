//! Memory pressure handling.
//!
//! # Data Flow
//! ```text
//! watchdog.rs (timer)
//!     → sweep.rs
//!         → memory.rs (MemAvailable >= min_free? done)
//!         → list workloads from the control plane
//!         → selector.rs (least recently used, not opted out)
//!         → graceful stop, then forced stop
//! ```
//!
//! # Design Decisions
//! - Workloads are read fresh on every sweep
//! - A failed sweep is logged and the next tick starts from scratch
//! - At most one workload is evicted per tick

pub mod memory;
pub mod selector;
pub mod sweep;
pub mod watchdog;

pub use memory::{MemoryError, MemoryProbe, ProcMeminfo};
pub use selector::{select_victim, Workload, WorkloadStatus, DEFAULT_SKIP_KEY};
pub use sweep::{EvictionOutcome, InstanceApi, LxdInstances, OomSweeper, Sweep, SweepError};
pub use watchdog::MemoryWatchdog;
