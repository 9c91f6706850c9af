//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, stderr or syslog)
//!     → metrics.rs (counters and gauges)
//!
//! Consumers:
//!     → Log aggregation (stderr, local syslog)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Failure detail of a health check is only ever logged
//! - Metrics calls are no-ops unless an exporter is installed

pub mod logging;
pub mod metrics;
