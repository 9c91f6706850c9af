//! livenessd library
//!
//! Liveness checks with quorum-lenient cluster readiness, and an opt-in
//! OOM watchdog that stops the least recently used workload when available
//! memory runs low.

pub mod cluster;
pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod lxd;
pub mod observability;
pub mod oom;

pub use config::schema::DaemonConfig;
pub use http::HttpServer;
pub use lifecycle::{Daemon, Shutdown};
