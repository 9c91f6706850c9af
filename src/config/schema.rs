//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the daemon.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::duration::serde_duration;
use crate::oom::DEFAULT_SKIP_KEY;

/// Root configuration for the watchdog.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct DaemonConfig {
    /// HTTP listener for health probes.
    pub listener: ListenerConfig,

    /// Control-plane connection settings.
    pub lxd: LxdConfig,

    /// Liveness policy.
    pub liveness: LivenessConfig,

    /// Memory watchdog.
    pub oom: OomConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Upper bound on handling one request.
    #[serde(with = "serde_duration")]
    pub request_timeout: Duration,

    /// How long in-flight requests may drain on shutdown.
    #[serde(with = "serde_duration")]
    pub drain_timeout: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout: Duration::from_secs(30),
            drain_timeout: Duration::from_secs(2),
        }
    }
}

/// Control-plane connection settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LxdConfig {
    /// Unix socket of the REST API.
    pub socket: String,

    /// Binary used for the database fallback.
    pub binary: String,

    /// Process name looked for by the presence check.
    pub process_name: String,

    /// Deadline for the membership query made by a liveness check.
    #[serde(with = "serde_duration")]
    pub liveness_timeout: Duration,

    /// Deadline for API calls made by the memory watchdog.
    #[serde(with = "serde_duration")]
    pub api_timeout: Duration,

    /// Deadline for child processes (presence check, database read).
    #[serde(with = "serde_duration")]
    pub command_timeout: Duration,
}

impl Default for LxdConfig {
    fn default() -> Self {
        Self {
            socket: "/var/lib/lxd/unix.socket".to_string(),
            binary: "lxd".to_string(),
            process_name: "lxd".to_string(),
            liveness_timeout: Duration::from_secs(3),
            api_timeout: Duration::from_secs(60),
            command_timeout: Duration::from_secs(5),
        }
    }
}

/// Liveness policy.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LivenessConfig {
    /// Lenience period for initial cluster member readiness (0 = no expiry).
    #[serde(with = "serde_duration")]
    pub cluster_lenience: Duration,

    /// Replica index; derived from the hostname when unset.
    pub replica: Option<u32>,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            cluster_lenience: Duration::from_secs(5 * 60),
            replica: None,
        }
    }
}

/// Memory watchdog configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct OomConfig {
    /// Sweep interval (0 = disabled).
    #[serde(with = "serde_duration")]
    pub interval: Duration,

    /// Minimum available memory in bytes before evicting.
    pub min_free: u64,

    /// Guest-side timeout of a stop request.
    pub stop_timeout_secs: u32,

    /// Time allowed for a stop operation to complete.
    pub operation_timeout_secs: u64,

    /// Instance config key that exempts an instance.
    pub skip_key: String,

    /// meminfo-formatted file to read available memory from.
    pub meminfo_path: String,
}

impl Default for OomConfig {
    fn default() -> Self {
        Self {
            interval: Duration::ZERO,
            min_free: 64 * 1024 * 1024,
            stop_timeout_secs: 5,
            operation_timeout_secs: 10,
            skip_key: DEFAULT_SKIP_KEY.to_string(),
            meminfo_path: "/proc/meminfo".to_string(),
        }
    }
}

/// Logging and metrics.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Write log messages to syslog.
    pub syslog: bool,

    /// Log filter directives (overrides `RUST_LOG`).
    pub log_filter: Option<String>,

    /// Prometheus endpoint address; disabled when unset.
    pub metrics_address: Option<String>,
}
