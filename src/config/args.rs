//! Command-line flags.
//!
//! Flags override values read from the optional config file.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::config::duration::parse_duration;
use crate::config::loader::{read_config, ConfigError};
use crate::config::schema::DaemonConfig;
use crate::config::validation::validate_config;

#[derive(Debug, Default, Parser)]
#[command(name = "livenessd", version)]
#[command(about = "Liveness checks and OOM protection for a cluster node", long_about = None)]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Listen address
    #[arg(long)]
    pub listen: Option<String>,

    /// Write log messages to syslog
    #[arg(long)]
    pub syslog: bool,

    /// Lenience period for initial cluster member readiness (0 = no expiry)
    #[arg(long, value_parser = duration_arg)]
    pub liveness_cluster_lenience: Option<Duration>,

    /// Interval for OOM sweep, 0 to disable
    #[arg(long, value_parser = duration_arg)]
    pub oom_interval: Option<Duration>,

    /// Minimum amount of available memory (bytes) before stopping instances
    #[arg(long)]
    pub oom_min_free: Option<u64>,

    /// Control-plane Unix socket
    #[arg(long)]
    pub lxd_socket: Option<String>,

    /// Replica index, instead of deriving it from the hostname
    #[arg(long)]
    pub replica: Option<u32>,

    /// Serve Prometheus metrics on this address
    #[arg(long)]
    pub metrics_address: Option<String>,

    /// Log filter directives
    #[arg(long)]
    pub log_filter: Option<String>,
}

fn duration_arg(s: &str) -> Result<Duration, String> {
    parse_duration(s).ok_or_else(|| format!("invalid duration {s:?}"))
}

/// Accept Go-style `:8080` as "all interfaces".
fn normalize_listen(addr: &str) -> String {
    match addr.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{port}"),
        None => addr.to_string(),
    }
}

impl Cli {
    /// Overlay flags onto `config`.
    pub fn apply(&self, config: &mut DaemonConfig) {
        if let Some(listen) = &self.listen {
            config.listener.bind_address = normalize_listen(listen);
        }
        if self.syslog {
            config.observability.syslog = true;
        }
        if let Some(lenience) = self.liveness_cluster_lenience {
            config.liveness.cluster_lenience = lenience;
        }
        if let Some(interval) = self.oom_interval {
            config.oom.interval = interval;
        }
        if let Some(min_free) = self.oom_min_free {
            config.oom.min_free = min_free;
        }
        if let Some(socket) = &self.lxd_socket {
            config.lxd.socket = socket.clone();
        }
        if let Some(replica) = self.replica {
            config.liveness.replica = Some(replica);
        }
        if let Some(addr) = &self.metrics_address {
            config.observability.metrics_address = Some(addr.clone());
        }
        if let Some(filter) = &self.log_filter {
            config.observability.log_filter = Some(filter.clone());
        }
    }

    /// Read the config file (if any), apply flags and validate.
    pub fn load(&self) -> Result<DaemonConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => DaemonConfig::default(),
        };
        self.apply(&mut config);
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}
