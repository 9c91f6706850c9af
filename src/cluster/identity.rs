//! Node identity derived from the hostname.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("failed to read hostname: {0}")]
    Hostname(#[from] std::io::Error),

    #[error("failed to parse replica index from {hostname:?}")]
    Index { hostname: String },
}

/// Position of this node among the cluster's replicas.
///
/// StatefulSet pods are named `<set>-<ordinal>`; the ordinal is the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeIdentity {
    pub replica: u32,
}

fn replica_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^.+-([0-9]+)").expect("replica pattern is valid"))
}

impl NodeIdentity {
    pub fn new(replica: u32) -> Self {
        Self { replica }
    }

    /// Parse the replica index from a hostname.
    ///
    /// Hostnames without a `-<digits>` suffix are replica 0. Ordinals that
    /// do not fit in a byte are rejected.
    pub fn from_hostname(hostname: &str) -> Result<Self, IdentityError> {
        let Some(caps) = replica_pattern().captures(hostname.trim()) else {
            return Ok(Self::default());
        };

        caps[1]
            .parse::<u8>()
            .map(|r| Self::new(u32::from(r)))
            .map_err(|_| IdentityError::Index {
                hostname: hostname.trim().to_string(),
            })
    }

    /// Detect the identity of the local node, defaulting to replica 0 when
    /// the hostname cannot be used.
    pub fn detect() -> Self {
        match hostname().map_err(IdentityError::from).and_then(|h| Self::from_hostname(&h)) {
            Ok(identity) => identity,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to get replica, assuming 0");
                Self::default()
            }
        }
    }
}

fn hostname() -> std::io::Result<String> {
    match std::fs::read_to_string("/proc/sys/kernel/hostname") {
        Ok(h) => Ok(h.trim().to_string()),
        Err(e) => std::env::var("HOSTNAME").map_err(|_| e),
    }
}
