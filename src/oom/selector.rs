//! OOM victim selection.
//!
//! The least recently used running workload is sacrificed first. Workloads
//! can opt out through a config key on the instance itself.

use chrono::{DateTime, Utc};

use crate::lxd::types::{Instance, STATUS_RUNNING};

/// Instance config key that exempts a workload from eviction.
pub const DEFAULT_SKIP_KEY: &str = "user.oomSkip";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadStatus {
    Running,
    Other,
}

/// A workload as seen by one sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workload {
    pub name: String,
    pub status: WorkloadStatus,
    pub last_used_at: DateTime<Utc>,
    pub oom_skip: bool,
}

impl Workload {
    /// Build from an instance, reading the opt-out flag from `skip_key`.
    pub fn from_instance(instance: Instance, skip_key: &str) -> Self {
        let status = if instance.status_code == STATUS_RUNNING {
            WorkloadStatus::Running
        } else {
            WorkloadStatus::Other
        };
        let oom_skip = instance
            .config
            .get(skip_key)
            .and_then(|v| parse_bool(v))
            .unwrap_or(false);

        Self {
            name: instance.name,
            status,
            last_used_at: instance.last_used_at,
            oom_skip,
        }
    }

    pub fn is_candidate(&self) -> bool {
        self.status == WorkloadStatus::Running && !self.oom_skip
    }
}

/// Boolean spellings accepted in instance config values.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Pick the running, non-exempt workload with the oldest `last_used_at`.
///
/// Ties keep the first workload in listing order.
pub fn select_victim(workloads: &[Workload]) -> Option<&Workload> {
    let mut victim: Option<&Workload> = None;
    for w in workloads.iter().filter(|w| w.is_candidate()) {
        match victim {
            Some(v) if w.last_used_at >= v.last_used_at => {}
            _ => victim = Some(w),
        }
    }
    victim
}
