//! Cluster membership probing.
//!
//! # Responsibilities
//! - Ask the control plane for its member list
//! - Fall back to the local database when the control plane is silent
//! - Report which source produced the answer
//!
//! # Design Decisions
//! - Provenance is part of the snapshot: leniency only ever applies to
//!   answers read from the database
//! - A malformed API response is a hard error, not a reason to fall back

use std::future::Future;

use hyper::Method;
use thiserror::Error;

use crate::lxd::types::{LxdError, NO_MEMBERS_PLACEHOLDER, STATUS_SUCCESS};
use crate::lxd::{DatabaseError, DatabaseLister, LxdClient};

const MEMBERS_PATH: &str = "/1.0/cluster/members";

/// Where a membership answer came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// The control-plane API answered.
    Api,
    /// The API was unreachable and the database was read directly.
    Fallback { api_error: String },
}

/// Membership as observed by one probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSnapshot {
    pub members: Vec<String>,
    /// Only the API can confirm this; database reads are always `false`.
    pub initialized: bool,
    pub source: Source,
}

impl ClusterSnapshot {
    /// Build a snapshot from an API answer.
    pub fn from_api(status_code: i64, members: Vec<String>) -> Self {
        let initialized = status_code == STATUS_SUCCESS && has_real_members(&members);
        Self {
            members,
            initialized,
            source: Source::Api,
        }
    }

    /// Build a snapshot from a database read.
    pub fn from_database(members: Vec<String>, api_error: String) -> Self {
        Self {
            initialized: false,
            members,
            source: Source::Fallback { api_error },
        }
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self.source, Source::Fallback { .. })
    }
}

/// False for an empty list and for the lone "no members" placeholder.
fn has_real_members(members: &[String]) -> bool {
    match members {
        [] => false,
        [only] => only != NO_MEMBERS_PLACEHOLDER,
        _ => true,
    }
}

/// Errors that make a membership probe fail outright.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The API answered with something that could not be decoded.
    #[error("failed to parse members from control plane: {0}")]
    Parse(#[source] LxdError),

    /// Neither the API nor the database could be read.
    #[error("control plane unreachable ({api}) and database read failed: {database}")]
    Unavailable {
        api: LxdError,
        #[source]
        database: DatabaseError,
    },
}

/// Source of cluster membership.
pub trait MembershipProber: Send + Sync + 'static {
    fn probe(&self) -> impl Future<Output = Result<ClusterSnapshot, ProbeError>> + Send;
}

/// Probes the control plane, falling back to `lxd cluster list-database`.
#[derive(Debug, Clone)]
pub struct LxdMembershipProber {
    client: LxdClient,
    database: DatabaseLister,
}

impl LxdMembershipProber {
    pub fn new(client: LxdClient, database: DatabaseLister) -> Self {
        Self { client, database }
    }

    async fn from_api(&self) -> Result<ClusterSnapshot, LxdError> {
        let res = self.client.raw(Method::GET, MEMBERS_PATH, None).await?;
        let members: Option<Vec<String>> = res.metadata_as()?;
        Ok(ClusterSnapshot::from_api(res.status_code, members.unwrap_or_default()))
    }
}

impl MembershipProber for LxdMembershipProber {
    async fn probe(&self) -> Result<ClusterSnapshot, ProbeError> {
        let api_error = match self.from_api().await {
            Ok(snapshot) => return Ok(snapshot),
            Err(e) if e.is_unreachable() => e,
            Err(e) => return Err(ProbeError::Parse(e)),
        };

        tracing::warn!(error = %api_error, "Failed to query control plane API, reading database");

        match self.database.list_members().await {
            Ok(members) => Ok(ClusterSnapshot::from_database(members, api_error.to_string())),
            Err(database) => Err(ProbeError::Unavailable {
                api: api_error,
                database,
            }),
        }
    }
}
