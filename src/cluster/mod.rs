//! Cluster observation.
//!
//! The watchdog never takes part in consensus; it only reads who the
//! members are and where this node sits among them.

pub mod identity;
pub mod membership;

pub use identity::NodeIdentity;
pub use membership::{ClusterSnapshot, LxdMembershipProber, MembershipProber, ProbeError, Source};
