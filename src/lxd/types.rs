//! Control-plane wire types and error definitions.
//!
//! Only the fields the watchdog consumes are modelled; everything else in
//! the envelope is ignored by serde.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Background operation created (async request accepted).
pub const STATUS_CREATED: i64 = 100;
/// Instance is running.
pub const STATUS_RUNNING: i64 = 103;
/// Request or operation succeeded.
pub const STATUS_SUCCESS: i64 = 200;
/// Operation failed.
pub const STATUS_FAILURE: i64 = 400;

/// Member reference reported by an unclustered daemon.
pub const NO_MEMBERS_PLACEHOLDER: &str = "/1.0/cluster/members/none";

/// Errors that can occur while talking to the control plane.
#[derive(Debug, Error)]
pub enum LxdError {
    /// The socket could not be reached or the connection broke.
    #[error("transport error: {0}")]
    Transport(String),

    /// The call did not complete within its bound.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The response could not be decoded.
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// The envelope carried an error status code.
    #[error("control plane returned non-OK status {code}: {message}")]
    Status { code: i64, message: String },
}

impl LxdError {
    /// True when the control plane itself did not answer.
    ///
    /// These are the failures that justify reading cluster state from
    /// the database instead.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, LxdError::Transport(_) | LxdError::Timeout(_))
    }
}

/// Result type for control-plane operations.
pub type LxdResult<T> = Result<T, LxdError>;

/// Standard response envelope.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Response {
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
    pub status_code: i64,
    pub operation: String,
    pub error_code: i64,
    pub error: String,
    pub metadata: serde_json::Value,
}

impl Response {
    /// Reject envelopes whose status code is outside the OK range.
    pub fn check_status(&self) -> LxdResult<()> {
        if self.status_code < 100 || self.status_code >= 400 {
            return Err(LxdError::Status {
                code: self.status_code,
                message: self.error.clone(),
            });
        }
        Ok(())
    }

    /// Decode the metadata payload into `T`.
    pub fn metadata_as<T: DeserializeOwned>(&self) -> LxdResult<T> {
        serde_json::from_value(self.metadata.clone())
            .map_err(|e| LxdError::Parse(format!("metadata: {e}")))
    }
}

/// Background operation as returned by `GET {operation}/wait`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Operation {
    pub id: String,
    pub status: String,
    pub status_code: i64,
    pub err: String,
    pub metadata: serde_json::Value,
}

/// An instance as returned by `GET /1.0/instances/<name>` (partial).
#[derive(Debug, Clone, Deserialize)]
pub struct Instance {
    pub name: String,
    #[serde(default)]
    pub status: String,
    pub status_code: i64,
    pub last_used_at: DateTime<Utc>,
    #[serde(default)]
    pub config: HashMap<String, String>,
}

/// Body of `PUT /1.0/instances/<name>/state`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateRequest {
    pub action: String,
    pub timeout: u32,
    pub force: bool,
    pub stateful: bool,
}

impl StateRequest {
    /// A stop request, graceful unless `force` is set.
    pub fn stop(timeout: u32, force: bool) -> Self {
        Self {
            action: "stop".to_string(),
            timeout,
            force,
            stateful: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_status_range() {
        let mut res = Response {
            status_code: STATUS_SUCCESS,
            ..Default::default()
        };
        assert!(res.check_status().is_ok());

        res.status_code = STATUS_CREATED;
        assert!(res.check_status().is_ok());

        res.status_code = STATUS_FAILURE;
        res.error = "not found".into();
        match res.check_status() {
            Err(LxdError::Status { code, message }) => {
                assert_eq!(code, 400);
                assert_eq!(message, "not found");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn instance_decodes_partial_fields() {
        let json = r#"{
            "name": "web",
            "status": "Running",
            "status_code": 103,
            "created_at": "2024-01-01T00:00:00Z",
            "last_used_at": "2024-03-01T12:30:00.123456Z",
            "config": {"user.oomSkip": "true"},
            "devices": {}
        }"#;
        let inst: Instance = serde_json::from_str(json).unwrap();
        assert_eq!(inst.name, "web");
        assert_eq!(inst.status_code, STATUS_RUNNING);
        assert_eq!(inst.config.get("user.oomSkip").map(String::as_str), Some("true"));
    }

    #[test]
    fn stop_request_body() {
        let body = serde_json::to_value(StateRequest::stop(5, true)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"action": "stop", "timeout": 5, "force": true, "stateful": false})
        );
    }

    #[test]
    fn unreachable_classification() {
        assert!(LxdError::Transport("refused".into()).is_unreachable());
        assert!(LxdError::Timeout(Duration::from_secs(3)).is_unreachable());
        assert!(!LxdError::Parse("eof".into()).is_unreachable());
    }
}
