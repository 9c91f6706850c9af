//! Control-plane HTTP client over the local Unix socket.
//!
//! # Responsibilities
//! - One HTTP/1.1 connection per request (the socket is local and cheap)
//! - Bound every request with a deadline
//! - Decode the response envelope and follow async operations
//!
//! # Design Decisions
//! - Transport and timeout failures are distinct from envelope errors so
//!   callers can decide whether a fallback applies
//! - The client is cheap to clone; clones share nothing but configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{CONTENT_TYPE, HOST, USER_AGENT};
use hyper::{Method, Request};
use hyper_util::rt::TokioIo;
use tokio::net::UnixStream;

use crate::lxd::types::{LxdError, LxdResult, Operation, Response, STATUS_CREATED};

/// Client for the control plane's REST API.
#[derive(Debug, Clone)]
pub struct LxdClient {
    socket: PathBuf,
    timeout: Duration,
}

impl LxdClient {
    /// Create a client for `socket` with a per-request deadline.
    pub fn new(socket: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            socket: socket.into(),
            timeout,
        }
    }

    /// Path of the Unix socket this client dials.
    pub fn socket(&self) -> &Path {
        &self.socket
    }

    /// Per-request deadline.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Issue a single request and decode the envelope without checking
    /// its status code.
    pub async fn raw(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> LxdResult<Response> {
        let bytes = match tokio::time::timeout(self.timeout, self.exchange(method, path, body)).await
        {
            Ok(result) => result?,
            Err(_) => {
                tracing::debug!(path = %path, timeout = ?self.timeout, "Control plane request timed out");
                return Err(LxdError::Timeout(self.timeout));
            }
        };

        serde_json::from_slice(&bytes).map_err(|e| LxdError::Parse(e.to_string()))
    }

    /// Issue a request, reject error envelopes and wait for async
    /// operations to complete.
    ///
    /// When the control plane answers with a background operation, the
    /// returned envelope carries the operation's final status code and
    /// error rather than the initial "created" status.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        op_timeout: Option<u64>,
    ) -> LxdResult<Response> {
        let res = self.raw(method, path, body).await?;
        res.check_status()?;

        if res.status_code != STATUS_CREATED {
            return Ok(res);
        }

        let wait_path = match op_timeout {
            Some(secs) => format!("{}/wait?timeout={}", res.operation, secs),
            None => format!("{}/wait?timeout=-1", res.operation),
        };
        tracing::debug!(operation = %res.operation, "Waiting for operation");

        let waited = self.raw(Method::GET, &wait_path, None).await?;
        waited.check_status()?;
        let op: Operation = waited.metadata_as()?;

        Ok(Response {
            status: op.status,
            status_code: op.status_code,
            error: op.err,
            metadata: op.metadata,
            ..res
        })
    }

    /// Connect, send one request and collect the body.
    async fn exchange(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> LxdResult<Bytes> {
        let stream = UnixStream::connect(&self.socket)
            .await
            .map_err(|e| LxdError::Transport(format!("connect {}: {e}", self.socket.display())))?;

        let io = TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| LxdError::Transport(format!("handshake: {e}")))?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!(error = %e, "Control plane connection closed with error");
            }
        });

        let payload = match body {
            Some(value) => Bytes::from(
                serde_json::to_vec(&value).map_err(|e| LxdError::Parse(format!("encode body: {e}")))?,
            ),
            None => Bytes::new(),
        };

        let req = Request::builder()
            .method(method)
            .uri(path)
            .header(HOST, "lxd")
            .header(USER_AGENT, concat!("livenessd/", env!("CARGO_PKG_VERSION")))
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(payload))
            .map_err(|e| LxdError::Transport(format!("build request: {e}")))?;

        let response = sender
            .send_request(req)
            .await
            .map_err(|e| LxdError::Transport(format!("send request: {e}")))?;

        let collected = response
            .into_body()
            .collect()
            .await
            .map_err(|e| LxdError::Transport(format!("read body: {e}")))?;

        Ok(collected.to_bytes())
    }
}
