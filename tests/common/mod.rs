//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};

/// One request seen by the mock control plane.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub body: Option<Value>,
}

/// A fake control-plane API listening on a Unix socket in a temp dir.
pub struct MockLxd {
    dir: TempDir,
    socket: PathBuf,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl MockLxd {
    pub fn socket(&self) -> &Path {
        &self.socket
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests whose method matches, in arrival order.
    pub fn requests_with(&self, method: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method)
            .collect()
    }
}

/// Start a programmable mock control plane.
///
/// `f` maps `(method, path, body)` to an HTTP status and a JSON envelope.
pub async fn start_mock_lxd<F>(f: F) -> MockLxd
where
    F: Fn(&str, &str, Option<&Value>) -> (u16, Value) + Send + Sync + 'static,
{
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("unix.socket");
    let listener = UnixListener::bind(&socket).unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let f = Arc::new(f);

    let seen = requests.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let f = f.clone();
                    let seen = seen.clone();
                    tokio::spawn(async move {
                        let _ = serve_one(stream, f, seen).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    MockLxd {
        dir,
        socket,
        requests,
    }
}

async fn serve_one<F>(
    mut stream: UnixStream,
    f: Arc<F>,
    seen: Arc<Mutex<Vec<Recorded>>>,
) -> std::io::Result<()>
where
    F: Fn(&str, &str, Option<&Value>) -> (u16, Value),
{
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.lines();
    let mut request_line = lines.next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let path = request_line.next().unwrap_or_default().to_string();
    let content_length = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let raw_body = &buf[header_end..(header_end + content_length).min(buf.len())];
    let body: Option<Value> = if raw_body.is_empty() {
        None
    } else {
        serde_json::from_slice(raw_body).ok()
    };

    let (status, reply) = f(&method, &path, body.as_ref());
    seen.lock().unwrap().push(Recorded { method, path, body });

    let payload = reply.to_string();
    let response = format!(
        "HTTP/1.1 {status} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{payload}",
        reason(status),
        payload.len(),
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        202 => "Accepted",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "OK",
    }
}

/// A synchronous success envelope.
pub fn sync_ok(metadata: Value) -> (u16, Value) {
    (
        200,
        json!({
            "type": "sync",
            "status": "Success",
            "status_code": 200,
            "operation": "",
            "error_code": 0,
            "error": "",
            "metadata": metadata,
        }),
    )
}

/// An error envelope.
pub fn error_reply(code: u16, message: &str) -> (u16, Value) {
    (
        code,
        json!({
            "type": "error",
            "status": "",
            "status_code": 0,
            "operation": "",
            "error_code": code,
            "error": message,
            "metadata": null,
        }),
    )
}

/// An async envelope announcing operation `id`.
pub fn async_created(id: &str) -> (u16, Value) {
    (
        202,
        json!({
            "type": "async",
            "status": "Operation created",
            "status_code": 100,
            "operation": format!("/1.0/operations/{id}"),
            "error_code": 0,
            "error": "",
            "metadata": { "id": id, "status": "Running", "status_code": 103 },
        }),
    )
}

/// The `{operation}/wait` reply for a finished operation.
pub fn operation_done(id: &str, status_code: i64, err: &str) -> (u16, Value) {
    sync_ok(json!({
        "id": id,
        "status": if status_code == 200 { "Success" } else { "Failure" },
        "status_code": status_code,
        "err": err,
        "metadata": null,
    }))
}

/// Write an executable shell script into `dir` and return its path.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}
