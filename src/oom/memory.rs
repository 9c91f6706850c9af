//! Available memory from `/proc/meminfo`.

use std::future::Future;
use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("MemAvailable not found in {path}")]
    Missing { path: String },
}

/// Reports how much memory the kernel considers available.
pub trait MemoryProbe: Send + Sync + 'static {
    /// Available memory in bytes.
    fn available_bytes(&self) -> impl Future<Output = Result<u64, MemoryError>> + Send;
}

fn mem_available() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?m)^MemAvailable:\s*(\d+)\s*kB$").expect("meminfo pattern is valid")
    })
}

/// Parse `MemAvailable` (reported in KiB) into bytes.
pub fn parse_mem_available(meminfo: &str) -> Option<u64> {
    let caps = mem_available().captures(meminfo)?;
    caps[1].parse::<u64>().ok()?.checked_mul(1024)
}

/// Reads a meminfo-formatted file, `/proc/meminfo` by default.
#[derive(Debug, Clone)]
pub struct ProcMeminfo {
    path: PathBuf,
}

impl ProcMeminfo {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for ProcMeminfo {
    fn default() -> Self {
        Self::new("/proc/meminfo")
    }
}

impl MemoryProbe for ProcMeminfo {
    async fn available_bytes(&self) -> Result<u64, MemoryError> {
        let path = self.path.display().to_string();
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| MemoryError::Read {
                path: path.clone(),
                source,
            })?;

        parse_mem_available(&content).ok_or(MemoryError::Missing { path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const MEMINFO: &str = "\
MemTotal:       16314484 kB
MemFree:          523412 kB
MemAvailable:    8123456 kB
Buffers:          312120 kB
";

    #[test]
    fn parses_available_in_bytes() {
        assert_eq!(parse_mem_available(MEMINFO), Some(8_123_456 * 1024));
    }

    #[test]
    fn missing_field() {
        assert_eq!(parse_mem_available("MemTotal: 1 kB\nMemFree: 1 kB\n"), None);
    }

    #[tokio::test]
    async fn reads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meminfo");
        std::fs::write(&path, MEMINFO).unwrap();

        let probe = ProcMeminfo::new(&path);
        assert_eq!(probe.available_bytes().await.unwrap(), 8_123_456 * 1024);
    }

    #[tokio::test]
    async fn missing_file_is_read_error() {
        let probe = ProcMeminfo::new("/nonexistent/meminfo");
        assert!(matches!(
            probe.available_bytes().await,
            Err(MemoryError::Read { .. })
        ));
    }

    proptest! {
        #[test]
        fn any_kib_value_scales(kib in 0u64..(u64::MAX / 1024)) {
            let text = format!("MemTotal: 1 kB\nMemAvailable:   {kib} kB\n");
            prop_assert_eq!(parse_mem_available(&text), Some(kib * 1024));
        }
    }
}
