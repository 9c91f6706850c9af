//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber
//! - Route events to stderr or to the local syslog socket
//!
//! # Design Decisions
//! - Level filter comes from config, then `RUST_LOG`, then a default
//! - Syslog lines carry no timestamp or colour; syslog adds its own
//! - The syslog socket is non-blocking: when the reader falls behind,
//!   lines are dropped rather than stalling the caller

use std::io;
use std::os::unix::net::UnixDatagram;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing::{Level, Metadata};
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_FILTER: &str = "livenessd=info,tower_http=info";

/// Default syslog datagram socket.
pub const SYSLOG_SOCKET: &str = "/dev/log";

const FACILITY_LOCAL7: u8 = 23;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    #[error("failed to connect to syslog: {0}")]
    Syslog(#[from] io::Error),

    #[error("failed to install subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Install the global subscriber.
pub fn init_logging(filter: Option<&str>, syslog: bool) -> Result<(), LoggingError> {
    let filter = match filter {
        Some(directives) => EnvFilter::try_new(directives)?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()),
    };

    let (stderr_layer, syslog_layer) = if syslog {
        let writer = Syslog::connect(SYSLOG_SOCKET, "livenessd")?;
        let layer = fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .without_time()
            .with_target(false)
            .with_file(true)
            .with_line_number(true);
        (None, Some(layer))
    } else {
        (Some(fmt::layer().with_writer(io::stderr)), None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(syslog_layer)
        .try_init()?;
    Ok(())
}

/// Writer that sends one datagram per event to a syslog socket.
#[derive(Debug, Clone)]
pub struct Syslog {
    socket: Arc<UnixDatagram>,
    tag: String,
    pid: u32,
}

impl Syslog {
    pub fn connect(path: impl AsRef<Path>, tag: impl Into<String>) -> io::Result<Self> {
        let socket = UnixDatagram::unbound()?;
        socket.connect(path)?;
        socket.set_nonblocking(true)?;
        Ok(Self {
            socket: Arc::new(socket),
            tag: tag.into(),
            pid: std::process::id(),
        })
    }

    fn format(&self, severity: u8, message: &str) -> String {
        format!(
            "<{}>{}[{}]: {}",
            FACILITY_LOCAL7 * 8 + severity,
            self.tag,
            self.pid,
            message.trim_end()
        )
    }
}

fn severity(level: &Level) -> u8 {
    match *level {
        Level::ERROR => 3,
        Level::WARN => 4,
        Level::INFO => 6,
        _ => 7,
    }
}

pub struct SyslogLine<'a> {
    syslog: &'a Syslog,
    severity: u8,
}

impl io::Write for SyslogLine<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let line = self
            .syslog
            .format(self.severity, &String::from_utf8_lossy(buf));
        match self.syslog.socket.send(line.as_bytes()) {
            Ok(_) => Ok(buf.len()),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(buf.len()),
            Err(e) => Err(e),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for Syslog {
    type Writer = SyslogLine<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        SyslogLine {
            syslog: self,
            severity: severity(&Level::INFO),
        }
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        SyslogLine {
            syslog: self,
            severity: severity(meta.level()),
        }
    }
}
