//! OS signal handling.
//!
//! SIGTERM (sent by the orchestrator) and SIGINT both mean "shut down".

use tokio::signal::unix::{signal, SignalKind};

/// Wait for SIGTERM or SIGINT and return its name.
pub async fn wait_for_signal() -> std::io::Result<&'static str> {
    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = terminate.recv() => Ok("SIGTERM"),
        _ = interrupt.recv() => Ok("SIGINT"),
    }
}
