//! livenessd
//!
//! Per-node watchdog for a clustered container host.
//!
//! # Architecture Overview
//!
//! ```text
//!                   ┌──────────────────────────────────────────────────────┐
//!                   │                      LIVENESSD                       │
//!                   │                                                      │
//!  GET /liveness    │  ┌─────────┐    ┌───────────┐    ┌───────────────┐  │
//!  ─────────────────┼─▶│  http   │───▶│  health   │───▶│   cluster     │──┼──▶ control-plane
//!  ◀─ 204 / 500 ────┼──│ server  │◀───│ evaluator │◀───│  membership   │◀─┼─── API / database
//!                   │  └─────────┘    └───────────┘    └───────────────┘  │
//!                   │                                                      │
//!                   │  ┌─────────┐    ┌───────────┐    ┌───────────────┐  │
//!   timer ──────────┼─▶│   oom   │───▶│  meminfo  │    │  instances    │──┼──▶ stop / kill
//!                   │  │watchdog │───────────────────▶│  (LRU victim) │  │
//!                   │  └─────────┘                     └───────────────┘  │
//!                   │                                                      │
//!                   │  config · lifecycle · observability (log, metrics)   │
//!                   └──────────────────────────────────────────────────────┘
//! ```

use clap::Parser;

use livenessd::config::Cli;
use livenessd::lifecycle::{wait_for_signal, Daemon, Shutdown};
use livenessd::observability::{logging, metrics};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = cli.load()?;

    logging::init_logging(
        config.observability.log_filter.as_deref(),
        config.observability.syslog,
    )?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "livenessd starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        lxd_socket = %config.lxd.socket,
        cluster_lenience = ?config.liveness.cluster_lenience,
        oom_interval = ?config.oom.interval,
        oom_min_free = config.oom.min_free,
        "Configuration loaded"
    );

    if let Some(addr) = &config.observability.metrics_address {
        metrics::init_metrics(addr.parse()?)?;
    }

    let daemon = Daemon::new(config);
    let listener = daemon.bind().await?;
    let shutdown = Shutdown::new();

    let run = daemon.run(listener, &shutdown);
    let mut run = std::pin::pin!(run);

    tokio::select! {
        result = &mut run => result?,
        signal = wait_for_signal() => {
            let signal = signal?;
            tracing::info!(signal, "Shutdown requested");
            shutdown.trigger();
            run.await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
