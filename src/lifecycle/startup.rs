//! Startup orchestration.
//!
//! # Responsibilities
//! - Build every subsystem from a validated [`DaemonConfig`]
//! - Start the memory watchdog
//! - Bind the listener and serve until shutdown
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The liveness path and the OOM path get separate control-plane clients
//!   with their own deadlines

use std::future::Future;
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::cluster::{LxdMembershipProber, NodeIdentity};
use crate::config::DaemonConfig;
use crate::health::{LivenessEvaluator, Pgrep, QuorumLeniencyGate};
use crate::http::HttpServer;
use crate::lifecycle::Shutdown;
use crate::lxd::{DatabaseLister, LxdClient};
use crate::oom::{LxdInstances, MemoryWatchdog, OomSweeper, ProcMeminfo};

pub type NodeLiveness = LivenessEvaluator<LxdMembershipProber, Pgrep>;
pub type NodeSweeper = OomSweeper<ProcMeminfo, LxdInstances>;

/// The assembled watchdog daemon.
pub struct Daemon {
    config: DaemonConfig,
    liveness: Arc<NodeLiveness>,
    watchdog: MemoryWatchdog<NodeSweeper>,
}

impl Daemon {
    pub fn new(config: DaemonConfig) -> Self {
        let identity = match config.liveness.replica {
            Some(replica) => NodeIdentity::new(replica),
            None => NodeIdentity::detect(),
        };
        tracing::info!(replica = identity.replica, "Node identity");

        let lxd = &config.lxd;
        let prober = LxdMembershipProber::new(
            LxdClient::new(&lxd.socket, lxd.liveness_timeout),
            DatabaseLister::new(&lxd.binary, lxd.command_timeout),
        );
        let liveness = Arc::new(LivenessEvaluator::new(
            identity,
            Pgrep::new(&lxd.process_name, lxd.command_timeout),
            prober,
            QuorumLeniencyGate::new(config.liveness.cluster_lenience),
        ));

        let oom = &config.oom;
        let sweeper = OomSweeper::new(
            ProcMeminfo::new(&oom.meminfo_path),
            LxdInstances::new(LxdClient::new(&lxd.socket, lxd.api_timeout), &oom.skip_key),
            oom.min_free,
        )
        .with_timeouts(oom.stop_timeout_secs, oom.operation_timeout_secs);
        let watchdog = MemoryWatchdog::new(sweeper, oom.interval);

        Self {
            config,
            liveness,
            watchdog,
        }
    }

    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }

    pub fn liveness(&self) -> &Arc<NodeLiveness> {
        &self.liveness
    }

    /// Bind the configured listen address.
    pub async fn bind(&self) -> std::io::Result<TcpListener> {
        let listener = TcpListener::bind(&self.config.listener.bind_address).await?;
        tracing::info!(address = %listener.local_addr()?, "Listening for connections");
        Ok(listener)
    }

    /// Serve on `listener` until `shutdown` is triggered.
    ///
    /// Subscriptions are taken before this returns, so a trigger that
    /// happens before the future is first polled is not lost. On return the
    /// watchdog has finished its last tick.
    pub fn run(
        self,
        listener: TcpListener,
        shutdown: &Shutdown,
    ) -> impl Future<Output = std::io::Result<()>> + Send + 'static {
        let shutdown = shutdown.clone();
        let watchdog = self.watchdog.spawn(shutdown.subscribe());
        let server = HttpServer::new(self.liveness, &self.config.listener);
        let server_shutdown = shutdown.subscribe();

        async move {
            let result = server.run(listener, server_shutdown).await;
            if let Err(e) = &result {
                tracing::error!(error = %e, "HTTP server failed");
            }
            shutdown.trigger();

            if let Some(handle) = watchdog {
                if let Err(e) = handle.await {
                    tracing::error!(error = %e, "Memory watchdog task failed");
                }
            }

            result
        }
    }
}
