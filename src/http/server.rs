//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the liveness handler
//! - Wire up middleware (tracing, request timeout)
//! - Serve until shutdown, then drain for a bounded time

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, oneshot};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ListenerConfig;
use crate::health::{CheckLiveness, Verdict};
use crate::observability::metrics;

/// Application state injected into handlers.
pub struct AppState<L> {
    pub liveness: Arc<L>,
}

impl<L> Clone for AppState<L> {
    fn clone(&self) -> Self {
        Self {
            liveness: self.liveness.clone(),
        }
    }
}

/// HTTP server answering health probes.
pub struct HttpServer {
    router: Router,
    drain_timeout: Duration,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new<L: CheckLiveness>(liveness: Arc<L>, config: &ListenerConfig) -> Self {
        Self {
            router: build_router(liveness, config.request_timeout),
            drain_timeout: config.drain_timeout,
        }
    }

    /// Run the server until `shutdown` fires.
    ///
    /// After the signal no new connections are accepted; in-flight
    /// requests get `drain_timeout` to finish before being dropped.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let serve = axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = stop_rx.await;
            })
            .into_future();
        let mut serve = std::pin::pin!(serve);

        tokio::select! {
            result = &mut serve => return result,
            _ = shutdown.recv() => {}
        }

        tracing::info!(drain_timeout = ?self.drain_timeout, "Shutdown signal received, draining");
        let _ = stop_tx.send(());

        match tokio::time::timeout(self.drain_timeout, serve).await {
            Ok(result) => result?,
            Err(_) => tracing::warn!("Drain timed out, dropping in-flight requests"),
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
///
/// A request that outlives `request_timeout` is answered 500, the same as
/// an unhealthy verdict.
pub fn build_router<L: CheckLiveness>(liveness: Arc<L>, request_timeout: Duration) -> Router {
    Router::new()
        .route("/liveness", get(liveness_handler::<L>))
        .with_state(AppState { liveness })
        .layer(TimeoutLayer::with_status_code(
            StatusCode::INTERNAL_SERVER_ERROR,
            request_timeout,
        ))
        .layer(TraceLayer::new_for_http())
}

async fn liveness_handler<L: CheckLiveness>(State(state): State<AppState<L>>) -> Verdict {
    let verdict = state.liveness.check().await;
    metrics::record_liveness(verdict.as_str());
    verdict
}
