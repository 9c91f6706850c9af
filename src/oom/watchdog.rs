//! Periodic memory watchdog.
//!
//! # Responsibilities
//! - Run a sweep every `interval`
//! - Log sweep failures and keep ticking
//! - Exit on shutdown, never in the middle of a sweep

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::oom::sweep::{EvictionOutcome, Sweep};

pub struct MemoryWatchdog<S> {
    sweeper: S,
    interval: Duration,
}

impl<S: Sweep> MemoryWatchdog<S> {
    /// A zero `interval` disables the watchdog.
    pub fn new(sweeper: S, interval: Duration) -> Self {
        Self { sweeper, interval }
    }

    pub fn is_enabled(&self) -> bool {
        !self.interval.is_zero()
    }

    /// Spawn the loop, or return `None` without creating a timer when
    /// disabled.
    pub fn spawn(self, shutdown: broadcast::Receiver<()>) -> Option<JoinHandle<()>> {
        if !self.is_enabled() {
            tracing::info!("OOM sweep disabled");
            return None;
        }
        Some(tokio::spawn(self.run(shutdown)))
    }

    async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval = ?self.interval, "Memory watchdog starting");

        // First sweep one full interval after start.
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // Shutdown wins over a tick that became due during a long sweep.
            tokio::select! {
                biased;

                _ = shutdown.recv() => {
                    tracing::info!("Memory watchdog received shutdown signal, exiting loop");
                    break;
                }
                _ = ticker.tick() => {
                    match self.sweeper.sweep().await {
                        Ok(EvictionOutcome::NoAction { .. }) => {}
                        Ok(EvictionOutcome::Stopped { name }) => {
                            tracing::warn!(instance = %name, "OOM sweep stopped instance");
                        }
                        Ok(EvictionOutcome::Killed { name }) => {
                            tracing::warn!(instance = %name, "OOM sweep killed instance");
                        }
                        Err(e) => tracing::error!(error = %e, "OOM sweep failed"),
                    }
                }
            }
        }
    }
}
