//! Presence heartbeat
//!
//! The coordinator drops clients that stop saying hello. The heartbeat runs
//! as its own task on a fixed interval and shares nothing with the
//! reconciliation workflow, so a long reconciliation never delays a hello.

use crate::metrics::MetricsCollector;
use crate::session::PresenceSignal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Handle to a running heartbeat task
pub struct PresenceHeartbeat {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<u64>,
}

impl PresenceHeartbeat {
    /// Spawn the heartbeat; the first hello is sent after one `interval`
    pub fn spawn(
        presence: Arc<dyn PresenceSignal>,
        interval: Duration,
        metrics: Option<Arc<MetricsCollector>>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(heartbeat_loop(presence, interval, metrics, shutdown_rx));

        info!(interval_ms = interval.as_millis() as u64, "Presence heartbeat started");
        Self {
            shutdown_tx,
            handle,
        }
    }

    /// Whether the task has exited
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop the heartbeat and return how many hellos it sent
    pub async fn stop(self) -> u64 {
        let _ = self.shutdown_tx.send(true);
        match self.handle.await {
            Ok(sent) => {
                info!(sent, "Presence heartbeat stopped");
                sent
            }
            Err(e) => {
                warn!(error = %e, "Presence heartbeat task ended abnormally");
                0
            }
        }
    }
}

async fn heartbeat_loop(
    presence: Arc<dyn PresenceSignal>,
    interval: Duration,
    metrics: Option<Arc<MetricsCollector>>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> u64 {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut sent = 0u64;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let result = presence.say_hello().await;
                if let Some(metrics) = &metrics {
                    metrics.record_heartbeat(result.is_ok());
                }
                match result {
                    Ok(()) => {
                        sent += 1;
                        debug!(sent, "Sent presence hello");
                    }
                    Err(e) => warn!(error = %e, "Presence hello failed"),
                }
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }

    sent
}
