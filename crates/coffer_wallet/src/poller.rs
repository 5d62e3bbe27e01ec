use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::sync::Synchronizer;

/// Background task that settles one address's pending transactions on a
/// fixed interval.
pub struct PendingPoller;

impl PendingPoller {
    /// Start polling `address`. Must be called inside a Tokio runtime.
    pub fn spawn(sync: Arc<Synchronizer>, address: String, interval: Duration) -> PollerHandle {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        info!(address = %address, interval_ms = interval.as_millis() as u64, "pending poller started");
        let join = tokio::spawn(Self::poll_loop(sync, address, interval, shutdown_rx));
        PollerHandle {
            shutdown_tx,
            join: Some(join),
        }
    }

    async fn poll_loop(
        sync: Arc<Synchronizer>,
        address: String,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    match sync.poll_pending(&address).await {
                        Ok(0) => {}
                        Ok(resolved) => debug!(address = %address, resolved, "pending transactions settled"),
                        Err(e) => warn!(address = %address, error = %e, "pending poll failed"),
                    }
                }
                _ = shutdown.recv() => {
                    debug!(address = %address, "pending poller shutting down");
                    break;
                }
            }
        }
    }
}

/// Owner's handle on a running [`PendingPoller`]. Dropping it stops the
/// task.
pub struct PollerHandle {
    shutdown_tx: broadcast::Sender<()>,
    join: Option<JoinHandle<()>>,
}

impl PollerHandle {
    /// Signal shutdown and wait for the task to finish.
    pub async fn stop(mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                warn!(error = %e, "pending poller task ended abnormally");
            }
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
    }
}
