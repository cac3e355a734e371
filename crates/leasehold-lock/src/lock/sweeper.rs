//! Expiry sweeper - background task that reclaims expired leases
//!
//! Operations already treat expired entries as absent; the sweeper only keeps
//! the store from accumulating abandoned leases.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info};

use leasehold_common::{LeaseError, LockConfig, Result};

use super::service::LeaseService;

/// Periodic trigger for [`LeaseService::cleanup`]
pub struct ExpirySweeper {
    service: Arc<dyn LeaseService>,
    interval: Duration,
}

impl ExpirySweeper {
    /// Fails with a config error on a zero `interval`
    pub fn new(service: Arc<dyn LeaseService>, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(LeaseError::Config(
                "sweep interval must be positive".to_string(),
            ));
        }
        Ok(Self { service, interval })
    }

    pub fn from_config(service: Arc<dyn LeaseService>, config: &LockConfig) -> Result<Self> {
        config.validate()?;
        Self::new(service, config.sweep_interval())
    }

    /// Run one sweep pass. A panicking pass is logged and counts as zero.
    pub fn sweep_once(&self) -> usize {
        run_isolated(|| self.service.cleanup())
    }

    /// Spawn the sweep loop on the current tokio runtime
    pub fn spawn(self) -> SweeperHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(self.run(stop_rx));
        SweeperHandle { stop_tx, handle }
    }

    async fn run(self, mut stop_rx: watch::Receiver<bool>) {
        info!(
            interval_ms = self.interval.as_millis() as u64,
            "Expiry sweeper started"
        );
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let reclaimed = self.sweep_once();
                    if reclaimed > 0 {
                        debug!(count = reclaimed, "Cleaned up expired leases");
                    }
                }
                changed = stop_rx.changed() => {
                    // A dropped handle closes the channel
                    if changed.is_err() || *stop_rx.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Expiry sweeper stopped");
    }
}

/// Handle to a running sweeper. Dropping it also stops the loop.
pub struct SweeperHandle {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal the loop to stop and wait for it to exit
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.handle.await {
            error!(error = %e, "Expiry sweeper task failed");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

fn run_isolated<F>(pass: F) -> usize
where
    F: FnOnce() -> usize,
{
    match catch_unwind(AssertUnwindSafe(pass)) {
        Ok(reclaimed) => reclaimed,
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(reason = %reason, "Expiry sweep pass failed; retrying on next tick");
            0
        }
    }
}
