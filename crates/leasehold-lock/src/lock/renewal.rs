//! Auto-renewal task for long-running lease holders
//!
//! Renews a held lease every `ttl / divisor` until stopped, or until a renewal
//! is refused (the lease expired, was force released, or changed hands).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tracing::{debug, error, warn};

use leasehold_common::{LeaseError, LockConfig, Result};

use super::service::LeaseService;

/// Why an auto-renewal task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewalOutcome {
    /// Stopped by its handle
    Stopped,
    /// A renewal was refused; the holder no longer owns the lease
    LeaseLost,
}

pub struct AutoRenewalTask {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<RenewalOutcome>,
}

impl AutoRenewalTask {
    /// Start renewing `resource` for `holder` on the current tokio runtime.
    ///
    /// The caller must already hold the lease; the first renewal happens one
    /// period after start.
    pub fn start(
        service: Arc<dyn LeaseService>,
        resource: impl Into<String>,
        holder: impl Into<String>,
        ttl: Duration,
        divisor: u32,
    ) -> Result<Self> {
        let resource = resource.into();
        let holder = holder.into();

        if resource.is_empty() {
            return Err(LeaseError::EmptyResource);
        }
        if holder.is_empty() {
            return Err(LeaseError::EmptyHolder);
        }
        if divisor == 0 {
            return Err(LeaseError::Config(
                "auto-renew divisor must be positive".to_string(),
            ));
        }
        let period = ttl / divisor;
        if period.is_zero() {
            return Err(LeaseError::InvalidTtl(ttl));
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(run(service, resource, holder, ttl, period, stop_rx));

        Ok(Self { stop_tx, handle })
    }

    /// Start renewing at `ttl / config.auto_renew_divisor`
    pub fn from_config(
        service: Arc<dyn LeaseService>,
        resource: impl Into<String>,
        holder: impl Into<String>,
        ttl: Duration,
        config: &LockConfig,
    ) -> Result<Self> {
        config.validate()?;
        Self::start(service, resource, holder, ttl, config.auto_renew_divisor)
    }

    /// Stop renewing and wait for the task to exit
    pub async fn stop(self) -> RenewalOutcome {
        let _ = self.stop_tx.send(true);
        self.handle.await.unwrap_or(RenewalOutcome::Stopped)
    }

    /// Wait for the task to end by itself
    pub async fn join(self) -> RenewalOutcome {
        let _stop_tx = self.stop_tx;
        self.handle.await.unwrap_or(RenewalOutcome::LeaseLost)
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

async fn run(
    service: Arc<dyn LeaseService>,
    resource: String,
    holder: String,
    ttl: Duration,
    period: Duration,
    mut stop_rx: watch::Receiver<bool>,
) -> RenewalOutcome {
    let mut ticker = interval_at(Instant::now() + period, period);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match service.renew(&resource, &holder, ttl) {
                    Ok(true) => {
                        debug!(resource = %resource, holder = %holder, "Lease auto-renewed");
                    }
                    Ok(false) => {
                        warn!(
                            resource = %resource,
                            holder = %holder,
                            "Lease renewal refused, stopping auto-renewal"
                        );
                        return RenewalOutcome::LeaseLost;
                    }
                    Err(e) => {
                        error!(
                            resource = %resource,
                            holder = %holder,
                            error = %e,
                            "Lease renewal error, stopping auto-renewal"
                        );
                        return RenewalOutcome::LeaseLost;
                    }
                }
            }
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    return RenewalOutcome::Stopped;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::service::LeaseCoordinator;

    #[test]
    fn test_start_rejects_bad_arguments() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let _guard = runtime.enter();
        let service: Arc<dyn LeaseService> = Arc::new(LeaseCoordinator::new());

        let ttl = Duration::from_secs(1);
        assert!(matches!(
            AutoRenewalTask::start(service.clone(), "", "h", ttl, 3),
            Err(LeaseError::EmptyResource)
        ));
        assert!(matches!(
            AutoRenewalTask::start(service.clone(), "r", "", ttl, 3),
            Err(LeaseError::EmptyHolder)
        ));
        assert!(matches!(
            AutoRenewalTask::start(service.clone(), "r", "h", ttl, 0),
            Err(LeaseError::Config(_))
        ));
        assert!(matches!(
            AutoRenewalTask::start(service, "r", "h", Duration::from_nanos(2), 3),
            Err(LeaseError::InvalidTtl(_))
        ));
    }

    #[tokio::test]
    async fn test_keeps_lease_alive_until_stopped() {
        let coordinator = Arc::new(LeaseCoordinator::new());
        let ttl = Duration::from_millis(120);
        assert!(coordinator.acquire("job-1", "worker-1", ttl).unwrap());

        let task = AutoRenewalTask::start(coordinator.clone(), "job-1", "worker-1", ttl, 3)
            .unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert_eq!(coordinator.holder_of("job-1").as_deref(), Some("worker-1"));
        assert!(coordinator.stats().total_renewals >= 3);

        assert_eq!(task.stop().await, RenewalOutcome::Stopped);
    }

    #[tokio::test]
    async fn test_ends_when_lease_is_force_released() {
        let coordinator = Arc::new(LeaseCoordinator::new());
        let ttl = Duration::from_millis(90);
        assert!(coordinator.acquire("job-1", "worker-1", ttl).unwrap());

        let task = AutoRenewalTask::start(coordinator.clone(), "job-1", "worker-1", ttl, 3)
            .unwrap();
        assert!(coordinator.force_release("job-1").unwrap());

        let outcome = tokio::time::timeout(Duration::from_secs(1), task.join())
            .await
            .unwrap();
        assert_eq!(outcome, RenewalOutcome::LeaseLost);
    }

    #[tokio::test]
    async fn test_from_config_uses_configured_divisor() {
        let ttl = Duration::from_millis(600);
        let mut renewals = Vec::new();

        for divisor in [2, 12] {
            let coordinator = Arc::new(LeaseCoordinator::new());
            assert!(coordinator.acquire("job-1", "worker-1", ttl).unwrap());
            let config = LockConfig {
                auto_renew_divisor: divisor,
                ..Default::default()
            };

            let task =
                AutoRenewalTask::from_config(coordinator.clone(), "job-1", "worker-1", ttl, &config)
                    .unwrap();
            tokio::time::sleep(Duration::from_millis(400)).await;
            assert_eq!(task.stop().await, RenewalOutcome::Stopped);

            renewals.push(coordinator.stats().total_renewals);
        }

        // 300ms period fits once in the window, 50ms fits about eight times
        assert!(renewals[0] <= 1, "renewals: {renewals:?}");
        assert!(renewals[1] >= 4, "renewals: {renewals:?}");
    }

    #[test]
    fn test_from_config_rejects_invalid_config() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let _guard = runtime.enter();
        let service: Arc<dyn LeaseService> = Arc::new(LeaseCoordinator::new());
        let config = LockConfig {
            auto_renew_divisor: 0,
            ..Default::default()
        };

        assert!(matches!(
            AutoRenewalTask::from_config(service, "r", "h", Duration::from_secs(1), &config),
            Err(LeaseError::Config(_))
        ));
    }
}
