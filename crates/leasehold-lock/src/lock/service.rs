//! Lease coordinator
//!
//! Composes the lease table, deadlock guard and statistics into the public
//! operation set. One `RwLock` covers the lease store and the holder index;
//! every mutation takes it exclusively, inspection takes it shared.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use leasehold_common::{LeaseError, LockConfig, Result};

use super::guard::{self, GuardVerdict};
use super::model::{Lease, LeaseTableSnapshot, StatsSnapshot};
use super::stats::LockStatsCollector;
use super::table::LeaseTable;

/// Lease coordination operations.
///
/// Contention is never an error: acquire, renew and release report a lost
/// race as `Ok(false)`. `Err` is returned only for malformed calls.
#[async_trait]
pub trait LeaseService: Send + Sync {
    /// Non-blocking acquire
    fn acquire(&self, resource: &str, holder: &str, ttl: Duration) -> Result<bool>;

    /// Acquire, polling until granted or `wait_timeout` elapses.
    ///
    /// No fairness: concurrent waiters race on every poll.
    async fn acquire_timeout(
        &self,
        resource: &str,
        holder: &str,
        ttl: Duration,
        wait_timeout: Duration,
    ) -> Result<bool>;

    /// Extend a live lease owned by `holder` to `now + new_ttl`
    fn renew(&self, resource: &str, holder: &str, new_ttl: Duration) -> Result<bool>;

    /// Release a live lease owned by `holder`
    fn release(&self, resource: &str, holder: &str) -> Result<bool>;

    /// Release every lease of `holder`, returning how many were live
    fn release_all(&self, holder: &str) -> Result<usize>;

    /// Remove the lease on `resource` whoever owns it (admin operation)
    fn force_release(&self, resource: &str) -> Result<bool>;

    fn is_locked(&self, resource: &str) -> bool;

    fn holder_of(&self, resource: &str) -> Option<String>;

    /// `None` when the resource is not locked
    fn remaining_ttl(&self, resource: &str) -> Option<Duration>;

    /// Copy of the live lease on `resource`
    fn lease(&self, resource: &str) -> Option<Lease>;

    /// Live resources of `holder`, sorted
    fn held_by(&self, holder: &str) -> Vec<String>;

    /// Reclaim every expired lease, returning the count
    fn cleanup(&self) -> usize;

    fn stats(&self) -> StatsSnapshot;

    /// Full-state copy of the lease store and holder index
    fn snapshot(&self) -> LeaseTableSnapshot;
}

/// In-memory lease coordinator.
///
/// Instances share nothing; each owns its own table, counters and fence
/// sequence.
pub struct LeaseCoordinator {
    config: LockConfig,
    table: RwLock<LeaseTable>,
    stats: LockStatsCollector,
    fence_sequence: AtomicU64,
}

impl Default for LeaseCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl LeaseCoordinator {
    pub fn new() -> Self {
        Self::build(LockConfig::default())
    }

    /// Build a coordinator from `config`, rejecting zero intervals
    pub fn with_config(config: LockConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: LockConfig) -> Self {
        Self {
            config,
            table: RwLock::new(LeaseTable::new()),
            stats: LockStatsCollector::default(),
            fence_sequence: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    fn validate_resource(resource: &str) -> Result<()> {
        if resource.is_empty() {
            return Err(LeaseError::EmptyResource);
        }
        Ok(())
    }

    fn validate_identifiers(resource: &str, holder: &str) -> Result<()> {
        Self::validate_resource(resource)?;
        if holder.is_empty() {
            return Err(LeaseError::EmptyHolder);
        }
        Ok(())
    }

    /// Expiry instant for a lease granted or renewed at `now`
    fn expiry_for(&self, now: Instant, ttl: Duration) -> Result<Instant> {
        if ttl.is_zero() {
            return Err(LeaseError::InvalidTtl(ttl));
        }
        if let Some(max) = self.config.max_ttl()
            && ttl > max
        {
            return Err(LeaseError::TtlTooLong { ttl, max });
        }
        now.checked_add(ttl).ok_or(LeaseError::InvalidTtl(ttl))
    }

    fn next_fence_token(&self) -> u64 {
        self.fence_sequence.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Evict an expired entry before a mutation inspects it
    fn evict_expired(&self, table: &mut LeaseTable, resource: &str, now: Instant) {
        if let Some(expired) = table.evict_if_expired(resource, now) {
            self.stats.record_expirations(1);
            debug!(
                resource = %resource,
                holder = %expired.holder,
                "Evicted expired lease"
            );
        }
    }
}

#[async_trait]
impl LeaseService for LeaseCoordinator {
    fn acquire(&self, resource: &str, holder: &str, ttl: Duration) -> Result<bool> {
        Self::validate_identifiers(resource, holder)?;
        let now = Instant::now();
        let expires_at = self.expiry_for(now, ttl)?;

        self.stats.record_attempt();
        let mut table = self.table.write();

        if let Some(current) = table.live(resource, now)
            && !current.is_owned_by(holder)
        {
            let verdict = guard::evaluate(
                &table.live_resources_of(holder, now),
                &table.live_resources_of(&current.holder, now),
            );

            if let GuardVerdict::WouldDeadlock { shared } = verdict {
                self.stats.record_deadlock_prevented();
                warn!(
                    resource = %resource,
                    holder = %holder,
                    owner = %current.holder,
                    shared = ?shared,
                    "Lease denied: would create a circular wait"
                );
                return Ok(false);
            }

            self.stats.record_denial();
            debug!(
                resource = %resource,
                holder = %holder,
                owner = %current.holder,
                "Lease held by another holder"
            );
            return Ok(false);
        }

        self.evict_expired(&mut table, resource, now);

        match table.live_mut(resource, now) {
            Some(lease) => {
                // Re-entrant acquire refreshes the expiry and keeps the grant
                lease.expires_at = expires_at;
                lease.ttl = ttl;
                debug!(resource = %resource, holder = %holder, "Lease refreshed");
            }
            None => {
                let fence_token = self.next_fence_token();
                table.insert(Lease::new(
                    resource,
                    holder,
                    now,
                    expires_at,
                    ttl,
                    fence_token,
                ));
                debug!(
                    resource = %resource,
                    holder = %holder,
                    fence_token,
                    ttl_ms = ttl.as_millis() as u64,
                    "Lease acquired"
                );
            }
        }

        self.stats.record_grant();
        Ok(true)
    }

    async fn acquire_timeout(
        &self,
        resource: &str,
        holder: &str,
        ttl: Duration,
        wait_timeout: Duration,
    ) -> Result<bool> {
        let started = Instant::now();
        let poll_interval = self.config.poll_interval();

        loop {
            if self.acquire(resource, holder, ttl)? {
                return Ok(true);
            }

            let elapsed = started.elapsed();
            if elapsed >= wait_timeout {
                debug!(
                    resource = %resource,
                    holder = %holder,
                    waited_ms = elapsed.as_millis() as u64,
                    "Lease wait timed out"
                );
                return Ok(false);
            }

            tokio::time::sleep(poll_interval.min(wait_timeout - elapsed)).await;
        }
    }

    fn renew(&self, resource: &str, holder: &str, new_ttl: Duration) -> Result<bool> {
        Self::validate_identifiers(resource, holder)?;
        let now = Instant::now();
        let expires_at = self.expiry_for(now, new_ttl)?;

        let mut table = self.table.write();
        self.evict_expired(&mut table, resource, now);

        match table.live_mut(resource, now) {
            Some(lease) if lease.is_owned_by(holder) => {
                lease.expires_at = expires_at;
                lease.ttl = new_ttl;
                lease.renewal_count = lease.renewal_count.saturating_add(1);
                self.stats.record_renewal();
                debug!(
                    resource = %resource,
                    holder = %holder,
                    renewal_count = lease.renewal_count,
                    "Lease renewed"
                );
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn release(&self, resource: &str, holder: &str) -> Result<bool> {
        Self::validate_identifiers(resource, holder)?;
        let now = Instant::now();

        let mut table = self.table.write();
        self.evict_expired(&mut table, resource, now);

        if !table
            .live(resource, now)
            .is_some_and(|lease| lease.is_owned_by(holder))
        {
            return Ok(false);
        }

        table.remove(resource);
        self.stats.record_releases(1);
        debug!(resource = %resource, holder = %holder, "Lease released");
        Ok(true)
    }

    fn release_all(&self, holder: &str) -> Result<usize> {
        if holder.is_empty() {
            return Err(LeaseError::EmptyHolder);
        }
        let now = Instant::now();

        let mut table = self.table.write();
        let mut released = 0usize;
        let mut expired = 0u64;
        for resource in table.indexed_resources_of(holder) {
            if let Some(lease) = table.remove(&resource) {
                if lease.is_live_at(now) {
                    released += 1;
                } else {
                    expired += 1;
                }
            }
        }

        self.stats.record_releases(released as u64);
        self.stats.record_expirations(expired);
        if released > 0 {
            debug!(holder = %holder, count = released, "Released all leases of holder");
        }
        Ok(released)
    }

    fn force_release(&self, resource: &str) -> Result<bool> {
        Self::validate_resource(resource)?;
        let now = Instant::now();

        let mut table = self.table.write();
        self.evict_expired(&mut table, resource, now);

        match table.remove(resource) {
            Some(lease) => {
                self.stats.record_force_release();
                info!(
                    resource = %resource,
                    holder = %lease.holder,
                    "Lease force released"
                );
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn is_locked(&self, resource: &str) -> bool {
        self.table.read().live(resource, Instant::now()).is_some()
    }

    fn holder_of(&self, resource: &str) -> Option<String> {
        self.table
            .read()
            .live(resource, Instant::now())
            .map(|lease| lease.holder.clone())
    }

    fn remaining_ttl(&self, resource: &str) -> Option<Duration> {
        let now = Instant::now();
        self.table
            .read()
            .live(resource, now)
            .map(|lease| lease.remaining_ttl_at(now))
    }

    fn lease(&self, resource: &str) -> Option<Lease> {
        self.table.read().live(resource, Instant::now()).cloned()
    }

    fn held_by(&self, holder: &str) -> Vec<String> {
        let table = self.table.read();
        let mut resources: Vec<String> = table
            .live_resources_of(holder, Instant::now())
            .into_iter()
            .map(str::to_string)
            .collect();
        resources.sort();
        resources
    }

    fn cleanup(&self) -> usize {
        let now = Instant::now();
        let mut table = self.table.write();

        let expired = table.expired_resources(now);
        for resource in &expired {
            if let Some(lease) = table.remove(resource) {
                debug!(
                    resource = %resource,
                    holder = %lease.holder,
                    "Cleaned up expired lease"
                );
            }
        }

        self.stats.record_expirations(expired.len() as u64);
        self.stats.publish_active(table.live_count(now));
        expired.len()
    }

    fn stats(&self) -> StatsSnapshot {
        let active = self.table.read().live_count(Instant::now());
        self.stats.snapshot(active)
    }

    fn snapshot(&self) -> LeaseTableSnapshot {
        self.table.read().snapshot(Instant::now())
    }
}
