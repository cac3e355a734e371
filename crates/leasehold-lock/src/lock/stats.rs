//! Lock statistics
//!
//! Atomic counters are the authoritative source for [`StatsSnapshot`]; every
//! update is mirrored to the `metrics` facade.

use std::sync::atomic::{AtomicU64, Ordering};

use metrics::{counter, describe_counter, describe_gauge, gauge};

use super::model::StatsSnapshot;

pub const METRIC_ACQUIRE_TOTAL: &str = "lease_acquire_total";
pub const METRIC_RENEW_TOTAL: &str = "lease_renew_total";
pub const METRIC_RELEASE_TOTAL: &str = "lease_release_total";
pub const METRIC_EXPIRED_TOTAL: &str = "lease_expired_total";
pub const METRIC_ACTIVE_COUNT: &str = "lease_active_count";

/// Register metric descriptions.
/// Should be called once by the hosting process, before any recorder scrape.
pub fn describe_metrics() {
    describe_counter!(
        METRIC_ACQUIRE_TOTAL,
        "Lease acquire attempts by outcome (granted, denied, deadlock)"
    );
    describe_counter!(METRIC_RENEW_TOTAL, "Successful lease renewals");
    describe_counter!(
        METRIC_RELEASE_TOTAL,
        "Lease releases by kind (owner, force)"
    );
    describe_counter!(METRIC_EXPIRED_TOTAL, "Expired leases reclaimed");
    describe_gauge!(
        METRIC_ACTIVE_COUNT,
        "Live leases observed by the last expiry sweep"
    );
}

#[derive(Default)]
pub(crate) struct LockStatsCollector {
    total_attempts: AtomicU64,
    total_grants: AtomicU64,
    total_denials: AtomicU64,
    total_renewals: AtomicU64,
    total_releases: AtomicU64,
    total_force_releases: AtomicU64,
    total_expirations: AtomicU64,
    deadlocks_prevented: AtomicU64,
}

impl LockStatsCollector {
    pub(crate) fn record_attempt(&self) {
        self.total_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_grant(&self) {
        self.total_grants.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_ACQUIRE_TOTAL, "outcome" => "granted").increment(1);
    }

    pub(crate) fn record_denial(&self) {
        self.total_denials.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_ACQUIRE_TOTAL, "outcome" => "denied").increment(1);
    }

    pub(crate) fn record_deadlock_prevented(&self) {
        self.deadlocks_prevented.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_ACQUIRE_TOTAL, "outcome" => "deadlock").increment(1);
    }

    pub(crate) fn record_renewal(&self) {
        self.total_renewals.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_RENEW_TOTAL).increment(1);
    }

    pub(crate) fn record_releases(&self, count: u64) {
        if count == 0 {
            return;
        }
        self.total_releases.fetch_add(count, Ordering::Relaxed);
        counter!(METRIC_RELEASE_TOTAL, "kind" => "owner").increment(count);
    }

    pub(crate) fn record_force_release(&self) {
        self.total_force_releases.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_RELEASE_TOTAL, "kind" => "force").increment(1);
    }

    pub(crate) fn record_expirations(&self, count: u64) {
        if count == 0 {
            return;
        }
        self.total_expirations.fetch_add(count, Ordering::Relaxed);
        counter!(METRIC_EXPIRED_TOTAL).increment(count);
    }

    pub(crate) fn publish_active(&self, active: usize) {
        gauge!(METRIC_ACTIVE_COUNT).set(active as f64);
    }

    pub(crate) fn snapshot(&self, active_leases: usize) -> StatsSnapshot {
        StatsSnapshot {
            total_attempts: self.total_attempts.load(Ordering::Relaxed),
            total_grants: self.total_grants.load(Ordering::Relaxed),
            total_denials: self.total_denials.load(Ordering::Relaxed),
            total_renewals: self.total_renewals.load(Ordering::Relaxed),
            total_releases: self.total_releases.load(Ordering::Relaxed),
            total_force_releases: self.total_force_releases.load(Ordering::Relaxed),
            total_expirations: self.total_expirations.load(Ordering::Relaxed),
            deadlocks_prevented: self.deadlocks_prevented.load(Ordering::Relaxed),
            active_leases: active_leases as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_snapshot() {
        describe_metrics();
        let stats = LockStatsCollector::default();

        stats.record_attempt();
        stats.record_attempt();
        stats.record_grant();
        stats.record_denial();
        stats.record_deadlock_prevented();
        stats.record_renewal();
        stats.record_releases(3);
        stats.record_releases(0);
        stats.record_force_release();
        stats.record_expirations(2);
        stats.publish_active(4);

        let snapshot = stats.snapshot(4);
        assert_eq!(
            snapshot,
            StatsSnapshot {
                total_attempts: 2,
                total_grants: 1,
                total_denials: 1,
                total_renewals: 1,
                total_releases: 3,
                total_force_releases: 1,
                total_expirations: 2,
                deadlocks_prevented: 1,
                active_leases: 4,
            }
        );
    }

    #[test]
    fn test_snapshot_serializes_field_names() {
        let snapshot = LockStatsCollector::default().snapshot(0);
        let json = serde_json::to_value(snapshot).unwrap();
        for field in [
            "total_attempts",
            "total_grants",
            "total_denials",
            "total_renewals",
            "total_releases",
            "total_force_releases",
            "total_expirations",
            "deadlocks_prevented",
            "active_leases",
        ] {
            assert_eq!(json[field], 0, "missing {field}");
        }
    }
}
