//! Lease data model

use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Exclusive, time-bounded ownership of one resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    /// Protected resource, unique key in the lease store
    pub resource: String,
    /// Current owner
    pub holder: String,
    /// Instant of the most recent fresh grant (renewals keep it)
    pub acquired_at: Instant,
    /// The lease is no longer valid from this instant on
    pub expires_at: Instant,
    /// TTL last applied by a grant or renewal
    pub ttl: Duration,
    /// Monotonically increasing per coordinator, assigned on each fresh grant
    pub fence_token: u64,
    /// Renewals since the fresh grant
    pub renewal_count: u32,
}

impl Lease {
    pub(crate) fn new(
        resource: impl Into<String>,
        holder: impl Into<String>,
        now: Instant,
        expires_at: Instant,
        ttl: Duration,
        fence_token: u64,
    ) -> Self {
        Self {
            resource: resource.into(),
            holder: holder.into(),
            acquired_at: now,
            expires_at,
            ttl,
            fence_token,
            renewal_count: 0,
        }
    }

    /// A lease is live strictly before its expiry instant
    pub fn is_live_at(&self, now: Instant) -> bool {
        self.expires_at > now
    }

    pub fn is_expired(&self) -> bool {
        !self.is_live_at(Instant::now())
    }

    pub fn is_owned_by(&self, holder: &str) -> bool {
        self.holder == holder
    }

    /// Zero once expired
    pub fn remaining_ttl_at(&self, now: Instant) -> Duration {
        self.expires_at.saturating_duration_since(now)
    }
}

/// Immutable statistics snapshot, built fresh on every read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Acquire attempts with valid arguments
    pub total_attempts: u64,
    /// Successful acquires, including re-entrant refreshes
    pub total_grants: u64,
    /// Acquires denied because another holder owns the resource
    pub total_denials: u64,
    /// Successful renewals
    pub total_renewals: u64,
    /// Releases by the owning holder
    pub total_releases: u64,
    /// Administrative releases
    pub total_force_releases: u64,
    /// Expired leases physically reclaimed
    pub total_expirations: u64,
    /// Acquires denied by the deadlock guard
    pub deadlocks_prevented: u64,
    /// Live leases when the snapshot was taken
    pub active_leases: u64,
}

/// Full copy of the lease store and holder index, for introspection
#[derive(Debug, Clone)]
pub struct LeaseTableSnapshot {
    /// Instant the snapshot was taken
    pub taken_at: Instant,
    /// Every physically present lease, expired ones included
    pub leases: BTreeMap<String, Lease>,
    /// Holder index as stored
    pub holders: BTreeMap<String, BTreeSet<String>>,
}

impl LeaseTableSnapshot {
    /// True when the holder index mirrors the lease store exactly and holds
    /// no empty sets.
    pub fn is_consistent(&self) -> bool {
        let mut expected: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for (resource, lease) in &self.leases {
            if resource != &lease.resource {
                return false;
            }
            expected
                .entry(lease.holder.as_str())
                .or_default()
                .insert(resource.as_str());
        }

        if expected.len() != self.holders.len() {
            return false;
        }

        self.holders.iter().all(|(holder, resources)| {
            !resources.is_empty()
                && expected.get(holder.as_str()).is_some_and(|want| {
                    want.len() == resources.len()
                        && resources.iter().all(|r| want.contains(r.as_str()))
                })
        })
    }

    /// Live leases at `taken_at`
    pub fn live_leases(&self) -> impl Iterator<Item = &Lease> {
        self.leases
            .values()
            .filter(|lease| lease.is_live_at(self.taken_at))
    }

    /// Holder index restricted to live leases
    pub fn live_holders(&self) -> BTreeMap<String, BTreeSet<String>> {
        let mut holders: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for lease in self.live_leases() {
            holders
                .entry(lease.holder.clone())
                .or_default()
                .insert(lease.resource.clone());
        }
        holders
    }
}
