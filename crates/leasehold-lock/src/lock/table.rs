//! Lease store and holder index
//!
//! Both maps live in one struct so that a single exclusive section covers
//! every paired mutation. The holder index mirrors the physical store: an
//! expired entry stays indexed until it is evicted, and readers filter by
//! liveness.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::time::Instant;

use super::model::{Lease, LeaseTableSnapshot};

#[derive(Debug, Default)]
pub(crate) struct LeaseTable {
    /// resource -> lease
    leases: HashMap<String, Lease>,
    /// holder -> resources; empty sets are removed
    holders: HashMap<String, HashSet<String>>,
}

impl LeaseTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// The lease on `resource`, if present and live at `now`
    pub(crate) fn live(&self, resource: &str, now: Instant) -> Option<&Lease> {
        self.leases
            .get(resource)
            .filter(|lease| lease.is_live_at(now))
    }

    pub(crate) fn live_mut(&mut self, resource: &str, now: Instant) -> Option<&mut Lease> {
        self.leases
            .get_mut(resource)
            .filter(|lease| lease.is_live_at(now))
    }

    /// Resources `holder` owns through live leases
    pub(crate) fn live_resources_of(&self, holder: &str, now: Instant) -> HashSet<&str> {
        self.holders
            .get(holder)
            .map(|resources| {
                resources
                    .iter()
                    .filter(|resource| self.live(resource, now).is_some())
                    .map(String::as_str)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every resource indexed under `holder`, live or not
    pub(crate) fn indexed_resources_of(&self, holder: &str) -> Vec<String> {
        self.holders
            .get(holder)
            .map(|resources| resources.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Store `lease`, replacing any entry for the same resource.
    ///
    /// The replaced lease is unindexed from its previous holder.
    pub(crate) fn insert(&mut self, lease: Lease) -> Option<Lease> {
        let resource = lease.resource.clone();
        let holder = lease.holder.clone();

        let previous = self.leases.insert(resource.clone(), lease);
        if let Some(ref old) = previous {
            self.unindex(&old.holder, &resource);
        }
        self.holders.entry(holder).or_default().insert(resource);
        previous
    }

    /// Remove the entry for `resource` together with its index membership
    pub(crate) fn remove(&mut self, resource: &str) -> Option<Lease> {
        let removed = self.leases.remove(resource)?;
        self.unindex(&removed.holder, resource);
        Some(removed)
    }

    /// Remove the entry for `resource` only if it has expired by `now`
    pub(crate) fn evict_if_expired(&mut self, resource: &str, now: Instant) -> Option<Lease> {
        match self.leases.get(resource) {
            Some(lease) if !lease.is_live_at(now) => self.remove(resource),
            _ => None,
        }
    }

    /// Resources whose lease has expired by `now`
    pub(crate) fn expired_resources(&self, now: Instant) -> Vec<String> {
        self.leases
            .values()
            .filter(|lease| !lease.is_live_at(now))
            .map(|lease| lease.resource.clone())
            .collect()
    }

    pub(crate) fn live_count(&self, now: Instant) -> usize {
        self.leases
            .values()
            .filter(|lease| lease.is_live_at(now))
            .count()
    }

    pub(crate) fn snapshot(&self, now: Instant) -> LeaseTableSnapshot {
        LeaseTableSnapshot {
            taken_at: now,
            leases: self
                .leases
                .iter()
                .map(|(resource, lease)| (resource.clone(), lease.clone()))
                .collect::<BTreeMap<_, _>>(),
            holders: self
                .holders
                .iter()
                .map(|(holder, resources)| {
                    (
                        holder.clone(),
                        resources.iter().cloned().collect::<BTreeSet<_>>(),
                    )
                })
                .collect(),
        }
    }

    fn unindex(&mut self, holder: &str, resource: &str) {
        if let Some(resources) = self.holders.get_mut(holder) {
            resources.remove(resource);
            if resources.is_empty() {
                self.holders.remove(holder);
            }
        }
    }
}
