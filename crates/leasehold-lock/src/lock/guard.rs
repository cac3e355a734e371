//! Two-party deadlock guard
//!
//! Consulted when a requester asks for a resource that another holder owns.
//! Only the two-hop pattern is detected: the current owner also holds
//! something the requester already holds. Longer wait-for cycles across three
//! or more holders pass through and are denied as ordinary contention.
//!
//! While the holder index is consistent, two distinct holders can never share
//! a live resource, so the guard fires only if that invariant has been broken.

use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardVerdict {
    /// No cycle seen, continue with the contention check
    Proceed,
    /// Granting would close a two-party circular wait
    WouldDeadlock {
        /// Resources held by both parties, sorted
        shared: Vec<String>,
    },
}

impl GuardVerdict {
    pub fn is_deadlock(&self) -> bool {
        matches!(self, GuardVerdict::WouldDeadlock { .. })
    }
}

/// Decide whether a request may proceed.
///
/// `requester_held` are the live resources of the requester and `owner_held`
/// those of the requested resource's current owner.
pub fn evaluate(requester_held: &HashSet<&str>, owner_held: &HashSet<&str>) -> GuardVerdict {
    if requester_held.is_empty() {
        return GuardVerdict::Proceed;
    }

    let mut shared: Vec<String> = requester_held
        .intersection(owner_held)
        .map(|resource| resource.to_string())
        .collect();

    if shared.is_empty() {
        GuardVerdict::Proceed
    } else {
        shared.sort();
        GuardVerdict::WouldDeadlock { shared }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_requester_proceeds() {
        let owner = HashSet::from(["a", "b"]);
        assert_eq!(evaluate(&HashSet::new(), &owner), GuardVerdict::Proceed);
    }

    #[test]
    fn test_disjoint_sets_proceed() {
        let requester = HashSet::from(["a"]);
        let owner = HashSet::from(["b"]);
        assert!(!evaluate(&requester, &owner).is_deadlock());
    }

    #[test]
    fn test_overlap_reports_deadlock() {
        let requester = HashSet::from(["a", "c", "b"]);
        let owner = HashSet::from(["c", "b", "z"]);
        assert_eq!(
            evaluate(&requester, &owner),
            GuardVerdict::WouldDeadlock {
                shared: vec!["b".to_string(), "c".to_string()]
            }
        );
    }

    #[test]
    fn test_three_party_cycle_not_detected() {
        // h1 holds a and wants b, h2 holds b and wants c, h3 holds c and wants a.
        // Each pairwise check sees disjoint sets.
        let h1 = HashSet::from(["a"]);
        let h2 = HashSet::from(["b"]);
        let h3 = HashSet::from(["c"]);
        assert!(!evaluate(&h1, &h2).is_deadlock());
        assert!(!evaluate(&h2, &h3).is_deadlock());
        assert!(!evaluate(&h3, &h1).is_deadlock());
    }
}
