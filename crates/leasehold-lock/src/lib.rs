//! Leasehold Lock - in-process lease coordination
//!
//! Grants exclusive, time-bounded ownership of named resources, supports
//! renewal and release, refuses grants that would close a two-party circular
//! wait, and reclaims abandoned leases.

pub mod lock;

// Re-export commonly used types
pub use lock::{
    AutoRenewalTask, ExpirySweeper, GuardVerdict, Lease, LeaseCoordinator, LeaseService,
    LeaseTableSnapshot, RenewalOutcome, StatsSnapshot, SweeperHandle, describe_metrics,
};

pub use leasehold_common::{LeaseError, LockConfig, Result};
