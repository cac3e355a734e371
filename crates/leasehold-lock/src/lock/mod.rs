//! Lease-based lock coordination
//!
//! This module provides:
//! - Lease data model and statistics snapshot
//! - Lease store and holder index kept in lockstep
//! - Two-party deadlock guard
//! - Acquire/renew/release/force-release API
//! - Expiry sweeper and auto-renewal background tasks

mod guard;
mod model;
mod renewal;
mod service;
mod stats;
mod sweeper;
mod table;

pub use guard::{GuardVerdict, evaluate as evaluate_guard};
pub use model::*;
pub use renewal::*;
pub use service::*;
pub use stats::{
    METRIC_ACQUIRE_TOTAL, METRIC_ACTIVE_COUNT, METRIC_EXPIRED_TOTAL, METRIC_RELEASE_TOTAL,
    METRIC_RENEW_TOTAL, describe_metrics,
};
pub use sweeper::*;
