//! Error types for Leasehold
//!
//! Losing a race for a resource is not an error: contention, non-ownership and
//! deadlock-guard denials are reported as `Ok(false)` by the coordinator.
//! `LeaseError` is reserved for malformed calls and bad configuration.

use std::time::Duration;

/// Application-specific error types
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LeaseError {
    #[error("resource identifier must not be empty")]
    EmptyResource,

    #[error("holder identifier must not be empty")]
    EmptyHolder,

    #[error("invalid ttl: {0:?}")]
    InvalidTtl(Duration),

    #[error("ttl {ttl:?} exceeds the configured maximum of {max:?}")]
    TtlTooLong { ttl: Duration, max: Duration },

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<config::ConfigError> for LeaseError {
    fn from(value: config::ConfigError) -> Self {
        LeaseError::Config(value.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LeaseError>;
