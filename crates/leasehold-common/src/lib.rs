//! Leasehold Common - Shared types and utilities
//!
//! This crate provides the foundational pieces used by the lock core:
//! - Error type for caller-programming errors
//! - Configuration loading
//! - Logging bootstrap

pub mod config;
pub mod error;
pub mod logging;

// Re-exports for convenience
pub use crate::config::{AppConfig, LockConfig, LoggingConfig};
pub use crate::error::{LeaseError, Result};

/// Environment variable prefix used by [`AppConfig::load`]
pub const ENV_PREFIX: &str = "LEASEHOLD";

/// Separator between nested keys in environment variables
pub const ENV_SEPARATOR: &str = "__";
