//! Configuration for the lock coordinator and its background tasks
//!
//! Values are read from an optional file and then from environment variables
//! prefixed with `LEASEHOLD`, nested keys separated by `__`
//! (e.g. `LEASEHOLD__LOCK__POLL_INTERVAL_MS=5`).

use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::{LeaseError, Result};
use crate::{ENV_PREFIX, ENV_SEPARATOR};

/// Lock coordinator settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockConfig {
    /// Delay between attempts of a timed acquire in milliseconds (default: 10ms)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Period of the expiry sweeper in milliseconds (default: 1000ms)
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,

    /// Upper bound on any requested TTL in milliseconds (default: 0 = unlimited)
    #[serde(default)]
    pub max_ttl_ms: u64,

    /// Auto-renewal fires every `ttl / auto_renew_divisor` (default: 3)
    #[serde(default = "default_auto_renew_divisor")]
    pub auto_renew_divisor: u32,
}

fn default_poll_interval_ms() -> u64 {
    10
}

fn default_sweep_interval_ms() -> u64 {
    1000
}

fn default_auto_renew_divisor() -> u32 {
    3
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
            max_ttl_ms: 0,
            auto_renew_divisor: default_auto_renew_divisor(),
        }
    }
}

impl LockConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    /// `None` when TTLs are unbounded
    pub fn max_ttl(&self) -> Option<Duration> {
        (self.max_ttl_ms > 0).then(|| Duration::from_millis(self.max_ttl_ms))
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(LeaseError::Config(
                "lock.poll_interval_ms must be positive".to_string(),
            ));
        }
        if self.sweep_interval_ms == 0 {
            return Err(LeaseError::Config(
                "lock.sweep_interval_ms must be positive".to_string(),
            ));
        }
        if self.auto_renew_divisor == 0 {
            return Err(LeaseError::Config(
                "lock.auto_renew_divisor must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Logging settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set (default: "info")
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Top-level configuration
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub lock: LockConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load from an optional file, then apply environment overrides
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path).required(false));
        }

        let config: AppConfig = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.lock.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Mutex, MutexGuard};

    // Every load reads the process environment
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn env_guard() -> MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[test]
    fn test_lock_config_default() {
        let config = LockConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_millis(10));
        assert_eq!(config.sweep_interval(), Duration::from_secs(1));
        assert_eq!(config.max_ttl(), None);
        assert_eq!(config.auto_renew_divisor, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_lock_config_max_ttl() {
        let config = LockConfig {
            max_ttl_ms: 5000,
            ..Default::default()
        };
        assert_eq!(config.max_ttl(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_lock_config_validate_rejects_zero_intervals() {
        let config = LockConfig {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(LeaseError::Config(_))));

        let config = LockConfig {
            sweep_interval_ms: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(LeaseError::Config(_))));

        let config = LockConfig {
            auto_renew_divisor: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(LeaseError::Config(_))));
    }

    #[test]
    fn test_load_from_file() {
        let _env = env_guard();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leasehold.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[lock]\npoll_interval_ms = 5\nmax_ttl_ms = 60000\n\n[logging]\nlevel = \"debug\""
        )
        .unwrap();

        let config = AppConfig::load(path.to_str()).unwrap();
        assert_eq!(config.lock.poll_interval_ms, 5);
        assert_eq!(config.lock.max_ttl_ms, 60000);
        // Unset keys keep their defaults
        assert_eq!(config.lock.sweep_interval_ms, 1000);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let _env = env_guard();
        let config = AppConfig::load(Some("/nonexistent/leasehold.toml")).unwrap();
        assert_eq!(config.lock, LockConfig::default());
    }

    #[test]
    fn test_load_rejects_invalid_file_values() {
        let _env = env_guard();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leasehold.toml");
        std::fs::write(&path, "[lock]\nsweep_interval_ms = 0\n").unwrap();

        assert!(matches!(
            AppConfig::load(path.to_str()),
            Err(LeaseError::Config(_))
        ));
    }

    #[test]
    fn test_load_applies_environment_overrides() {
        let _env = env_guard();
        let key = format!("{ENV_PREFIX}{ENV_SEPARATOR}LOCK{ENV_SEPARATOR}POLL_INTERVAL_MS");

        // SAFETY: env-reading tests in this module hold ENV_LOCK
        unsafe { std::env::set_var(&key, "5") };
        let loaded = AppConfig::load(None);
        unsafe { std::env::remove_var(&key) };

        let config = loaded.unwrap();
        assert_eq!(config.lock.poll_interval_ms, 5);
        assert_eq!(config.lock.sweep_interval_ms, 1000);
    }
}
