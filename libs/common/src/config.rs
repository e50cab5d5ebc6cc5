//! Session monitor configuration
//!
//! Timeouts are expressed in minutes on the outside, matching the options
//! the storefront exposes, and kept as `Duration`s internally.

use std::env;
use std::time::Duration;

use tracing::warn;

use crate::error::ConfigError;

/// Default inactivity budget in minutes
pub const DEFAULT_TIMEOUT_MINUTES: u64 = 30;
/// Default warning lead time in minutes
pub const DEFAULT_WARNING_MINUTES: u64 = 5;
/// Default health check cadence in seconds
pub const DEFAULT_CHECK_INTERVAL_SECONDS: u64 = 30;
/// How long the identity provider may report loading before the session is
/// considered wedged
pub const DEFAULT_STUCK_LOADING_SECONDS: u64 = 10;
/// How long a forced logout waits on the remote sign-out before redirecting
pub const DEFAULT_SIGN_OUT_TIMEOUT_SECONDS: u64 = 10;

/// Configuration for a session activity monitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Total inactivity budget before a forced logout
    pub timeout: Duration,
    /// Lead time before the timeout at which the warning fires
    pub warning: Duration,
    /// Polling cadence for health checks
    pub check_interval: Duration,
    /// Loading time after the last activity that counts as a stuck session
    pub stuck_loading_threshold: Duration,
    /// Upper bound on the remote sign-out during a forced logout
    pub sign_out_timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_MINUTES * 60),
            warning: Duration::from_secs(DEFAULT_WARNING_MINUTES * 60),
            check_interval: Duration::from_secs(DEFAULT_CHECK_INTERVAL_SECONDS),
            stuck_loading_threshold: Duration::from_secs(DEFAULT_STUCK_LOADING_SECONDS),
            sign_out_timeout: Duration::from_secs(DEFAULT_SIGN_OUT_TIMEOUT_SECONDS),
        }
    }
}

impl MonitorConfig {
    /// Build a configuration from the storefront's option surface
    pub fn from_minutes(
        timeout_minutes: u64,
        warning_minutes: u64,
        check_interval_seconds: u64,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            timeout: minutes(timeout_minutes, "timeout")?,
            warning: minutes(warning_minutes, "warning")?,
            check_interval: Duration::from_secs(check_interval_seconds),
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Create a new MonitorConfig from environment variables
    ///
    /// # Environment Variables
    /// - `SESSION_TIMEOUT_MINUTES`: Inactivity budget (default: 30)
    /// - `SESSION_WARNING_MINUTES`: Warning lead time (default: 5)
    /// - `SESSION_CHECK_INTERVAL_SECONDS`: Health check cadence (default: 30)
    /// - `SESSION_STUCK_LOADING_SECONDS`: Stuck loading threshold (default: 10)
    /// - `SESSION_SIGN_OUT_TIMEOUT_SECONDS`: Remote sign-out bound (default: 10)
    pub fn from_env() -> Result<Self, ConfigError> {
        let timeout_minutes = env_or("SESSION_TIMEOUT_MINUTES", DEFAULT_TIMEOUT_MINUTES);
        let warning_minutes = env_or("SESSION_WARNING_MINUTES", DEFAULT_WARNING_MINUTES);
        let check_interval_seconds =
            env_or("SESSION_CHECK_INTERVAL_SECONDS", DEFAULT_CHECK_INTERVAL_SECONDS);
        let stuck_loading_seconds =
            env_or("SESSION_STUCK_LOADING_SECONDS", DEFAULT_STUCK_LOADING_SECONDS);
        let sign_out_timeout_seconds =
            env_or("SESSION_SIGN_OUT_TIMEOUT_SECONDS", DEFAULT_SIGN_OUT_TIMEOUT_SECONDS);

        let config = Self {
            timeout: minutes(timeout_minutes, "timeout")?,
            warning: minutes(warning_minutes, "warning")?,
            check_interval: Duration::from_secs(check_interval_seconds),
            stuck_loading_threshold: Duration::from_secs(stuck_loading_seconds),
            sign_out_timeout: Duration::from_secs(sign_out_timeout_seconds),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check that the timing values are usable together
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout.is_zero() {
            return Err(ConfigError::Zero("timeout"));
        }
        if self.check_interval.is_zero() {
            return Err(ConfigError::Zero("check_interval"));
        }
        if self.sign_out_timeout.is_zero() {
            return Err(ConfigError::Zero("sign_out_timeout"));
        }
        if self.warning >= self.timeout {
            return Err(ConfigError::WarningNotBeforeTimeout {
                warning: self.warning.as_secs(),
                timeout: self.timeout.as_secs(),
            });
        }
        Ok(())
    }

    /// Inactivity after which the warning phase begins
    pub fn warning_threshold(&self) -> Duration {
        self.timeout.saturating_sub(self.warning)
    }

    /// Timeout in whole seconds
    pub fn timeout_seconds(&self) -> u64 {
        self.timeout.as_secs()
    }
}

fn minutes(value: u64, name: &'static str) -> Result<Duration, ConfigError> {
    value
        .checked_mul(60)
        .map(Duration::from_secs)
        .ok_or(ConfigError::Overflow(name))
}

fn env_or(key: &str, default: u64) -> u64 {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid value {:?} for {}, using {}", raw, key, default);
            default
        }),
        Err(_) => default,
    }
}
