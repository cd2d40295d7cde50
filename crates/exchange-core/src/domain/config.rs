//! Exchange configuration with validation.
//!
//! Durations are written as `"<n>ms"`, `"<n>s"` or `"<n>m"` strings.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracing::warn;

/// Exchange layer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// Timeout applied to `request` calls that don't pass one
    #[serde(with = "duration_serde")]
    pub default_timeout: Duration,
    /// Period of the timeout sweep
    #[serde(with = "duration_serde")]
    pub sweep_interval: Duration,
    /// Drain budget used by `close_gracefully`
    #[serde(with = "duration_serde")]
    pub close_timeout: Duration,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_millis(1000),
            sweep_interval: Duration::from_millis(30),
            close_timeout: Duration::from_secs(10),
        }
    }
}

impl ExchangeConfig {
    /// Create configuration from environment variables.
    ///
    /// - `EXCHANGE_DEFAULT_TIMEOUT_MS` (default: 1000)
    /// - `EXCHANGE_SWEEP_INTERVAL_MS` (default: 30)
    /// - `EXCHANGE_CLOSE_TIMEOUT_MS` (default: 10000)
    ///
    /// Unparsable values, and zero for the timeout or the interval, are
    /// ignored with a warning, so the result always passes [`validate`](Self::validate).
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            default_timeout: millis(&lookup, "EXCHANGE_DEFAULT_TIMEOUT_MS", false)
                .unwrap_or(defaults.default_timeout),
            sweep_interval: millis(&lookup, "EXCHANGE_SWEEP_INTERVAL_MS", false)
                .unwrap_or(defaults.sweep_interval),
            close_timeout: millis(&lookup, "EXCHANGE_CLOSE_TIMEOUT_MS", true)
                .unwrap_or(defaults.close_timeout),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "default_timeout cannot be 0".into(),
            ));
        }

        if self.sweep_interval.is_zero() {
            return Err(ConfigError::InvalidInterval(
                "sweep_interval cannot be 0".into(),
            ));
        }

        Ok(())
    }

    /// Builder-style method to set the default request timeout
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Builder-style method to set the sweep interval
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Builder-style method to set the graceful close budget
    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }
}

/// Millisecond value of `key`. A zero close timeout means "close at once" and
/// is kept; elsewhere zero is rejected.
fn millis<F>(lookup: &F, key: &str, allow_zero: bool) -> Option<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(0) if !allow_zero => {
            warn!(key = key, "Zero is not allowed here, using the default");
            None
        }
        Ok(ms) => Some(Duration::from_millis(ms)),
        Err(_) => {
            warn!(key = key, value = %raw, "Ignoring unparsable millisecond value");
            None
        }
    }
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}ms", duration.as_millis()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub(super) fn parse_duration(s: &str) -> Result<Duration, &'static str> {
        let s = s.trim();
        // "ms" must be checked before the bare "s"/"m" suffixes.
        if let Some(ms) = s.strip_suffix("ms") {
            ms.trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| "invalid milliseconds")
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid seconds")
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.trim()
                .parse::<u64>()
                .map(|m| Duration::from_secs(m * 60))
                .map_err(|_| "invalid minutes")
        } else {
            // Plain number: milliseconds
            s.parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| "invalid duration format")
        }
    }
}
