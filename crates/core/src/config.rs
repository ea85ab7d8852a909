//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and passed into core
//! services. Request handlers never read process-wide environment variables;
//! doing so leads to inconsistent behaviour in multi-threaded runtimes and
//! test harnesses.

use std::time::Duration;

/// Default retry budget before a sync record is dead-lettered.
pub const DEFAULT_MAX_RETRIES: u32 = 8;

/// Default upper bound on a single allocation backend or counter store call.
pub const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_millis(3000);

/// Error type for configuration resolution.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A configuration value could not be parsed or is out of range.
    #[error("Invalid value for {name}: {reason}")]
    InvalidValue {
        /// The environment variable or setting name.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    max_retries: u32,
    backend_timeout: Duration,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if `max_retries` is zero or the
    /// timeout is zero; both would make their subsystems degenerate (a zero
    /// retry budget dead-letters every record on its first failure, and a
    /// zero timeout forces every allocation onto the fallback path).
    pub fn new(max_retries: u32, backend_timeout: Duration) -> Result<Self, ConfigError> {
        if max_retries == 0 {
            return Err(ConfigError::InvalidValue {
                name: "GHEMR_MAX_RETRIES",
                reason: "must be at least 1".into(),
            });
        }
        if backend_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "GHEMR_BACKEND_TIMEOUT_MS",
                reason: "must be at least 1ms".into(),
            });
        }
        Ok(Self {
            max_retries,
            backend_timeout,
        })
    }

    /// The retry budget before a sync record is dead-lettered.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Upper bound on a single allocation backend or counter store call.
    pub fn backend_timeout(&self) -> Duration {
        self.backend_timeout
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backend_timeout: DEFAULT_BACKEND_TIMEOUT,
        }
    }
}

/// Resolve the retry budget from an environment variable value.
///
/// `None` (variable unset) yields [`DEFAULT_MAX_RETRIES`].
pub fn max_retries_from_env_value(value: Option<String>) -> Result<u32, ConfigError> {
    match value {
        None => Ok(DEFAULT_MAX_RETRIES),
        Some(raw) => {
            let parsed: u32 = raw.parse().map_err(|_| ConfigError::InvalidValue {
                name: "GHEMR_MAX_RETRIES",
                reason: format!("expected a positive integer, got {raw:?}"),
            })?;
            if parsed == 0 {
                return Err(ConfigError::InvalidValue {
                    name: "GHEMR_MAX_RETRIES",
                    reason: "must be at least 1".into(),
                });
            }
            Ok(parsed)
        }
    }
}

/// Resolve the backend timeout from an environment variable value (in
/// milliseconds).
///
/// `None` (variable unset) yields [`DEFAULT_BACKEND_TIMEOUT`].
pub fn backend_timeout_from_env_value(value: Option<String>) -> Result<Duration, ConfigError> {
    match value {
        None => Ok(DEFAULT_BACKEND_TIMEOUT),
        Some(raw) => {
            let millis: u64 = raw.parse().map_err(|_| ConfigError::InvalidValue {
                name: "GHEMR_BACKEND_TIMEOUT_MS",
                reason: format!("expected milliseconds as a positive integer, got {raw:?}"),
            })?;
            if millis == 0 {
                return Err(ConfigError::InvalidValue {
                    name: "GHEMR_BACKEND_TIMEOUT_MS",
                    reason: "must be at least 1ms".into(),
                });
            }
            Ok(Duration::from_millis(millis))
        }
    }
}
