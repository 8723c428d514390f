//! Configuration for the document session store.
//!
//! ```toml
//! prefix = "/sess/"
//! ttl_secs = 3600
//! log_errors = true
//! prune_interval_ms = 60000
//! sweep = true
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default namespace for session document URIs.
pub const DEFAULT_PREFIX: &str = "/sess/";

const DEFAULT_PRUNE_INTERVAL_MS: u64 = 60_000;

/// Default interval between expiry sweeps.
pub const DEFAULT_PRUNE_INTERVAL: Duration = Duration::from_millis(DEFAULT_PRUNE_INTERVAL_MS);

/// Shortest interval the sweep will wait between runs.
pub const MIN_PRUNE_INTERVAL: Duration = Duration::from_millis(10);

/// Configuration for the document session store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Namespace prepended to every session document URI.
    pub prefix: String,

    /// Fixed session lifetime in seconds.
    /// Overrides the lifetime derived from the session cookie when set.
    pub ttl_secs: Option<u64>,

    /// Report document store errors through the default error logger.
    /// A custom logger given to the builder takes precedence.
    pub log_errors: bool,

    /// Milliseconds between expiry sweeps.
    /// Values below [`MIN_PRUNE_INTERVAL`] are raised to it.
    pub prune_interval_ms: u64,

    /// Whether to run the background expiry sweep.
    pub sweep: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            ttl_secs: None,
            log_errors: false,
            prune_interval_ms: DEFAULT_PRUNE_INTERVAL_MS,
            sweep: true,
        }
    }
}

impl StoreConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Set the document URI prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Set a fixed session lifetime.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_secs = Some(ttl.as_secs());
        self
    }

    /// Use the lifetime carried by each session's cookie.
    pub fn without_ttl(mut self) -> Self {
        self.ttl_secs = None;
        self
    }

    /// Enable or disable the default error logger.
    pub fn with_log_errors(mut self, enabled: bool) -> Self {
        self.log_errors = enabled;
        self
    }

    /// Set the interval between expiry sweeps.
    pub fn with_prune_interval(mut self, interval: Duration) -> Self {
        self.prune_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Enable or disable the background expiry sweep.
    pub fn with_sweep(mut self, enabled: bool) -> Self {
        self.sweep = enabled;
        self
    }

    /// Configured session lifetime. Zero counts as unset.
    pub fn ttl(&self) -> Option<u64> {
        self.ttl_secs.filter(|secs| *secs > 0)
    }

    /// Interval between expiry sweeps, never shorter than
    /// [`MIN_PRUNE_INTERVAL`].
    pub fn prune_interval(&self) -> Duration {
        Duration::from_millis(self.prune_interval_ms).max(MIN_PRUNE_INTERVAL)
    }
}
