//! Dynamic locator configuration.
//!
//! Loaded from TOML (usually the `[locator]` table of the `locate` config
//! file) or built in code with [`DynamicLocatorConfig::new`] and the
//! `with_*` setters. Every field but `path` has a default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use locator_coord::ClientOptions;

use crate::path::normalize_path;

/// Default wait for a queued request, in milliseconds.
pub const DEFAULT_LOCATOR_TIMEOUT_MS: u64 = 2_000;

/// Default coordination session timeout, in milliseconds.
pub const DEFAULT_SESSION_TIMEOUT_MS: u64 = 10_000;

/// Default delay between connection attempts, in milliseconds.
pub const DEFAULT_SPIN_DELAY_MS: u64 = 1_000;

/// Default coordination client retry count.
pub const DEFAULT_RETRIES: u32 = 3;

/// Errors raised while loading or validating a configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Settings for one dynamic locator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicLocatorConfig {
    /// Root path (chroot) every service path is resolved under.
    pub path: String,

    /// How long a queued request waits for a pool. `0` waits forever.
    #[serde(default = "default_locator_timeout_ms")]
    pub locator_timeout_ms: u64,

    /// Coordination session timeout. Also the grace period a disconnected
    /// session gets before it is treated as expired.
    #[serde(default = "default_session_timeout_ms")]
    pub session_timeout_ms: u64,

    /// Delay between connection attempts and before reconnecting after expiry.
    #[serde(default = "default_spin_delay_ms")]
    pub spin_delay_ms: u64,

    /// Passed through to the coordination client.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// When true, an empty live pool fails requests instead of falling back
    /// to the last non-empty pool.
    #[serde(default = "default_strict")]
    pub strict: bool,
}

fn default_locator_timeout_ms() -> u64 {
    DEFAULT_LOCATOR_TIMEOUT_MS
}

fn default_session_timeout_ms() -> u64 {
    DEFAULT_SESSION_TIMEOUT_MS
}

fn default_spin_delay_ms() -> u64 {
    DEFAULT_SPIN_DELAY_MS
}

fn default_retries() -> u32 {
    DEFAULT_RETRIES
}

fn default_strict() -> bool {
    true
}

impl DynamicLocatorConfig {
    /// Creates a configuration with default timings for `path`.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            locator_timeout_ms: DEFAULT_LOCATOR_TIMEOUT_MS,
            session_timeout_ms: DEFAULT_SESSION_TIMEOUT_MS,
            spin_delay_ms: DEFAULT_SPIN_DELAY_MS,
            retries: DEFAULT_RETRIES,
            strict: true,
        }
    }

    /// Parses a configuration from TOML and validates it.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Checks the root path and timings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        normalize_path(&self.path).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.session_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "session_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_locator_timeout(mut self, timeout: Duration) -> Self {
        self.locator_timeout_ms = duration_ms(timeout);
        self
    }

    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout_ms = duration_ms(timeout);
        self
    }

    pub fn with_spin_delay(mut self, delay: Duration) -> Self {
        self.spin_delay_ms = duration_ms(delay);
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Queued request timeout, `None` when disabled.
    pub fn locator_timeout(&self) -> Option<Duration> {
        (self.locator_timeout_ms > 0).then(|| Duration::from_millis(self.locator_timeout_ms))
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }

    pub fn spin_delay(&self) -> Duration {
        Duration::from_millis(self.spin_delay_ms)
    }

    /// Options handed to the connector when opening a client.
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            session_timeout: self.session_timeout(),
            spin_delay: self.spin_delay(),
            retries: self.retries,
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
