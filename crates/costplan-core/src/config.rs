//! Engine configuration
//!
//! Settings are layered: built-in defaults, then an optional JSON config
//! file, then environment variables, then command-line flags (applied by
//! the binary). The config file is read once at startup; nothing here is
//! consulted again during an evaluation run.

use crate::error::{CostplanError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Default pricing API endpoint
pub const DEFAULT_PRICING_API_ENDPOINT: &str = "https://pricing.api.costplan.dev/graphql";

/// Oldest config file version this build accepts
const MIN_CONFIG_FILE_VERSION: (u64, u64) = (0, 1);
/// Newest config file version this build accepts
const MAX_CONFIG_FILE_VERSION: (u64, u64) = (0, 1);

/// Environment variable overriding the pricing endpoint
pub const ENV_PRICING_API_ENDPOINT: &str = "COSTPLAN_PRICING_API_ENDPOINT";
/// Environment variable holding the pricing API key
pub const ENV_API_KEY: &str = "COSTPLAN_API_KEY";
/// Environment variable overriding the currency
pub const ENV_CURRENCY: &str = "COSTPLAN_CURRENCY";

/// Settings for one evaluation engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Config file format version, e.g. `0.1`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Pricing catalog endpoint
    pub pricing_api_endpoint: String,
    /// API key sent with catalog requests
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Currency prices are requested in
    pub currency: String,
    /// Maximum simultaneous in-flight catalog requests
    pub max_concurrency: usize,
    /// Maximum filters per batched catalog request
    pub batch_size: usize,
    /// Attempts per lookup before giving up
    pub max_attempts: u32,
    /// First retry delay in milliseconds
    pub backoff_base_ms: u64,
    /// Retry delay ceiling in milliseconds
    pub backoff_max_ms: u64,
    /// Per-request timeout in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: None,
            pricing_api_endpoint: DEFAULT_PRICING_API_ENDPOINT.to_string(),
            api_key: None,
            currency: "USD".to_string(),
            max_concurrency: 4,
            batch_size: 50,
            max_attempts: 3,
            backoff_base_ms: 200,
            backoff_max_ms: 2_000,
            request_timeout_ms: 30_000,
        }
    }
}

impl EngineConfig {
    /// Load a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CostplanError::Config(format!(
                "Config file does not exist at {}",
                path.display()
            )));
        }

        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| {
            CostplanError::Config(format!("Error parsing config file {}: {e}", path.display()))
        })?;

        if let Some(version) = &config.version {
            if !version_supported(version) {
                return Err(CostplanError::Config(format!(
                    "Invalid config file version '{version}'. Supported versions are {}.{} ≤ x ≤ {}.{}",
                    MIN_CONFIG_FILE_VERSION.0,
                    MIN_CONFIG_FILE_VERSION.1,
                    MAX_CONFIG_FILE_VERSION.0,
                    MAX_CONFIG_FILE_VERSION.1
                )));
            }
        }

        debug!("Loaded config file {}", path.display());
        Ok(config)
    }

    /// Default config file location, `<config_dir>/costplan/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("costplan").join("config.json"))
    }

    /// Load from an explicit path, else the default path if it exists, else defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Apply environment variable overrides
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(endpoint) = non_empty_env(ENV_PRICING_API_ENDPOINT) {
            debug!("Using pricing endpoint from {}", ENV_PRICING_API_ENDPOINT);
            self.pricing_api_endpoint = endpoint;
        }
        if let Some(key) = non_empty_env(ENV_API_KEY) {
            self.api_key = Some(key);
        }
        if let Some(currency) = non_empty_env(ENV_CURRENCY) {
            self.currency = currency;
        }
        self
    }

    /// Check the settings are usable
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(CostplanError::Config(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(CostplanError::Config(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(CostplanError::Config(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.currency.trim().is_empty() {
            return Err(CostplanError::Config("currency must not be empty".to_string()));
        }
        // The currency code is part of the catalog query text
        if !self.currency.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(CostplanError::Config(format!(
                "currency must be an alphanumeric code, got {:?}",
                self.currency
            )));
        }
        if self.backoff_base_ms > self.backoff_max_ms {
            return Err(CostplanError::Config(format!(
                "backoff_base_ms ({}) exceeds backoff_max_ms ({})",
                self.backoff_base_ms, self.backoff_max_ms
            )));
        }
        Ok(())
    }

    /// Delay before retry number `attempt` (zero-based)
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.min(32));
        let delay = self
            .backoff_base_ms
            .saturating_mul(factor)
            .min(self.backoff_max_ms);
        Duration::from_millis(delay)
    }

    /// Per-request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse `major.minor` with an optional leading `v`
fn parse_version(version: &str) -> Option<(u64, u64)> {
    let version = version.trim().trim_start_matches('v');
    let mut parts = version.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = match parts.next() {
        Some(p) => p.parse().ok()?,
        None => 0,
    };
    Some((major, minor))
}

fn version_supported(version: &str) -> bool {
    parse_version(version)
        .is_some_and(|v| v >= MIN_CONFIG_FILE_VERSION && v <= MAX_CONFIG_FILE_VERSION)
}
