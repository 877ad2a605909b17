//! Engine configuration.
//!
//! Tuning knobs for retry policy, backoff, and worker timeouts. Loadable
//! from `~/.curricle/curricle.toml`; every field has a production default
//! so a missing file is not an error.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

fn default_max_retries() -> u32 {
    2
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_backoff_cap_ms() -> u64 {
    30_000
}

fn default_worker_timeout_ms() -> u64 {
    60_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Retry budget applied to every step at materialization.
    #[serde(default = "default_max_retries")]
    pub default_max_retries: u32,

    /// Base delay for exponential backoff between retries.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Upper bound on a single backoff delay.
    #[serde(default = "default_backoff_cap_ms")]
    pub backoff_cap_ms: u64,

    /// Timeout for worker types without an explicit entry.
    #[serde(default = "default_worker_timeout_ms")]
    pub default_worker_timeout_ms: u64,

    /// Per-worker-type invocation timeouts, in milliseconds.
    #[serde(default)]
    pub worker_timeouts: HashMap<String, u64>,

    /// Override for the JSON file store directory.
    pub state_dir: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_cap_ms: default_backoff_cap_ms(),
            default_worker_timeout_ms: default_worker_timeout_ms(),
            worker_timeouts: HashMap::new(),
            state_dir: None,
        }
    }
}

impl EngineConfig {
    pub fn curricle_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".curricle"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::curricle_dir()?.join("curricle.toml"))
    }

    /// Load from the config file, falling back to defaults when absent.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        debug!("EngineConfig::load path={}", path.display());
        if !path.exists() {
            debug!("config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(&path)?)?;
        Ok(config)
    }

    /// Invocation timeout for a worker type.
    pub fn timeout_for(&self, worker_type: &str) -> Duration {
        let millis = self
            .worker_timeouts
            .get(worker_type)
            .copied()
            .unwrap_or(self.default_worker_timeout_ms);
        Duration::from_millis(millis)
    }

    /// Backoff before the `retry_count`-th retry:
    /// `min(base * 2^(retry_count - 1), cap)`.
    pub fn backoff_delay(&self, retry_count: u32) -> Duration {
        let exponent = retry_count.saturating_sub(1).min(31);
        let delay = self
            .backoff_base_ms
            .saturating_mul(1u64 << exponent)
            .min(self.backoff_cap_ms);
        Duration::from_millis(delay)
    }
}
