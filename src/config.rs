//! TOML configuration for kbqa.
//!
//! Every section is optional; omitted values fall back to the named defaults
//! exported by `kbqa-core`. A missing config file is not an error and yields
//! [`Config::default`].
//!
//! ```toml
//! [store]
//! min_score = 0.1
//!
//! [cache]
//! default_ttl_secs = 3600
//! embedding_ttl_secs = 86400
//! search_ttl_secs = 1800
//!
//! [rate_limit.upload]
//! requests_per_window = 10
//! window_secs = 60
//!
//! [rate_limit.general]
//! requests_per_window = 60
//! window_secs = 60
//!
//! [maintenance]
//! sweep_interval_secs = 300
//! ```

use anyhow::{Context, Result};
use kbqa_core::cache::{DEFAULT_TTL_SECS, EMBEDDING_TTL_SECS, SEARCH_TTL_SECS};
use kbqa_core::rate_limit::{
    DEFAULT_WINDOW_SECS, GENERAL_REQUESTS_PER_WINDOW, UPLOAD_REQUESTS_PER_WINDOW,
};
use kbqa_core::store::DEFAULT_MIN_SCORE;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StoreConfig {
    /// Matches scoring below this cosine similarity are never returned.
    #[serde(default = "default_min_score")]
    pub min_score: f64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            min_score: default_min_score(),
        }
    }
}

fn default_min_score() -> f64 {
    DEFAULT_MIN_SCORE
}

/// Default TTLs for the three cache instances. Non-positive values make
/// every entry expire immediately.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: i64,
    #[serde(default = "default_embedding_ttl_secs")]
    pub embedding_ttl_secs: i64,
    #[serde(default = "default_search_ttl_secs")]
    pub search_ttl_secs: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: default_ttl_secs(),
            embedding_ttl_secs: default_embedding_ttl_secs(),
            search_ttl_secs: default_search_ttl_secs(),
        }
    }
}

fn default_ttl_secs() -> i64 {
    DEFAULT_TTL_SECS
}
fn default_embedding_ttl_secs() -> i64 {
    EMBEDDING_TTL_SECS
}
fn default_search_ttl_secs() -> i64 {
    SEARCH_TTL_SECS
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RateLimitConfig {
    #[serde(default = "default_upload_tier")]
    pub upload: TierConfig,
    #[serde(default = "default_general_tier")]
    pub general: TierConfig,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            upload: default_upload_tier(),
            general: default_general_tier(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TierConfig {
    pub requests_per_window: usize,
    #[serde(default = "default_window_secs")]
    pub window_secs: i64,
}

fn default_upload_tier() -> TierConfig {
    TierConfig {
        requests_per_window: UPLOAD_REQUESTS_PER_WINDOW,
        window_secs: DEFAULT_WINDOW_SECS,
    }
}
fn default_general_tier() -> TierConfig {
    TierConfig {
        requests_per_window: GENERAL_REQUESTS_PER_WINDOW,
        window_secs: DEFAULT_WINDOW_SECS,
    }
}
fn default_window_secs() -> i64 {
    DEFAULT_WINDOW_SECS
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MaintenanceConfig {
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_sweep_interval_secs() -> u64 {
    300
}

/// Parse and validate a TOML config string.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Load the config at `path`, or defaults if the file does not exist.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

fn validate(config: &Config) -> Result<()> {
    if !(-1.0..=1.0).contains(&config.store.min_score) {
        anyhow::bail!("store.min_score must be in [-1.0, 1.0]");
    }

    for (name, tier) in [
        ("upload", &config.rate_limit.upload),
        ("general", &config.rate_limit.general),
    ] {
        if tier.requests_per_window < 1 {
            anyhow::bail!("rate_limit.{}.requests_per_window must be >= 1", name);
        }
        if tier.window_secs < 1 {
            anyhow::bail!("rate_limit.{}.window_secs must be >= 1", name);
        }
    }

    if config.maintenance.sweep_interval_secs < 1 {
        anyhow::bail!("maintenance.sweep_interval_secs must be >= 1");
    }

    Ok(())
}
