use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Sources {
    /// Primary remote routing service endpoint.
    pub primary_url: String,
    /// Optional secondary service tried when the primary is unreachable.
    #[serde(default)]
    pub secondary_url: Option<String>,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
    /// Enable the client-side pathfinding fallback as the last strategy.
    #[serde(default = "default_true")]
    pub enable_local_fallback: bool,
    #[serde(default = "default_local_max_paths")]
    pub local_max_paths: usize,
}

fn default_request_timeout_seconds() -> u64 {
    10
}
fn default_true() -> bool {
    true
}
fn default_local_max_paths() -> usize {
    16
}

impl Default for Sources {
    fn default() -> Self {
        Self {
            primary_url: "http://127.0.0.1:8080/quote".to_string(),
            secondary_url: None,
            request_timeout_seconds: default_request_timeout_seconds(),
            enable_local_fallback: default_true(),
            local_max_paths: default_local_max_paths(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Cache {
    #[serde(default = "default_cache_ttl_seconds")]
    pub ttl_seconds: u64,
    #[serde(default = "default_refresh_interval_seconds")]
    pub refresh_interval_seconds: u64,
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,
}

fn default_cache_ttl_seconds() -> u64 {
    10
}
fn default_refresh_interval_seconds() -> u64 {
    15
}
fn default_cache_max_entries() -> usize {
    1024
}

impl Default for Cache {
    fn default() -> Self {
        Self {
            ttl_seconds: default_cache_ttl_seconds(),
            refresh_interval_seconds: default_refresh_interval_seconds(),
            max_entries: default_cache_max_entries(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Retry {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

fn default_max_attempts() -> usize {
    3
}
fn default_backoff_base_ms() -> u64 {
    200
}
fn default_backoff_max_ms() -> u64 {
    5000
}

impl Default for Retry {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Freshness {
    #[serde(default = "default_max_quote_age_blocks")]
    pub max_quote_age_blocks: u64,
}

fn default_max_quote_age_blocks() -> u64 {
    10
}

impl Default for Freshness {
    fn default() -> Self {
        Self {
            max_quote_age_blocks: default_max_quote_age_blocks(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Slippage {
    #[serde(default = "default_slippage_bps")]
    pub default_bps: u32,
    /// Tolerance the auto mode uses when a market-conditions heuristic has
    /// produced one; absent means fall back to `default_bps`.
    #[serde(default)]
    pub auto_heuristic_bps: Option<u32>,
}

fn default_slippage_bps() -> u32 {
    50
}

impl Default for Slippage {
    fn default() -> Self {
        Self {
            default_bps: default_slippage_bps(),
            auto_heuristic_bps: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Chain {
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
}

fn default_chain_id() -> u64 {
    42161 // Arbitrum One
}

impl Default for Chain {
    fn default() -> Self {
        Self {
            chain_id: default_chain_id(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub sources: Sources,
    #[serde(default)]
    pub cache: Cache,
    #[serde(default)]
    pub retry: Retry,
    #[serde(default)]
    pub freshness: Freshness,
    #[serde(default)]
    pub slippage: Slippage,
    #[serde(default)]
    pub chain: Chain,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name("Config.toml").required(false))
            .build()?;

        let mut settings: Self = s.try_deserialize()?;

        // Environment variable overrides for the source endpoints
        if let Ok(url) = env::var("SWAP_SDK_PRIMARY_URL") {
            if !url.trim().is_empty() {
                settings.sources.primary_url = url.trim().to_string();
            }
        }
        if let Ok(url) = env::var("SWAP_SDK_SECONDARY_URL") {
            let trimmed = url.trim();
            if !trimmed.is_empty() {
                settings.sources.secondary_url = Some(trimmed.to_string());
            }
        }

        Ok(settings)
    }
}
