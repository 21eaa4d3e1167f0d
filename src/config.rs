use std::collections::{HashMap, HashSet};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_USD_ASSETS: &str = "USD,USDC,USDT,DAI";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Period of the display tick.
    pub tick_interval: Duration,
    /// How long an exchange rate stays fresh.
    pub rate_cache_ttl_secs: i64,
    /// Backoff budget for transient history fetch failures.
    pub history_retry_max: Duration,
    /// Asset symbols priced 1:1 against USD.
    pub usd_assets: HashSet<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(1_000),
            rate_cache_ttl_secs: 30,
            history_retry_max: Duration::from_millis(10_000),
            usd_assets: parse_asset_list(DEFAULT_USD_ASSETS),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let tick_interval_ms = parse_u64(&env_map, "ACCRUAL_TICK_INTERVAL_MS", 1_000)?;
        if tick_interval_ms < 50 {
            return Err(ConfigError::InvalidValue(
                "ACCRUAL_TICK_INTERVAL_MS".to_string(),
                "must be at least 50".to_string(),
            ));
        }

        let rate_cache_ttl_secs = env_map
            .get("ACCRUAL_RATE_CACHE_TTL_SECS")
            .map(|s| s.as_str())
            .unwrap_or("30")
            .parse::<i64>()
            .ok()
            .filter(|ttl| *ttl >= 0)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "ACCRUAL_RATE_CACHE_TTL_SECS".to_string(),
                    "must be a non-negative integer".to_string(),
                )
            })?;

        let history_retry_max_ms = parse_u64(&env_map, "ACCRUAL_HISTORY_RETRY_MAX_MS", 10_000)?;

        let usd_assets = parse_asset_list(
            env_map
                .get("ACCRUAL_USD_ASSETS")
                .map(|s| s.as_str())
                .unwrap_or(DEFAULT_USD_ASSETS),
        );

        Ok(EngineConfig {
            tick_interval: Duration::from_millis(tick_interval_ms),
            rate_cache_ttl_secs,
            history_retry_max: Duration::from_millis(history_retry_max_ms),
            usd_assets,
        })
    }

    /// Whether `symbol` is treated as USD without a price lookup.
    pub fn is_usd_asset(&self, symbol: &str) -> bool {
        self.usd_assets.contains(&symbol.to_ascii_uppercase())
    }
}

fn parse_u64(env_map: &HashMap<String, String>, key: &str, default: u64) -> Result<u64, ConfigError> {
    match env_map.get(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
            ConfigError::InvalidValue(key.to_string(), "must be a valid u64".to_string())
        }),
    }
}

fn parse_asset_list(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(|s| s.trim().to_ascii_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}
