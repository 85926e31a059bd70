//! Deployment constants for the supply computation.

use std::time::Duration;

pub const DEFAULT_DECIMALS: u32 = 9;
pub const DEFAULT_TOTAL_SUPPLY: u64 = 21_000_000_000_000;
pub const DEFAULT_CACHE_KEY: &str = "tsat_circulating_supply";
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;
pub const DEFAULT_FALLBACK_TTL_SECS: u64 = 60;

/// Which pool to inspect and how to turn its balance into a supply figure.
#[derive(Clone, Debug)]
pub struct SupplySettings {
    /// Owner of the escrowed token account (the pool).
    pub pool_address: String,
    pub token_mint: String,
    pub decimals: u32,
    /// Total issuance in whole tokens.
    pub total_supply: u64,
    pub cache_key: String,
    pub cache_ttl: Duration,
    /// Upper bound on how long a degraded (fallback) result is served from cache.
    pub fallback_ttl: Duration,
}

impl SupplySettings {
    pub fn new(pool_address: impl Into<String>, token_mint: impl Into<String>) -> Self {
        Self {
            pool_address: pool_address.into(),
            token_mint: token_mint.into(),
            decimals: DEFAULT_DECIMALS,
            total_supply: DEFAULT_TOTAL_SUPPLY,
            cache_key: DEFAULT_CACHE_KEY.to_string(),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            fallback_ttl: Duration::from_secs(DEFAULT_FALLBACK_TTL_SECS),
        }
    }
}
