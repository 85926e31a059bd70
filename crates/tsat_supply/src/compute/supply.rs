//! Circulating supply: total issuance minus the pool-locked balance, clamped at zero.

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// `max(0, total - locked)`. A pool momentarily holding more than total supply yields 0.
pub fn circulating_supply(total_supply: u64, locked: u64) -> u64 {
    total_supply.saturating_sub(locked)
}

/// Served payload. `error`/`fallback` are present only on the degraded path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyResult {
    pub circulating_supply: u64,
    pub total_supply: u64,
    pub locked_in_pool: u64,
    pub timestamp: i64,
    pub last_updated: String,
    pub pool_address: String,
    pub tsat_token: String,
    pub rpc_provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<bool>,
}

impl SupplyResult {
    pub fn computed(
        total_supply: u64,
        locked_in_pool: u64,
        pool_address: &str,
        tsat_token: &str,
        rpc_provider: &str,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            circulating_supply: circulating_supply(total_supply, locked_in_pool),
            total_supply,
            locked_in_pool,
            timestamp: now.unix_timestamp(),
            last_updated: rfc3339(now),
            pool_address: pool_address.to_string(),
            tsat_token: tsat_token.to_string(),
            rpc_provider: rpc_provider.to_string(),
            error: None,
            fallback: None,
        }
    }

    /// Degraded answer: the whole supply is treated as locked, so circulating is 0.
    pub fn fallback(
        total_supply: u64,
        pool_address: &str,
        tsat_token: &str,
        rpc_provider: &str,
        error: &str,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            error: Some(error.to_string()),
            fallback: Some(true),
            ..Self::computed(
                total_supply,
                total_supply,
                pool_address,
                tsat_token,
                rpc_provider,
                now,
            )
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback.unwrap_or(false)
    }
}

fn rfc3339(now: OffsetDateTime) -> String {
    now.format(&Rfc3339).unwrap_or_default()
}
