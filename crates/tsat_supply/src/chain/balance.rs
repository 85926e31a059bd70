//! Pool token balance via `getTokenAccountsByOwner`.

use crate::chain::rpc::{RpcClient, RpcError, RpcTransport};
use crate::config::Configuration;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

pub const GET_TOKEN_ACCOUNTS_BY_OWNER: &str = "getTokenAccountsByOwner";

#[derive(Error, Debug)]
pub enum BalanceError {
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error("invalid token amount: {0}")]
    InvalidAmount(String),
}

/// Which holder's balance of which mint to read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenAccountQuery {
    pub owner: String,
    pub mint: String,
}

impl TokenAccountQuery {
    pub fn new(owner: impl Into<String>, mint: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            mint: mint.into(),
        }
    }

    pub fn params(&self) -> Value {
        serde_json::json!([
            self.owner,
            { "mint": self.mint },
            { "encoding": "jsonParsed" }
        ])
    }
}

/// Amount in the token's smallest unit plus its decimals exponent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawBalance {
    pub amount: u64,
    pub decimals: u32,
}

impl RawBalance {
    pub fn new(amount: u64, decimals: u32) -> Self {
        Self { amount, decimals }
    }

    /// floor(amount / 10^decimals). Zero once 10^decimals exceeds u64.
    pub fn whole_units(&self) -> u64 {
        10u64
            .checked_pow(self.decimals)
            .map_or(0, |divisor| self.amount / divisor)
    }
}

/// Raw amount of the first token account in a `getTokenAccountsByOwner` result.
/// `Ok(None)` when there is no account or the balance field is absent.
pub fn first_account_amount(result: &Value) -> Result<Option<u64>, BalanceError> {
    let Some(first) = result
        .get("value")
        .and_then(Value::as_array)
        .and_then(|accounts| accounts.first())
    else {
        return Ok(None);
    };
    let amount = first
        .get("account")
        .and_then(|a| a.get("data"))
        .and_then(|d| d.get("parsed"))
        .and_then(|p| p.get("info"))
        .and_then(|i| i.get("tokenAmount"))
        .and_then(|t| t.get("amount"));
    match amount {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| BalanceError::InvalidAmount(s.clone())),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| BalanceError::InvalidAmount(n.to_string())),
        Some(other) => Err(BalanceError::InvalidAmount(other.to_string())),
    }
}

/// Reads the pool's locked balance through an [`RpcClient`].
pub struct BalanceFetcher<'a, T> {
    rpc: &'a RpcClient<T>,
}

impl<'a, T: RpcTransport> BalanceFetcher<'a, T> {
    pub fn new(rpc: &'a RpcClient<T>) -> Self {
        Self { rpc }
    }

    /// Locked balance in whole tokens. A missing pool token account counts as nothing locked.
    pub async fn fetch_locked_balance(
        &self,
        query: &TokenAccountQuery,
        decimals: u32,
        config: &Configuration,
    ) -> Result<u64, BalanceError> {
        let result = self
            .rpc
            .call(GET_TOKEN_ACCOUNTS_BY_OWNER, query.params(), config)
            .await?;
        let Some(amount) = first_account_amount(&result)? else {
            debug!(owner = %query.owner, mint = %query.mint, "no token account, treating as 0 locked");
            return Ok(0);
        };
        let locked = RawBalance::new(amount, decimals).whole_units();
        info!(raw = amount, decimals, locked, "pool balance fetched");
        Ok(locked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::rpc::mock::ScriptedTransport;

    const RPC: &str = "https://rpc.example";

    fn accounts(amounts: &[&str]) -> Value {
        let value: Vec<Value> = amounts
            .iter()
            .map(|a| {
                serde_json::json!({
                    "pubkey": "Acct111",
                    "account": {"data": {"parsed": {"info": {"tokenAmount": {"amount": a}}}}}
                })
            })
            .collect();
        serde_json::json!({"context": {"slot": 1}, "value": value})
    }

    #[test]
    fn whole_units_truncates() {
        assert_eq!(RawBalance::new(12345, 2).whole_units(), 123);
        assert_eq!(RawBalance::new(199, 2).whole_units(), 1);
        assert_eq!(RawBalance::new(42, 0).whole_units(), 42);
        assert_eq!(RawBalance::new(u64::MAX, 25).whole_units(), 0);
    }

    #[test]
    fn query_params_shape() {
        let p = TokenAccountQuery::new("Pool", "Mint").params();
        assert_eq!(p[0], "Pool");
        assert_eq!(p[1]["mint"], "Mint");
        assert_eq!(p[2]["encoding"], "jsonParsed");
    }

    #[test]
    fn first_account_only() {
        assert_eq!(first_account_amount(&accounts(&["500", "900"])).unwrap(), Some(500));
    }

    #[test]
    fn empty_or_missing_is_none() {
        assert_eq!(first_account_amount(&accounts(&[])).unwrap(), None);
        assert_eq!(first_account_amount(&Value::Null).unwrap(), None);
        let no_amount = serde_json::json!({"value": [{"account": {"data": "base64"}}]});
        assert_eq!(first_account_amount(&no_amount).unwrap(), None);
    }

    #[test]
    fn bad_amount_is_error() {
        assert!(matches!(
            first_account_amount(&accounts(&["12.5"])),
            Err(BalanceError::InvalidAmount(_))
        ));
    }

    #[tokio::test]
    async fn fetch_converts_first_account() {
        let rpc = RpcClient::new(ScriptedTransport::default().result(RPC, accounts(&["500"])));
        let locked = BalanceFetcher::new(&rpc)
            .fetch_locked_balance(
                &TokenAccountQuery::new("Pool", "Mint"),
                2,
                &Configuration::new(RPC),
            )
            .await
            .unwrap();
        assert_eq!(locked, 5);
    }

    #[tokio::test]
    async fn fetch_empty_result_set_is_zero() {
        let rpc = RpcClient::new(ScriptedTransport::default().result(RPC, accounts(&[])));
        let locked = BalanceFetcher::new(&rpc)
            .fetch_locked_balance(
                &TokenAccountQuery::new("Pool", "Mint"),
                6,
                &Configuration::new(RPC),
            )
            .await
            .unwrap();
        assert_eq!(locked, 0);
    }
}
