//! Request orchestration: cache check, config resolution, balance fetch, compute, cache write.
//!
//! Any failure while resolving config or fetching the balance degrades to a fallback
//! result (whole supply locked, circulating 0) which is cached briefly and served with 200.

mod response;

pub use response::{ResponseFormat, SupplyResponse, CONTENT_TYPE_JSON, CONTENT_TYPE_PLAIN};

use crate::chain::{
    BalanceError, BalanceFetcher, CacheStore, ResultCache, RpcClient, RpcTransport,
    TokenAccountQuery,
};
use crate::compute::SupplyResult;
use crate::config::{ConfigError, ConfigResolver, Configuration, SupplySettings};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{info, warn};

const UNKNOWN_PROVIDER: &str = "unknown";

/// Why a fresh computation failed. Collapses into the fallback response.
#[derive(Error, Debug)]
pub enum SupplyError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Balance(#[from] BalanceError),
}

pub struct RequestHandler<T, S> {
    resolver: ConfigResolver,
    rpc: RpcClient<T>,
    cache: ResultCache<S>,
    settings: SupplySettings,
}

impl<T: RpcTransport, S: CacheStore> RequestHandler<T, S> {
    pub fn new(
        resolver: ConfigResolver,
        rpc: RpcClient<T>,
        cache: ResultCache<S>,
        settings: SupplySettings,
    ) -> Self {
        Self {
            resolver,
            rpc,
            cache,
            settings,
        }
    }

    /// Full request cycle. Only GET is served; everything else is 405 before any other work.
    /// Method tokens are case-sensitive, so `get` is an unknown method.
    pub async fn handle(&self, method: &str, format: ResponseFormat) -> SupplyResponse {
        if method != "GET" {
            return SupplyResponse::method_not_allowed(format);
        }
        let result = self.current_supply().await;
        SupplyResponse::render(&result, format)
    }

    /// Cached result when fresh, else a freshly computed (or fallback) result, which is cached.
    pub async fn current_supply(&self) -> SupplyResult {
        let settings = &self.settings;
        if let Some(cached) = self.cache.get(&settings.cache_key, settings.cache_ttl) {
            return cached;
        }

        let (provider, outcome) = match self.resolver.resolve() {
            Ok(config) => (config.provider_label(), self.compute(&config).await),
            Err(e) => (UNKNOWN_PROVIDER.to_string(), Err(SupplyError::from(e))),
        };
        let now = OffsetDateTime::now_utc();
        let result = match outcome {
            Ok(locked) => {
                let result = SupplyResult::computed(
                    settings.total_supply,
                    locked,
                    &settings.pool_address,
                    &settings.token_mint,
                    &provider,
                    now,
                );
                info!(
                    circulating = result.circulating_supply,
                    locked,
                    %provider,
                    "circulating supply computed"
                );
                result
            }
            Err(e) => {
                warn!(error = %e, "supply computation failed, serving fallback");
                SupplyResult::fallback(
                    settings.total_supply,
                    &settings.pool_address,
                    &settings.token_mint,
                    &provider,
                    &e.to_string(),
                    now,
                )
            }
        };

        if let Err(e) = self.cache.put(&settings.cache_key, &result) {
            warn!(error = %e, "cache write failed");
        }
        result
    }

    async fn compute(&self, config: &Configuration) -> Result<u64, SupplyError> {
        let query = TokenAccountQuery::new(&self.settings.pool_address, &self.settings.token_mint);
        let locked = BalanceFetcher::new(&self.rpc)
            .fetch_locked_balance(&query, self.settings.decimals, config)
            .await?;
        Ok(locked)
    }

    pub fn rpc(&self) -> &RpcClient<T> {
        &self.rpc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::cache::mock::BrokenStore;
    use crate::chain::rpc::mock::ScriptedTransport;
    use crate::chain::MemoryStore;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;

    const PRIMARY: &str = "https://primary.example";
    const BACKUP: &str = "https://backup.example";

    struct Fixture {
        _dir: TempDir,
        config_path: PathBuf,
    }

    fn fixture(config: &str) -> Fixture {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("config.json");
        std::fs::write(&config_path, config).unwrap();
        Fixture {
            _dir: dir,
            config_path,
        }
    }

    fn default_config() -> Fixture {
        fixture(&format!(
            r#"{{"solana":{{"rpcUrl":"{}","fallbackRpcUrls":["{}"],"provider":"test-rpc"}}}}"#,
            PRIMARY, BACKUP
        ))
    }

    fn settings() -> SupplySettings {
        SupplySettings {
            decimals: 2,
            ..SupplySettings::new("PoolAddr", "MintAddr")
        }
    }

    fn pool_result(amount: &str) -> serde_json::Value {
        serde_json::json!({
            "context": {"slot": 1},
            "value": [{"account": {"data": {"parsed": {"info": {"tokenAmount": {"amount": amount}}}}}}]
        })
    }

    fn handler(
        fx: &Fixture,
        transport: ScriptedTransport,
    ) -> RequestHandler<ScriptedTransport, MemoryStore> {
        RequestHandler::new(
            ConfigResolver::new(vec![fx.config_path.clone()]),
            RpcClient::new(transport),
            ResultCache::new(MemoryStore::new(), Duration::from_secs(60)),
            settings(),
        )
    }

    #[tokio::test]
    async fn end_to_end_plain() {
        let fx = default_config();
        let h = handler(&fx, ScriptedTransport::default().result(PRIMARY, pool_result("500")));
        let res = h.handle("GET", ResponseFormat::Plain).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body, "20999999999995");
    }

    #[tokio::test]
    async fn end_to_end_json_uses_backup() {
        let fx = default_config();
        let h = handler(
            &fx,
            ScriptedTransport::default()
                .fail(PRIMARY, "timeout")
                .result(BACKUP, pool_result("500")),
        );
        let res = h.handle("GET", ResponseFormat::Json).await;
        assert_eq!(res.status, 200);
        let r: SupplyResult = serde_json::from_str(&res.body).unwrap();
        assert_eq!(r.locked_in_pool, 5);
        assert_eq!(r.circulating_supply, 20_999_999_999_995);
        assert_eq!(r.rpc_provider, "test-rpc");
        assert_eq!(r.pool_address, "PoolAddr");
        assert_eq!(r.tsat_token, "MintAddr");
        assert!(!r.is_fallback());
    }

    #[tokio::test]
    async fn cache_hit_skips_network() {
        let fx = default_config();
        let h = handler(&fx, ScriptedTransport::default().result(PRIMARY, pool_result("500")));
        let first = h.current_supply().await;
        let second = h.current_supply().await;
        assert_eq!(first, second);
        assert_eq!(h.rpc().transport().calls().len(), 1);
    }

    #[tokio::test]
    async fn all_endpoints_failing_serves_fallback() {
        let fx = default_config();
        let h = handler(
            &fx,
            ScriptedTransport::default()
                .reply(PRIMARY, 502, "bad gateway")
                .fail(BACKUP, "reset"),
        );
        let res = h.handle("GET", ResponseFormat::Json).await;
        assert_eq!(res.status, 200);
        let r: SupplyResult = serde_json::from_str(&res.body).unwrap();
        assert_eq!(r.fallback, Some(true));
        assert_eq!(r.circulating_supply, 0);
        assert_eq!(r.locked_in_pool, r.total_supply);
        assert!(r.error.unwrap().contains("reset"));

        // the degraded answer is cached too, so no further upstream calls
        let plain = h.handle("GET", ResponseFormat::Plain).await;
        assert_eq!((plain.status, plain.body.as_str()), (200, "0"));
        assert_eq!(h.rpc().transport().calls(), vec![PRIMARY, BACKUP]);
    }

    #[tokio::test]
    async fn missing_config_serves_fallback() {
        let dir = TempDir::new().unwrap();
        let h = RequestHandler::new(
            ConfigResolver::new(vec![dir.path().join("absent.json")]),
            RpcClient::new(ScriptedTransport::default()),
            ResultCache::new(MemoryStore::new(), Duration::from_secs(60)),
            settings(),
        );
        let r = h.current_supply().await;
        assert!(r.is_fallback());
        assert_eq!(r.rpc_provider, "unknown");
        assert!(r.error.unwrap().contains("no configuration file found"));
        assert!(h.rpc().transport().calls().is_empty());
    }

    #[tokio::test]
    async fn non_get_short_circuits() {
        let fx = default_config();
        let h = handler(&fx, ScriptedTransport::default().result(PRIMARY, pool_result("500")));
        let json = h.handle("POST", ResponseFormat::Json).await;
        assert_eq!(json.status, 405);
        assert_eq!(json.body, r#"{"error":"Method not allowed"}"#);
        let plain = h.handle("DELETE", ResponseFormat::Plain).await;
        assert_eq!((plain.status, plain.body.as_str()), (405, "Method not allowed"));
        assert!(h.rpc().transport().calls().is_empty());
    }

    #[tokio::test]
    async fn method_token_is_case_sensitive() {
        let fx = default_config();
        let h = handler(&fx, ScriptedTransport::default().result(PRIMARY, pool_result("500")));
        for method in ["get", "Get", "HEAD", "OPTIONS"] {
            assert_eq!(h.handle(method, ResponseFormat::Plain).await.status, 405, "{method}");
        }
        assert!(h.rpc().transport().calls().is_empty());
        assert_eq!(h.handle("GET", ResponseFormat::Plain).await.status, 200);
    }

    #[tokio::test]
    async fn empty_pool_means_nothing_locked() {
        let fx = default_config();
        let empty = serde_json::json!({"context": {"slot": 1}, "value": []});
        let h = handler(&fx, ScriptedTransport::default().result(PRIMARY, empty));
        let r = h.current_supply().await;
        assert_eq!(r.locked_in_pool, 0);
        assert_eq!(r.circulating_supply, r.total_supply);
        assert!(r.error.is_none());
    }

    #[tokio::test]
    async fn unreadable_cache_still_computes() {
        let fx = default_config();
        let h = RequestHandler::new(
            ConfigResolver::new(vec![fx.config_path.clone()]),
            RpcClient::new(ScriptedTransport::default().result(PRIMARY, pool_result("500"))),
            ResultCache::new(BrokenStore, Duration::from_secs(60)),
            settings(),
        );
        let r = h.current_supply().await;
        assert!(!r.is_fallback());
        assert_eq!(r.circulating_supply, 20_999_999_999_995);

        // nothing could be cached, so the next request goes upstream again
        let res = h.handle("GET", ResponseFormat::Plain).await;
        assert_eq!((res.status, res.body.as_str()), (200, "20999999999995"));
        assert_eq!(h.rpc().transport().calls(), vec![PRIMARY, PRIMARY]);
    }
}
