//! tsat_supply — circulating supply for TSAT.
//!
//! Circulating supply = total issuance minus the balance escrowed in the pool account,
//! read over Solana JSON-RPC with endpoint fallback and cached with a TTL.
//! Read-only; no keys; no transaction signing.

pub mod chain;
pub mod compute;
pub mod config;
pub mod handler;

pub use chain::{
    BalanceFetcher, CacheStore, HttpTransport, MemoryStore, RawBalance, ResultCache, RpcClient,
    RpcError, RpcTransport, SqliteStore, TokenAccountQuery,
};
pub use compute::{circulating_supply, SupplyResult};
pub use config::{ConfigError, ConfigResolver, Configuration, SupplySettings};
pub use handler::{RequestHandler, ResponseFormat, SupplyError, SupplyResponse};
