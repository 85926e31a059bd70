//! Ledger access: JSON-RPC with endpoint fallback, pool balance lookup, result caching.

pub(crate) mod balance;
pub(crate) mod cache;
pub(crate) mod rpc;

pub use balance::{
    first_account_amount, BalanceError, BalanceFetcher, RawBalance, TokenAccountQuery,
    GET_TOKEN_ACCOUNTS_BY_OWNER,
};
pub use cache::{CacheError, CacheStore, MemoryStore, ResultCache, SqliteStore, StoredBlob};
pub use rpc::{
    parse_response, HttpReply, HttpTransport, RpcClient, RpcError, RpcTransport,
    DEFAULT_TIMEOUT_SECS,
};
