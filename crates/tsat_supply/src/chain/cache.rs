//! Result cache with TTL over a pluggable blob store (SQLite, or in-memory for tests).

use crate::compute::SupplyResult;
use rusqlite::{Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialize: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A stored payload and the time the store recorded it (Unix seconds).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredBlob {
    pub value: Vec<u8>,
    pub written_utc: i64,
}

/// Keyed blob storage. The write timestamp is supplied by the store.
pub trait CacheStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<StoredBlob>, CacheError>;
    fn store(&self, key: &str, value: &[u8], written_utc: i64) -> Result<(), CacheError>;
}

fn lock_poisoned(e: impl std::fmt::Display) -> CacheError {
    CacheError::Io(std::io::Error::other(e.to_string()))
}

/// SQLite-backed store, one row per key.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the store at `path`. Creates parent dirs if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cache (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL,
                created_utc INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl CacheStore for SqliteStore {
    fn load(&self, key: &str) -> Result<Option<StoredBlob>, CacheError> {
        let conn = self.conn.lock().map_err(lock_poisoned)?;
        let mut stmt = conn.prepare("SELECT value, created_utc FROM cache WHERE key = ?1")?;
        let row = stmt
            .query_row([key], |r| {
                Ok(StoredBlob {
                    value: r.get(0)?,
                    written_utc: r.get(1)?,
                })
            })
            .optional()?;
        Ok(row)
    }

    fn store(&self, key: &str, value: &[u8], written_utc: i64) -> Result<(), CacheError> {
        let conn = self.conn.lock().map_err(lock_poisoned)?;
        conn.execute(
            "INSERT OR REPLACE INTO cache (key, value, created_utc) VALUES (?1, ?2, ?3)",
            rusqlite::params![key, value, written_utc],
        )?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, StoredBlob>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<StoredBlob>, CacheError> {
        let entries = self.entries.lock().map_err(lock_poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn store(&self, key: &str, value: &[u8], written_utc: i64) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().map_err(lock_poisoned)?;
        entries.insert(
            key.to_string(),
            StoredBlob {
                value: value.to_vec(),
                written_utc,
            },
        );
        Ok(())
    }
}

/// Last computed [`SupplyResult`] per key. Reads never fail: store errors and
/// corrupt payloads are treated as a miss.
pub struct ResultCache<S> {
    store: S,
    fallback_ttl: Duration,
}

impl<S: CacheStore> ResultCache<S> {
    pub fn new(store: S, fallback_ttl: Duration) -> Self {
        Self {
            store,
            fallback_ttl,
        }
    }

    /// Store key for a logical cache key: SHA-256 hex.
    pub fn key_for(content: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn get(&self, key: &str, ttl: Duration) -> Option<SupplyResult> {
        self.get_at(key, ttl, OffsetDateTime::now_utc())
    }

    /// Entry is fresh while `now - written < ttl`; fallback entries use `min(ttl, fallback_ttl)`.
    pub fn get_at(&self, key: &str, ttl: Duration, now: OffsetDateTime) -> Option<SupplyResult> {
        let blob = match self.store.load(&Self::key_for(key)) {
            Ok(Some(blob)) => blob,
            Ok(None) => {
                debug!(key, "cache miss");
                return None;
            }
            Err(e) => {
                warn!(key, error = %e, "cache read failed, treating as miss");
                return None;
            }
        };
        let result: SupplyResult = match serde_json::from_slice(&blob.value) {
            Ok(r) => r,
            Err(e) => {
                warn!(key, error = %e, "corrupt cache payload, treating as miss");
                return None;
            }
        };
        let ttl = if result.is_fallback() {
            ttl.min(self.fallback_ttl)
        } else {
            ttl
        };
        let age = now.unix_timestamp().saturating_sub(blob.written_utc);
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        if age < ttl_secs {
            debug!(key, age, "cache hit");
            Some(result)
        } else {
            debug!(key, age, "cache entry stale");
            None
        }
    }

    pub fn put(&self, key: &str, result: &SupplyResult) -> Result<(), CacheError> {
        self.put_at(key, result, OffsetDateTime::now_utc())
    }

    /// Unconditional last-writer-wins.
    pub fn put_at(
        &self,
        key: &str,
        result: &SupplyResult,
        now: OffsetDateTime,
    ) -> Result<(), CacheError> {
        let json = serde_json::to_vec(result)?;
        self.store
            .store(&Self::key_for(key), &json, now.unix_timestamp())
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;

    /// Store whose disk is gone: every read and write fails with an I/O error.
    #[derive(Default)]
    pub(crate) struct BrokenStore;

    fn unavailable() -> CacheError {
        CacheError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "cache volume unavailable",
        ))
    }

    impl CacheStore for BrokenStore {
        fn load(&self, _key: &str) -> Result<Option<StoredBlob>, CacheError> {
            Err(unavailable())
        }

        fn store(&self, _key: &str, _value: &[u8], _written_utc: i64) -> Result<(), CacheError> {
            Err(unavailable())
        }
    }
}
