//! Memory Store Module
//!
//! In-process [`Store`] implementation: an ordered map with TTL expiry,
//! cursor scans and atomic transactions.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::store::glob;
use crate::store::{Command, Reply, ScanPage, SetOptions, Store, StoredValue, StoreStats, TxEntry};

const ERR_INVALID_EXPIRE: &str = "ERR invalid expire time";
const ERR_SYNTAX: &str = "ERR syntax error";

fn invalid_expire() -> StoreError {
    StoreError::Protocol(ERR_INVALID_EXPIRE.to_string())
}

// == Memory Store ==
/// Shared in-memory key-value store.
///
/// Expired keys are dropped lazily when touched and in bulk by
/// [`MemoryStore::purge_expired`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Keyspace>,
}

/// State guarded by the store mutex. Every method here runs with the lock
/// held, which is what makes single commands and transactions atomic.
#[derive(Debug, Default)]
struct Keyspace {
    entries: BTreeMap<String, StoredValue>,
    stats: StoreStats,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // == Stats ==
    /// Returns current store statistics.
    pub async fn stats(&self) -> StoreStats {
        let inner = self.inner.lock().await;
        let mut stats = inner.stats.clone();
        stats.set_total_keys(inner.entries.len());
        stats
    }

    // == Purge Expired ==
    /// Removes all expired keys, returning how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let mut inner = self.inner.lock().await;
        let now = Instant::now();
        let before = inner.entries.len();
        inner.entries.retain(|_, entry| !entry.is_expired_at(now));
        let removed = before - inner.entries.len();
        inner.stats.record_expired(removed);
        removed
    }

    // == Length ==
    /// Number of keys held, including expired keys not yet purged.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.entries.is_empty()
    }

    /// Drops every key.
    pub async fn flush(&self) {
        self.inner.lock().await.entries.clear();
    }
}

impl Keyspace {
    /// Returns the live entry for `key`, dropping it first if it expired.
    fn live(&mut self, key: &str) -> Option<&StoredValue> {
        let expired = self.entries.get(key)?.is_expired();
        if expired {
            self.entries.remove(key);
            self.stats.record_expired(1);
            return None;
        }
        self.entries.get(key)
    }

    fn get(&mut self, key: &str) -> Option<String> {
        let value = self.live(key).map(|entry| entry.value.clone());
        match value {
            Some(_) => self.stats.record_hit(),
            None => self.stats.record_miss(),
        }
        value
    }

    fn set(&mut self, key: &str, value: &str, options: &SetOptions) -> StoreResult<bool> {
        if options.expiry.is_some_and(|ttl| ttl.is_zero()) {
            return Err(invalid_expire());
        }
        if options.only_if_absent && self.live(key).is_some() {
            return Ok(false);
        }
        let entry = StoredValue::new(value.to_string(), options.expiry).ok_or_else(invalid_expire)?;
        self.entries.insert(key.to_string(), entry);
        Ok(true)
    }

    fn set_ex(&mut self, key: &str, value: &str, ttl_seconds: u64) -> StoreResult<()> {
        if ttl_seconds == 0 {
            return Err(invalid_expire());
        }
        let ttl = Duration::from_secs(ttl_seconds);
        let entry = StoredValue::new(value.to_string(), Some(ttl)).ok_or_else(invalid_expire)?;
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    fn del(&mut self, keys: &[String]) -> u64 {
        let mut removed = 0;
        for key in keys {
            if self.live(key).is_some() {
                self.entries.remove(key);
                removed += 1;
            }
        }
        removed
    }

    fn pttl(&mut self, key: &str) -> i64 {
        match self.live(key) {
            None => -2,
            Some(entry) => match entry.pttl_at(Instant::now()) {
                None => -1,
                Some(ms) => ms as i64,
            },
        }
    }

    fn scan(&self, cursor: Option<&str>, pattern: &str, count: usize) -> StoreResult<ScanPage> {
        if count == 0 {
            return Err(StoreError::Protocol(ERR_SYNTAX.to_string()));
        }
        let now = Instant::now();
        let lower = match cursor {
            Some(c) => Bound::Excluded(c),
            None => Bound::Unbounded,
        };

        let mut keys = Vec::new();
        let mut last = None;
        for (key, entry) in self
            .entries
            .range::<str, _>((lower, Bound::Unbounded))
            .take(count)
        {
            last = Some(key.as_str());
            if !entry.is_expired_at(now) && glob::matches(pattern, key) {
                keys.push(key.clone());
            }
        }

        let cursor = last.filter(|last| {
            self.entries
                .range::<str, _>((Bound::Excluded(*last), Bound::Unbounded))
                .next()
                .is_some()
        });

        Ok(ScanPage {
            cursor: cursor.map(str::to_string),
            keys,
        })
    }

    fn del_if_eq(&mut self, key: &str, expected: &str) -> bool {
        let matches = self.live(key).is_some_and(|entry| entry.value == expected);
        if matches {
            self.entries.remove(key);
        }
        matches
    }

    /// Applies one queued command, reporting failures in its own slot.
    fn apply(&mut self, command: &Command) -> TxEntry {
        match command {
            Command::Get { key } => match self.get(key) {
                Some(value) => (None, Reply::Bulk(value)),
                None => (None, Reply::Nil),
            },
            Command::Set {
                key,
                value,
                options,
            } => match self.set(key, value, options) {
                Ok(true) => (None, Reply::Ok),
                Ok(false) => (None, Reply::Nil),
                Err(err) => (Some(err.to_string()), Reply::Nil),
            },
            Command::SetEx {
                key,
                value,
                ttl_seconds,
            } => match self.set_ex(key, value, *ttl_seconds) {
                Ok(()) => (None, Reply::Ok),
                Err(err) => (Some(err.to_string()), Reply::Nil),
            },
            Command::Del { keys } => (None, Reply::Int(self.del(keys) as i64)),
            Command::Pttl { key } => (None, Reply::Int(self.pttl(key))),
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.inner.lock().await.get(key))
    }

    async fn set(&self, key: &str, value: &str, options: SetOptions) -> StoreResult<bool> {
        self.inner.lock().await.set(key, value, &options)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> StoreResult<()> {
        self.inner.lock().await.set_ex(key, value, ttl_seconds)
    }

    async fn del(&self, keys: &[String]) -> StoreResult<u64> {
        Ok(self.inner.lock().await.del(keys))
    }

    async fn pttl(&self, key: &str) -> StoreResult<i64> {
        Ok(self.inner.lock().await.pttl(key))
    }

    async fn scan(
        &self,
        cursor: Option<&str>,
        pattern: &str,
        count: usize,
    ) -> StoreResult<ScanPage> {
        self.inner.lock().await.scan(cursor, pattern, count)
    }

    async fn exec(&self, commands: Vec<Command>) -> StoreResult<Vec<TxEntry>> {
        let mut inner = self.inner.lock().await;
        let results: Vec<TxEntry> = commands.iter().map(|cmd| inner.apply(cmd)).collect();
        debug!(commands = results.len(), "transaction executed");
        Ok(results)
    }

    async fn del_if_eq(&self, key: &str, expected: &str) -> StoreResult<bool> {
        Ok(self.inner.lock().await.del_if_eq(key, expected))
    }
}
