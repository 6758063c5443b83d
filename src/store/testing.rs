//! Test doubles for [`Store`].

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};
use crate::store::{Command, MemoryStore, ScanPage, SetOptions, Store, TxEntry};

/// Store whose every call fails at the transport level.
pub struct DownStore;

fn down() -> StoreError {
    StoreError::Connection("connection refused".to_string())
}

#[async_trait]
impl Store for DownStore {
    async fn get(&self, _: &str) -> StoreResult<Option<String>> {
        Err(down())
    }
    async fn set(&self, _: &str, _: &str, _: SetOptions) -> StoreResult<bool> {
        Err(down())
    }
    async fn set_ex(&self, _: &str, _: &str, _: u64) -> StoreResult<()> {
        Err(down())
    }
    async fn del(&self, _: &[String]) -> StoreResult<u64> {
        Err(down())
    }
    async fn pttl(&self, _: &str) -> StoreResult<i64> {
        Err(down())
    }
    async fn scan(&self, _: Option<&str>, _: &str, _: usize) -> StoreResult<ScanPage> {
        Err(down())
    }
    async fn exec(&self, _: Vec<Command>) -> StoreResult<Vec<TxEntry>> {
        Err(down())
    }
    async fn del_if_eq(&self, _: &str, _: &str) -> StoreResult<bool> {
        Err(down())
    }
}

/// In-memory store whose `del` starts failing after `allowed` calls.
/// Every other method behaves like [`MemoryStore`].
pub struct FailingDelStore {
    pub inner: MemoryStore,
    allowed: AtomicUsize,
}

impl FailingDelStore {
    pub fn new(allowed: usize) -> Self {
        Self {
            inner: MemoryStore::new(),
            allowed: AtomicUsize::new(allowed),
        }
    }
}

#[async_trait]
impl Store for FailingDelStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.inner.get(key).await
    }
    async fn set(&self, key: &str, value: &str, options: SetOptions) -> StoreResult<bool> {
        self.inner.set(key, value, options).await
    }
    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> StoreResult<()> {
        self.inner.set_ex(key, value, ttl_seconds).await
    }
    async fn del(&self, keys: &[String]) -> StoreResult<u64> {
        let remaining = self
            .allowed
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match remaining {
            Ok(_) => self.inner.del(keys).await,
            Err(_) => Err(down()),
        }
    }
    async fn pttl(&self, key: &str) -> StoreResult<i64> {
        self.inner.pttl(key).await
    }
    async fn scan(&self, cursor: Option<&str>, pattern: &str, count: usize) -> StoreResult<ScanPage> {
        self.inner.scan(cursor, pattern, count).await
    }
    async fn exec(&self, commands: Vec<Command>) -> StoreResult<Vec<TxEntry>> {
        self.inner.exec(commands).await
    }
    async fn del_if_eq(&self, key: &str, expected: &str) -> StoreResult<bool> {
        self.inner.del_if_eq(key, expected).await
    }
}
