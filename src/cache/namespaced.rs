//! Namespaced Cache Module
//!
//! A cache that owns one key prefix in a shared store and can drop every
//! key under that prefix in one call.

use std::sync::Arc;

use tracing::{debug, info};

use crate::cache::{DEFAULT_SCAN_BATCH, KEY_TERMINATOR};
use crate::error::{CoordError, Result};
use crate::store::{glob, KeyScan, Store};

// == Namespaced Cache ==
/// Cache over a single namespace of a shared [`Store`].
///
/// Physical keys are `prefix + KEY_TERMINATOR + key`. The prefix may not
/// contain the terminator, so `"a"` and `"a-other"` never see each other's
/// keys and invalidating one never touches the other.
pub struct NamespacedCache<S: Store + ?Sized> {
    store: Arc<S>,
    prefix: String,
    ttl_seconds: u64,
    batch_size: usize,
}

impl<S: Store + ?Sized> Clone for NamespacedCache<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            prefix: self.prefix.clone(),
            ttl_seconds: self.ttl_seconds,
            batch_size: self.batch_size,
        }
    }
}

impl<S: Store + ?Sized> NamespacedCache<S> {
    // == Constructor ==
    /// Creates a cache over `prefix` with a default TTL in seconds.
    ///
    /// # Errors
    /// `Validation` if the prefix is empty or contains the terminator, or
    /// the TTL is zero.
    pub fn new(store: Arc<S>, prefix: impl Into<String>, ttl_seconds: u64) -> Result<Self> {
        let prefix = prefix.into();
        if prefix.is_empty() {
            return Err(CoordError::validation("prefix must be a string with length"));
        }
        if prefix.contains(KEY_TERMINATOR) {
            return Err(CoordError::validation(format!(
                "prefix must not contain '{}'",
                KEY_TERMINATOR
            )));
        }
        if ttl_seconds == 0 {
            return Err(CoordError::validation("ttl_seconds must be greater than 0"));
        }

        Ok(Self {
            store,
            prefix,
            ttl_seconds,
            batch_size: DEFAULT_SCAN_BATCH,
        })
    }

    /// Sets how many keys each invalidation scan page examines.
    pub fn with_batch_size(mut self, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(CoordError::validation("batch_size must be greater than 0"));
        }
        self.batch_size = batch_size;
        Ok(self)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    /// Physical store key for `key` in this namespace.
    pub fn key_for(&self, key: &str) -> String {
        format!("{}{}{}", self.prefix, KEY_TERMINATOR, key)
    }

    // == Set ==
    /// Stores `value` under `key`, expiring after `ttl_seconds` if given,
    /// otherwise after the namespace default. Overwrites any prior value.
    pub async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> Result<()> {
        validate_key(key)?;
        if value.is_empty() {
            return Err(CoordError::validation("value must be a string with length"));
        }
        if ttl_seconds == Some(0) {
            return Err(CoordError::validation("ttl must be a positive integer"));
        }

        let ttl = ttl_seconds.unwrap_or(self.ttl_seconds);
        self.store.set_ex(&self.key_for(key), value, ttl).await?;
        debug!(prefix = %self.prefix, key, ttl, "cache set");
        Ok(())
    }

    // == Get ==
    /// Returns the value for `key`, or `None` if absent or expired.
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        validate_key(key)?;
        Ok(self.store.get(&self.key_for(key)).await?)
    }

    // == Delete ==
    /// Removes `key`; absent keys are ignored.
    pub async fn del(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        self.store.del(&[self.key_for(key)]).await?;
        Ok(())
    }

    // == Invalidate ==
    /// Removes every key in this namespace and no other.
    ///
    /// Pages are fetched one at a time and each page is deleted before the
    /// next is requested, so at most one delete is in flight whatever the
    /// namespace size. Returns the number of keys removed.
    pub async fn invalidate(&self) -> Result<u64> {
        let pattern = format!("{}{}*", glob::escape(&self.prefix), KEY_TERMINATOR);
        let mut scan = KeyScan::new(self.store.as_ref(), pattern, self.batch_size);

        let mut removed = 0;
        while let Some(batch) = scan.next_batch().await? {
            removed += self.store.del(&batch).await?;
        }

        info!(prefix = %self.prefix, removed, "cache namespace invalidated");
        Ok(removed)
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CoordError::validation("key must be a string with length"));
    }
    Ok(())
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::testing::{DownStore, FailingDelStore};
    use crate::store::MemoryStore;
    use std::time::Duration;

    fn cache(store: &Arc<MemoryStore>, prefix: &str, ttl: u64) -> NamespacedCache<MemoryStore> {
        NamespacedCache::new(Arc::clone(store), prefix, ttl).unwrap()
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let store = Arc::new(MemoryStore::new());
        let cached = cache(&store, "something", 10);

        cached.set("foo", "bar", None).await.unwrap();
        assert_eq!(cached.get("foo").await.unwrap(), Some("bar".to_string()));
        assert_eq!(
            store.get("something:~:foo").await.unwrap(),
            Some("bar".to_string())
        );
    }

    #[tokio::test]
    async fn test_honors_prefix() {
        let store = Arc::new(MemoryStore::new());
        let cached = cache(&store, "something", 10);
        let other = cache(&store, "something-else", 10);

        cached.set("foo", "bar", None).await.unwrap();
        assert_eq!(other.get("foo").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expires_after_namespace_ttl() {
        let store = Arc::new(MemoryStore::new());
        let cached = cache(&store, "something", 1);

        cached.set("foo", "bar", None).await.unwrap();
        tokio::time::advance(Duration::from_millis(1400)).await;
        assert_eq!(cached.get("foo").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_override_ttl_applies_to_one_entry() {
        let store = Arc::new(MemoryStore::new());
        let cached = cache(&store, "ns", 1);

        cached.set("short", "v", None).await.unwrap();
        cached.set("long", "v", Some(5)).await.unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(cached.get("short").await.unwrap(), None);
        assert_eq!(cached.get("long").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn test_del() {
        let store = Arc::new(MemoryStore::new());
        let cached = cache(&store, "ns", 10);

        cached.set("k", "v", None).await.unwrap();
        cached.del("k").await.unwrap();
        assert_eq!(cached.get("k").await.unwrap(), None);

        // absent key is a no-op
        cached.del("k").await.unwrap();
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let store = Arc::new(MemoryStore::new());
        let cached = cache(&store, "ns", 10);

        assert!(matches!(
            cached.set("", "v", None).await,
            Err(CoordError::Validation(_))
        ));
        assert!(matches!(
            cached.set("k", "", None).await,
            Err(CoordError::Validation(_))
        ));
        assert!(matches!(
            cached.set("k", "v", Some(0)).await,
            Err(CoordError::Validation(_))
        ));
        assert!(matches!(cached.get("").await, Err(CoordError::Validation(_))));
        assert!(matches!(cached.del("").await, Err(CoordError::Validation(_))));

        // nothing reached the store
        assert!(store.is_empty().await);
    }

    #[test]
    fn test_constructor_validation() {
        let store = Arc::new(MemoryStore::new());

        assert!(NamespacedCache::new(Arc::clone(&store), "", 10).is_err());
        assert!(NamespacedCache::new(Arc::clone(&store), "a:~:b", 10).is_err());
        assert!(NamespacedCache::new(Arc::clone(&store), "a", 0).is_err());
        assert!(NamespacedCache::new(Arc::clone(&store), "a", 1)
            .unwrap()
            .with_batch_size(0)
            .is_err());
    }

    #[tokio::test]
    async fn test_invalidate_only_touches_own_namespace() {
        let store = Arc::new(MemoryStore::new());
        let a = cache(&store, "a", 60).with_batch_size(3).unwrap();
        let b = cache(&store, "a-other", 60);

        for i in 0..20 {
            a.set(&format!("k{i}"), "va", None).await.unwrap();
            b.set(&format!("k{i}"), "vb", None).await.unwrap();
        }
        store.set_ex("unrelated", "v", 60).await.unwrap();

        let removed = a.invalidate().await.unwrap();
        assert_eq!(removed, 20);

        for i in 0..20 {
            let key = format!("k{i}");
            assert_eq!(a.get(&key).await.unwrap(), None);
            assert_eq!(b.get(&key).await.unwrap(), Some("vb".to_string()));
        }
        assert!(store.get("unrelated").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_invalidate_with_glob_characters_in_prefix() {
        let store = Arc::new(MemoryStore::new());
        let star = cache(&store, "ns*", 60);
        let plain = cache(&store, "nsX", 60);

        star.set("k", "v", None).await.unwrap();
        plain.set("k", "v", None).await.unwrap();

        assert_eq!(star.invalidate().await.unwrap(), 1);
        assert_eq!(plain.get("k").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn test_invalidate_empty_namespace() {
        let store = Arc::new(MemoryStore::new());
        assert_eq!(cache(&store, "empty", 60).invalidate().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_store_failures_propagate() {
        let cached = NamespacedCache::new(Arc::new(DownStore), "ns", 10).unwrap();

        assert!(matches!(
            cached.set("k", "v", None).await,
            Err(CoordError::Store(StoreError::Connection(_)))
        ));
        assert!(matches!(cached.get("k").await, Err(CoordError::Store(_))));
        assert!(matches!(cached.del("k").await, Err(CoordError::Store(_))));
        assert!(matches!(cached.invalidate().await, Err(CoordError::Store(_))));
    }

    #[tokio::test]
    async fn test_invalidate_stops_at_first_delete_error() {
        let store = Arc::new(FailingDelStore::new(2));
        let cached = NamespacedCache::new(Arc::clone(&store), "ns", 60)
            .unwrap()
            .with_batch_size(2)
            .unwrap();
        for i in 0..10 {
            cached.set(&format!("k{i}"), "v", None).await.unwrap();
        }

        // Two batches go through, the third delete fails
        let result = cached.invalidate().await;
        assert!(matches!(result, Err(CoordError::Store(StoreError::Connection(_)))));
        assert_eq!(store.inner.len().await, 6);
    }

    #[tokio::test]
    async fn test_huge_override_ttl_is_an_error() {
        let store = Arc::new(MemoryStore::new());
        let cached = cache(&store, "ns", 10);

        let result = cached.set("k", "v", Some(u64::MAX)).await;
        assert!(matches!(result, Err(CoordError::Store(StoreError::Protocol(_)))));
        assert_eq!(cached.get("k").await.unwrap(), None);
    }
}
