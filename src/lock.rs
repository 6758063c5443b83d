//! Distributed Lock Module
//!
//! Quorum-based mutual exclusion over one or more independent stores.
//!
//! Each attempt writes a random token under the resource key with
//! `SET NX PX` on every store. The lock is held when a majority accepted
//! the write and enough of the TTL is left after accounting for the time
//! the round took and for clock drift. A failed attempt gives back what it
//! won before retrying.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{CoordError, Result, StoreError};
use crate::store::{SetOptions, Store};

/// Fixed drift allowance added on top of `ttl * drift_factor`
const CLOCK_DRIFT_FLOOR: Duration = Duration::from_millis(2);

// == Lock Config ==
/// Retry and drift settings for lock acquisition.
#[derive(Debug, Clone)]
pub struct LockConfig {
    /// Extra attempts after the first one
    pub retry_count: u32,
    /// Base wait between attempts
    pub retry_delay: Duration,
    /// Upper bound of the random wait added to `retry_delay`
    pub retry_jitter: Duration,
    /// Fraction of the TTL assumed lost to clock drift between stores
    pub drift_factor: f64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            retry_count: 3,
            retry_delay: Duration::from_millis(200),
            retry_jitter: Duration::from_millis(200),
            drift_factor: 0.01,
        }
    }
}

impl LockConfig {
    /// Single attempt, no retries.
    pub fn no_retry() -> Self {
        Self {
            retry_count: 0,
            ..Self::default()
        }
    }
}

/// Outcome of one acquisition round across all stores.
enum Attempt {
    Acquired { validity: Duration },
    Denied {
        conflicts: usize,
        error: Option<StoreError>,
    },
}

// == Distributed Lock ==
/// Lock manager over a fixed set of stores.
pub struct DistributedLock<S: Store + ?Sized> {
    stores: Vec<Arc<S>>,
    config: LockConfig,
    quorum: usize,
}

impl<S: Store + ?Sized> Clone for DistributedLock<S> {
    fn clone(&self) -> Self {
        Self {
            stores: self.stores.clone(),
            config: self.config.clone(),
            quorum: self.quorum,
        }
    }
}

impl<S: Store + ?Sized> DistributedLock<S> {
    // == Constructor ==
    /// Creates a lock manager over `stores`.
    ///
    /// # Errors
    /// `Validation` if no store is given.
    pub fn new(stores: Vec<Arc<S>>, config: LockConfig) -> Result<Self> {
        if stores.is_empty() {
            return Err(CoordError::validation("at least one store is required"));
        }
        let quorum = stores.len() / 2 + 1;
        Ok(Self {
            stores,
            config,
            quorum,
        })
    }

    /// Lock manager over a single store.
    pub fn single(store: Arc<S>, config: LockConfig) -> Self {
        Self {
            stores: vec![store],
            config,
            quorum: 1,
        }
    }

    /// Number of stores that must accept a write for the lock to be held.
    pub fn quorum(&self) -> usize {
        self.quorum
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    // == Lock ==
    /// Tries to acquire `resource` for `ttl_ms` milliseconds.
    ///
    /// Returns `Ok(None)` when the resource is still held by someone else
    /// once retries are exhausted. Store failures propagate when they,
    /// rather than conflicts, are what kept the final attempt from a quorum.
    pub async fn lock(&self, resource: &str, ttl_ms: u64) -> Result<Option<Lock<S>>> {
        if resource.is_empty() {
            return Err(CoordError::validation("resource must be a string with length"));
        }
        if ttl_ms == 0 {
            return Err(CoordError::validation("ttl must be a positive integer"));
        }

        let ttl = Duration::from_millis(ttl_ms);
        if ttl <= self.drift(ttl) {
            return Err(CoordError::validation(
                "ttl must exceed the clock drift allowance",
            ));
        }

        let token = Uuid::new_v4().to_string();
        let mut attempt = 0;

        loop {
            match self.try_once(resource, &token, ttl).await {
                Attempt::Acquired { validity } => {
                    info!(
                        resource,
                        attempt,
                        validity_ms = validity.as_millis() as u64,
                        "lock acquired"
                    );
                    return Ok(Some(Lock {
                        stores: self.stores.clone(),
                        resource: resource.to_string(),
                        token,
                        validity,
                        acquired_at: Instant::now(),
                    }));
                }
                Attempt::Denied { conflicts, error } => {
                    if attempt >= self.config.retry_count {
                        let held_elsewhere = conflicts > self.stores.len() - self.quorum;
                        return match error {
                            Some(err) if !held_elsewhere => Err(err.into()),
                            _ => {
                                debug!(resource, attempts = attempt + 1, "lock not acquired");
                                Ok(None)
                            }
                        };
                    }
                }
            }

            attempt += 1;
            tokio::time::sleep(self.retry_wait()).await;
        }
    }

    // == Release ==
    /// Releases `resource` if it is still held with `token`.
    ///
    /// Returns the number of stores the token was removed from.
    pub async fn release(&self, resource: &str, token: &str) -> Result<usize> {
        release_on(&self.stores, resource, token).await
    }

    async fn try_once(&self, resource: &str, token: &str, ttl: Duration) -> Attempt {
        let start = Instant::now();
        let mut votes = 0;
        let mut conflicts = 0;
        let mut error = None;

        for store in &self.stores {
            match store.set(resource, token, SetOptions::nx().px(ttl)).await {
                Ok(true) => votes += 1,
                Ok(false) => conflicts += 1,
                Err(err) => {
                    warn!(resource, error = %err, "lock write failed on store");
                    error = Some(err);
                }
            }
        }

        let validity = ttl
            .checked_sub(start.elapsed() + self.drift(ttl))
            .filter(|v| !v.is_zero());

        match validity {
            Some(validity) if votes >= self.quorum => Attempt::Acquired { validity },
            _ => {
                if votes > 0 {
                    if let Err(err) = release_on(&self.stores, resource, token).await {
                        warn!(resource, error = %err, "failed to roll back partial lock");
                    }
                }
                Attempt::Denied { conflicts, error }
            }
        }
    }

    /// Share of `ttl` assumed lost to clock drift between stores.
    fn drift(&self, ttl: Duration) -> Duration {
        ttl.mul_f64(self.config.drift_factor) + CLOCK_DRIFT_FLOOR
    }

    fn retry_wait(&self) -> Duration {
        let jitter_ms = self.config.retry_jitter.as_millis() as u64;
        let extra = if jitter_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..=jitter_ms)
        };
        self.config.retry_delay + Duration::from_millis(extra)
    }
}

/// Compare-and-delete `token` on every store. All stores are tried; the
/// first error is returned afterwards.
async fn release_on<S: Store + ?Sized>(
    stores: &[Arc<S>],
    resource: &str,
    token: &str,
) -> Result<usize> {
    let mut released = 0;
    let mut first_error = None;

    for store in stores {
        match store.del_if_eq(resource, token).await {
            Ok(true) => released += 1,
            Ok(false) => {}
            Err(err) => {
                warn!(resource, error = %err, "lock release failed on store");
                first_error.get_or_insert(err);
            }
        }
    }

    match first_error {
        Some(err) => Err(err.into()),
        None => Ok(released),
    }
}

// == Lock Handle ==
/// A held lock. Consumed by [`Lock::unlock`], so it is released at most once.
///
/// Dropping the handle without unlocking leaves the lock to expire.
#[must_use = "the lock is held until unlocked or until its TTL elapses"]
pub struct Lock<S: Store + ?Sized> {
    stores: Vec<Arc<S>>,
    resource: String,
    token: String,
    validity: Duration,
    acquired_at: Instant,
}

impl<S: Store + ?Sized> Lock<S> {
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Random value identifying this holder in the stores.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// How long the lock was guaranteed to be held when acquired.
    pub fn validity(&self) -> Duration {
        self.validity
    }

    /// True once the validity window has elapsed.
    pub fn is_expired(&self) -> bool {
        self.acquired_at.elapsed() >= self.validity
    }

    // == Unlock ==
    /// Releases the lock early. A lock that already expired, or was taken
    /// over after expiring, is left alone.
    ///
    /// Returns the number of stores the token was removed from.
    pub async fn unlock(self) -> Result<usize> {
        let released = release_on(&self.stores, &self.resource, &self.token).await?;
        debug!(resource = %self.resource, released, "lock released");
        Ok(released)
    }
}

impl<S: Store + ?Sized> fmt::Debug for Lock<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lock")
            .field("resource", &self.resource)
            .field("token", &self.token)
            .field("validity", &self.validity)
            .finish()
    }
}
