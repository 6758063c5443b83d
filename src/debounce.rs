//! Debounce Module
//!
//! Collapses bursts of calls, from this process and from others sharing the
//! same store, into at most one callback per quiescent window.
//!
//! A window is a key written with `SET NX PX timeout`: the call whose write
//! lands runs its callback, every other call arms a local retry timer that
//! tries the same conditional write once the window should have closed.
//! Local timers only exist to wake this process up; the store alone decides
//! who wins.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::error::{CoordError, Result, StoreError};
use crate::store::{process_exact, Command, Reply, SetOptions, Store};

/// Value written under a debounce key while its window is open
const WINDOW_MARKER: &str = "1";

/// Added to the remaining window before a retry fires
pub const DEFAULT_SKEW: Duration = Duration::from_millis(25);

// == Outcome ==
/// What a single debounce call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceOutcome {
    /// This call opened the window and ran the callback
    Fired,
    /// A window was already open; a local retry was armed
    Scheduled { retry_in: Duration },
}

/// An armed retry timer. `generation` tells a firing timer whether it is
/// still the current one for its key.
struct PendingRetry {
    generation: u64,
    handle: JoinHandle<()>,
}

type Timers = HashMap<String, PendingRetry>;

fn lock_timers(timers: &Mutex<Timers>) -> MutexGuard<'_, Timers> {
    timers.lock().unwrap_or_else(PoisonError::into_inner)
}

// == Retry Delay ==
/// Delay before retrying a lost window.
///
/// A negative remaining TTL means the key had no readable expiry; the
/// timeout is used as is. Otherwise the retry waits for the remaining
/// window plus `skew`, and never less than one full `timeout`.
pub fn retry_delay(remaining_ms: i64, timeout: Duration, skew: Duration) -> Duration {
    if remaining_ms < 0 {
        return timeout;
    }
    (Duration::from_millis(remaining_ms as u64) + skew).max(timeout)
}

// == Debounce Coordinator ==
/// Per-process debounce state over a shared store.
///
/// Owns the map of armed retry timers. A newer call for a key replaces this
/// process's pending retry for that key and never touches other processes'.
/// Dropping the coordinator disarms all of its timers.
pub struct DebounceCoordinator<S: Store + ?Sized + 'static> {
    store: Arc<S>,
    timers: Arc<Mutex<Timers>>,
    generation: AtomicU64,
    default_skew: Duration,
}

impl<S: Store + ?Sized + 'static> DebounceCoordinator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_skew(store, DEFAULT_SKEW)
    }

    /// Coordinator whose [`debounce_with_default_skew`](Self::debounce_with_default_skew)
    /// uses `skew`.
    pub fn with_skew(store: Arc<S>, skew: Duration) -> Self {
        Self {
            store,
            timers: Arc::new(Mutex::new(HashMap::new())),
            generation: AtomicU64::new(0),
            default_skew: skew,
        }
    }

    pub fn default_skew(&self) -> Duration {
        self.default_skew
    }

    /// Number of retry timers currently armed.
    pub fn pending(&self) -> usize {
        lock_timers(&self.timers).len()
    }

    /// Disarms the retry timer for `key`. Returns false if none was armed.
    pub fn cancel(&self, key: &str) -> bool {
        match lock_timers(&self.timers).remove(key) {
            Some(pending) => {
                pending.handle.abort();
                true
            }
            None => false,
        }
    }

    pub async fn debounce_with_default_skew<F>(
        &self,
        callback: F,
        key: &str,
        timeout: Duration,
    ) -> Result<DebounceOutcome>
    where
        F: FnOnce() + Send + 'static,
    {
        self.debounce(callback, key, timeout, self.default_skew).await
    }

    // == Debounce ==
    /// Runs `callback` now if no window is open for `key`, otherwise arms a
    /// local retry that runs it if a later conditional write wins.
    ///
    /// # Errors
    /// `Validation` for an empty key or zero timeout; store failures
    /// propagate. Losing the race is not an error.
    pub async fn debounce<F>(
        &self,
        callback: F,
        key: &str,
        timeout: Duration,
        skew: Duration,
    ) -> Result<DebounceOutcome>
    where
        F: FnOnce() + Send + 'static,
    {
        if key.is_empty() {
            return Err(CoordError::validation("key must be a string with length"));
        }
        if timeout.is_zero() {
            return Err(CoordError::validation("timeout must be greater than 0"));
        }

        self.cancel(key);

        let results = self
            .store
            .exec(vec![
                Command::Pttl {
                    key: key.to_string(),
                },
                Command::Set {
                    key: key.to_string(),
                    value: WINDOW_MARKER.to_string(),
                    options: SetOptions::nx().px(timeout),
                },
            ])
            .await?;
        let replies = process_exact(results, 2)?;

        let remaining = replies[0].as_int().ok_or_else(|| {
            StoreError::Protocol(format!("expected integer TTL, got {:?}", replies[0]))
        })?;
        let won = match &replies[1] {
            Reply::Ok => true,
            Reply::Nil => false,
            other => {
                return Err(StoreError::Protocol(format!("unexpected SET reply {other:?}")).into())
            }
        };

        if won {
            debug!(key, "debounce window opened, firing");
            callback();
            return Ok(DebounceOutcome::Fired);
        }

        let delay = retry_delay(remaining, timeout, skew);
        self.schedule(key, callback, delay, timeout);
        debug!(key, remaining, delay_ms = delay.as_millis() as u64, "debounce retry armed");
        Ok(DebounceOutcome::Scheduled { retry_in: delay })
    }

    /// Arms the retry for `key`, replacing any timer already armed.
    fn schedule<F>(&self, key: &str, callback: F, delay: Duration, timeout: Duration)
    where
        F: FnOnce() + Send + 'static,
    {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let store = Arc::clone(&self.store);
        let timers = Arc::clone(&self.timers);
        let task_key = key.to_string();

        // The map stays locked until the new entry is in, so the task can
        // never look for its entry before it exists.
        let mut map = lock_timers(&self.timers);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            // Detach before touching the store: from here on a newer call
            // races this retry in the store instead of aborting it.
            {
                let mut map = lock_timers(&timers);
                let current = map.get(&task_key).map(|p| p.generation) == Some(generation);
                if !current {
                    return;
                }
                map.remove(&task_key);
            }

            let options = SetOptions::nx().px(timeout);
            match store.set(&task_key, WINDOW_MARKER, options).await {
                Ok(true) => {
                    debug!(key = %task_key, "debounce retry won window, firing");
                    callback();
                }
                Ok(false) => debug!(key = %task_key, "debounce retry lost window"),
                Err(err) => error!(key = %task_key, error = %err, "debounce retry failed"),
            }
        });

        if let Some(previous) = map.insert(key.to_string(), PendingRetry { generation, handle }) {
            previous.handle.abort();
        }
    }
}

impl<S: Store + ?Sized + 'static> Drop for DebounceCoordinator<S> {
    fn drop(&mut self) {
        for (_, pending) in lock_timers(&self.timers).drain() {
            pending.handle.abort();
        }
    }
}
