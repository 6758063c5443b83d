//! API Handlers
//!
//! HTTP request handlers for each coordination server endpoint.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::warn;

use crate::cache::NamespacedCache;
use crate::config::Config;
use crate::debounce::DebounceCoordinator;
use crate::error::{CoordError, Result};
use crate::lock::DistributedLock;
use crate::models::{
    CacheDeleteResponse, CacheGetResponse, CacheSetRequest, CacheSetResponse,
    DebounceCountResponse, DebounceRequest, DebounceResponse, HealthResponse, InvalidateResponse,
    LockRequest, LockResponse, ReleaseResponse, StatsResponse,
};
use crate::store::MemoryStore;

/// Most debounce keys whose firings are tracked at once
pub const MAX_TRACKED_DEBOUNCE_KEYS: usize = 10_000;

// == Fire Counts ==
/// Debounce callback firings per key.
///
/// Only keys whose callback actually ran take an entry. Once `capacity`
/// keys are tracked, firings for new keys are dropped.
#[derive(Debug)]
pub struct FireCounts {
    counts: Mutex<HashMap<String, u64>>,
    capacity: usize,
}

impl FireCounts {
    pub fn new(capacity: usize) -> Self {
        Self {
            counts: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    /// Counts one firing for `key`. Returns false if the key is untracked
    /// and the table is full.
    pub fn record(&self, key: &str) -> bool {
        let mut counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(count) = counts.get_mut(key) {
            *count += 1;
            return true;
        }
        if counts.len() >= self.capacity {
            return false;
        }
        counts.insert(key.to_string(), 1);
        true
    }

    pub fn get(&self, key: &str) -> u64 {
        self.counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.counts.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Application state shared across all handlers.
///
/// Every primitive works on the same in-memory store.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<MemoryStore>,
    pub lock: DistributedLock<MemoryStore>,
    pub debouncer: Arc<DebounceCoordinator<MemoryStore>>,
    pub fired: Arc<FireCounts>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Creates a new AppState over `store`.
    pub fn new(store: Arc<MemoryStore>, config: Config) -> Self {
        let lock = DistributedLock::single(Arc::clone(&store), config.lock_config());
        let debouncer = DebounceCoordinator::with_skew(Arc::clone(&store), config.debounce_skew());
        Self {
            store,
            lock,
            debouncer: Arc::new(debouncer),
            fired: Arc::new(FireCounts::new(MAX_TRACKED_DEBOUNCE_KEYS)),
            config: Arc::new(config),
        }
    }

    /// Creates a new AppState with a fresh store.
    pub fn from_config(config: &Config) -> Self {
        Self::new(Arc::new(MemoryStore::new()), config.clone())
    }

    fn cache(&self, namespace: &str) -> Result<NamespacedCache<MemoryStore>> {
        NamespacedCache::new(
            Arc::clone(&self.store),
            namespace,
            self.config.cache_default_ttl,
        )?
        .with_batch_size(self.config.scan_batch_size)
    }

    /// Number of times the debounce callback ran for `key`.
    pub fn fired(&self, key: &str) -> u64 {
        self.fired.get(key)
    }
}

// == Cache ==
/// Handler for PUT /cache/:ns
///
/// Stores a key-value pair in the namespace with optional TTL.
pub async fn cache_set_handler(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    Json(req): Json<CacheSetRequest>,
) -> Result<Json<CacheSetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CoordError::Validation(error_msg));
    }

    state
        .cache(&namespace)?
        .set(&req.key, &req.value, req.ttl)
        .await?;

    Ok(Json(CacheSetResponse::new(namespace, req.key)))
}

/// Handler for GET /cache/:ns/:key
pub async fn cache_get_handler(
    State(state): State<AppState>,
    Path((namespace, key)): Path<(String, String)>,
) -> Result<Json<CacheGetResponse>> {
    match state.cache(&namespace)?.get(&key).await? {
        Some(value) => Ok(Json(CacheGetResponse::new(namespace, key, value))),
        None => Err(CoordError::NotFound(format!(
            "Key '{}' not found in '{}'",
            key, namespace
        ))),
    }
}

/// Handler for DELETE /cache/:ns/:key
pub async fn cache_delete_handler(
    State(state): State<AppState>,
    Path((namespace, key)): Path<(String, String)>,
) -> Result<Json<CacheDeleteResponse>> {
    state.cache(&namespace)?.del(&key).await?;
    Ok(Json(CacheDeleteResponse::new(namespace, key)))
}

/// Handler for DELETE /cache/:ns
///
/// Removes every key in the namespace.
pub async fn cache_invalidate_handler(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> Result<Json<InvalidateResponse>> {
    let removed = state.cache(&namespace)?.invalidate().await?;
    Ok(Json(InvalidateResponse { namespace, removed }))
}

// == Lock ==
/// Handler for POST /lock/:resource
///
/// Answers 409 Conflict when the resource stays held by someone else.
pub async fn lock_handler(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    Json(req): Json<LockRequest>,
) -> Result<(StatusCode, Json<LockResponse>)> {
    match state.lock.lock(&resource, req.ttl_ms).await? {
        Some(lock) => {
            let body = LockResponse::acquired(
                lock.resource(),
                lock.token(),
                lock.validity().as_millis() as u64,
            );
            Ok((StatusCode::OK, Json(body)))
        }
        None => Ok((StatusCode::CONFLICT, Json(LockResponse::held_elsewhere(resource)))),
    }
}

/// Handler for DELETE /lock/:resource/:token
pub async fn unlock_handler(
    State(state): State<AppState>,
    Path((resource, token)): Path<(String, String)>,
) -> Result<Json<ReleaseResponse>> {
    let released = state.lock.release(&resource, &token).await?;
    if released == 0 {
        return Err(CoordError::NotFound(format!(
            "Lock '{}' is not held with that token",
            resource
        )));
    }
    Ok(Json(ReleaseResponse { resource, released }))
}

// == Debounce ==
/// Handler for POST /debounce/:key
///
/// The callback counts firings for the key, readable via GET.
pub async fn debounce_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<DebounceRequest>,
) -> Result<Json<DebounceResponse>> {
    let counts = Arc::clone(&state.fired);
    let fired_key = key.clone();
    let callback = move || {
        if !counts.record(&fired_key) {
            warn!(key = %fired_key, "debounce fire count table full, firing not counted");
        }
    };
    let skew = req
        .skew_ms
        .map_or(state.debouncer.default_skew(), Duration::from_millis);

    let outcome = state
        .debouncer
        .debounce(callback, &key, Duration::from_millis(req.timeout_ms), skew)
        .await?;

    Ok(Json(DebounceResponse::new(key, outcome)))
}

/// Handler for GET /debounce/:key
pub async fn debounce_count_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Json<DebounceCountResponse> {
    let fired = state.fired(&key);
    Json(DebounceCountResponse { key, fired })
}

// == Service ==
/// Handler for GET /stats
///
/// Returns current store statistics.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::from(state.store.stats().await))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
