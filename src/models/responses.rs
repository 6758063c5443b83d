//! Response DTOs for the coordination server API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::debounce::DebounceOutcome;
use crate::store::StoreStats;

/// Response body for a cache read (GET /cache/:ns/:key)
#[derive(Debug, Clone, Serialize)]
pub struct CacheGetResponse {
    pub namespace: String,
    pub key: String,
    pub value: String,
}

impl CacheGetResponse {
    pub fn new(namespace: impl Into<String>, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Response body for a cache write (PUT /cache/:ns)
#[derive(Debug, Clone, Serialize)]
pub struct CacheSetResponse {
    /// Success message
    pub message: String,
    pub namespace: String,
    pub key: String,
}

impl CacheSetResponse {
    pub fn new(namespace: impl Into<String>, key: impl Into<String>) -> Self {
        let namespace = namespace.into();
        let key = key.into();
        Self {
            message: format!("Key '{}' set in '{}'", key, namespace),
            namespace,
            key,
        }
    }
}

/// Response body for a cache delete (DELETE /cache/:ns/:key)
#[derive(Debug, Clone, Serialize)]
pub struct CacheDeleteResponse {
    /// Success message
    pub message: String,
    pub namespace: String,
    pub key: String,
}

impl CacheDeleteResponse {
    pub fn new(namespace: impl Into<String>, key: impl Into<String>) -> Self {
        let namespace = namespace.into();
        let key = key.into();
        Self {
            message: format!("Key '{}' deleted from '{}'", key, namespace),
            namespace,
            key,
        }
    }
}

/// Response body for namespace invalidation (POST /cache/:ns/invalidate)
#[derive(Debug, Clone, Serialize)]
pub struct InvalidateResponse {
    pub namespace: String,
    /// Number of keys removed
    pub removed: u64,
}

/// Response body for lock acquisition (POST /lock/:resource)
///
/// `token` and `validity_ms` are only present when the lock was acquired.
#[derive(Debug, Clone, Serialize)]
pub struct LockResponse {
    pub resource: String,
    pub acquired: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validity_ms: Option<u64>,
}

impl LockResponse {
    pub fn acquired(resource: impl Into<String>, token: impl Into<String>, validity_ms: u64) -> Self {
        Self {
            resource: resource.into(),
            acquired: true,
            token: Some(token.into()),
            validity_ms: Some(validity_ms),
        }
    }

    pub fn held_elsewhere(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            acquired: false,
            token: None,
            validity_ms: None,
        }
    }
}

/// Response body for lock release (DELETE /lock/:resource/:token)
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseResponse {
    pub resource: String,
    /// Number of stores the token was removed from
    pub released: usize,
}

/// Response body for a debounce call (POST /debounce/:key)
#[derive(Debug, Clone, Serialize)]
pub struct DebounceResponse {
    pub key: String,
    /// `"fired"` or `"scheduled"`
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_in_ms: Option<u64>,
}

impl DebounceResponse {
    pub fn new(key: impl Into<String>, outcome: DebounceOutcome) -> Self {
        let key = key.into();
        match outcome {
            DebounceOutcome::Fired => Self {
                key,
                outcome: "fired",
                retry_in_ms: None,
            },
            DebounceOutcome::Scheduled { retry_in } => Self {
                key,
                outcome: "scheduled",
                retry_in_ms: Some(retry_in.as_millis() as u64),
            },
        }
    }
}

/// Response body for the debounce counter (GET /debounce/:key)
#[derive(Debug, Clone, Serialize)]
pub struct DebounceCountResponse {
    pub key: String,
    /// Number of times the callback ran for this key
    pub fired: u64,
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Number of reads that found a value
    pub hits: u64,
    /// Number of reads that found nothing
    pub misses: u64,
    /// Number of keys removed by expiry
    pub expired: u64,
    /// Current number of keys in the store
    pub total_keys: usize,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl From<StoreStats> for StatsResponse {
    fn from(stats: StoreStats) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            hits: stats.hits,
            misses: stats.misses,
            expired: stats.expired,
            total_keys: stats.total_keys,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
