//! Request DTOs for the coordination server API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;

/// Longest key accepted over HTTP
const MAX_KEY_LEN: usize = 256;

/// Request body for a namespaced cache write (PUT /cache/:ns)
///
/// # Fields
/// - `key`: The key within the namespace
/// - `value`: The value to store
/// - `ttl`: Optional TTL in seconds (namespace default if not specified)
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSetRequest {
    /// The cache key
    pub key: String,
    /// The value to store
    pub value: String,
    /// Optional TTL in seconds
    #[serde(default)]
    pub ttl: Option<u64>,
}

impl CacheSetRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.key.is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        if self.key.len() > MAX_KEY_LEN {
            return Some(format!(
                "Key exceeds maximum length of {} characters",
                MAX_KEY_LEN
            ));
        }
        None
    }
}

/// Request body for lock acquisition (POST /lock/:resource)
#[derive(Debug, Clone, Deserialize)]
pub struct LockRequest {
    /// Lock lifetime in milliseconds
    pub ttl_ms: u64,
}

/// Request body for a debounce call (POST /debounce/:key)
#[derive(Debug, Clone, Deserialize)]
pub struct DebounceRequest {
    /// Quiescent window in milliseconds
    pub timeout_ms: u64,
    /// Optional skew in milliseconds (server default if not specified)
    #[serde(default)]
    pub skew_ms: Option<u64>,
}
