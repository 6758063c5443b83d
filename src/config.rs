//! Configuration Module
//!
//! Handles loading server and primitive settings from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::DEFAULT_SCAN_BATCH;
use crate::lock::LockConfig;

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Background expiry sweep interval in seconds
    pub cleanup_interval: u64,
    /// TTL in seconds for cache namespaces created by the server
    pub cache_default_ttl: u64,
    /// Keys examined per scan page during invalidation
    pub scan_batch_size: usize,
    /// Extra lock attempts after the first one
    pub lock_retry_count: u32,
    /// Base wait between lock attempts in milliseconds
    pub lock_retry_delay_ms: u64,
    /// Upper bound of the random extra wait in milliseconds
    pub lock_retry_jitter_ms: u64,
    /// Buffer added to a measured debounce window in milliseconds
    pub debounce_skew_ms: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Expiry sweep frequency in seconds (default: 1)
    /// - `CACHE_DEFAULT_TTL` - Namespace TTL in seconds (default: 300)
    /// - `SCAN_BATCH_SIZE` - Invalidation scan page size (default: 100)
    /// - `LOCK_RETRY_COUNT` - Lock retries (default: 3)
    /// - `LOCK_RETRY_DELAY_MS` - Lock retry delay (default: 200)
    /// - `LOCK_RETRY_JITTER_MS` - Lock retry jitter (default: 200)
    /// - `DEBOUNCE_SKEW_MS` - Debounce skew (default: 25)
    ///
    /// Unset or unparsable values fall back to the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a Config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            server_port: parse_or(lookup("SERVER_PORT"), defaults.server_port),
            cleanup_interval: parse_or(lookup("CLEANUP_INTERVAL"), defaults.cleanup_interval),
            cache_default_ttl: parse_or(lookup("CACHE_DEFAULT_TTL"), defaults.cache_default_ttl),
            scan_batch_size: parse_or(lookup("SCAN_BATCH_SIZE"), defaults.scan_batch_size),
            lock_retry_count: parse_or(lookup("LOCK_RETRY_COUNT"), defaults.lock_retry_count),
            lock_retry_delay_ms: parse_or(
                lookup("LOCK_RETRY_DELAY_MS"),
                defaults.lock_retry_delay_ms,
            ),
            lock_retry_jitter_ms: parse_or(
                lookup("LOCK_RETRY_JITTER_MS"),
                defaults.lock_retry_jitter_ms,
            ),
            debounce_skew_ms: parse_or(lookup("DEBOUNCE_SKEW_MS"), defaults.debounce_skew_ms),
        }
    }

    /// Lock retry settings derived from this config.
    pub fn lock_config(&self) -> LockConfig {
        LockConfig {
            retry_count: self.lock_retry_count,
            retry_delay: Duration::from_millis(self.lock_retry_delay_ms),
            retry_jitter: Duration::from_millis(self.lock_retry_jitter_ms),
            ..LockConfig::default()
        }
    }

    pub fn debounce_skew(&self) -> Duration {
        Duration::from_millis(self.debounce_skew_ms)
    }

    /// Sweep period, never shorter than one second.
    pub fn cleanup_period(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval.max(1))
    }
}

fn parse_or<T: FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            cleanup_interval: 1,
            cache_default_ttl: 300,
            scan_batch_size: DEFAULT_SCAN_BATCH,
            lock_retry_count: 3,
            lock_retry_delay_ms: 200,
            lock_retry_jitter_ms: 200,
            debounce_skew_ms: 25,
        }
    }
}
