//! KV Coord - Coordination primitives over a shared TTL key-value store
//!
//! Provides namespaced caching with bulk invalidation, a quorum lock and a
//! cross-process debouncer, plus an in-memory store and HTTP front end.

pub mod api;
pub mod cache;
pub mod config;
pub mod debounce;
pub mod error;
pub mod lock;
pub mod models;
pub mod search;
pub mod store;
pub mod tasks;

pub use api::AppState;
pub use cache::NamespacedCache;
pub use config::Config;
pub use debounce::{DebounceCoordinator, DebounceOutcome};
pub use error::{CoordError, Result, StoreError};
pub use lock::{DistributedLock, Lock, LockConfig};
pub use store::{process_multi_results, MemoryStore, Store};
pub use tasks::spawn_cleanup_task;
