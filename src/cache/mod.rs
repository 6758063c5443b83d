//! Cache Module
//!
//! Namespaced caching over a shared store with bulk invalidation.

mod namespaced;


pub use namespaced::NamespacedCache;

// == Public Constants ==
/// Separates a namespace prefix from the caller's key in physical keys.
///
/// Contains no glob metacharacters, so `prefix + KEY_TERMINATOR + "*"` is
/// an exact scan pattern for one namespace.
pub const KEY_TERMINATOR: &str = ":~:";

/// Keys examined per scan page during invalidation
pub const DEFAULT_SCAN_BATCH: usize = 100;
