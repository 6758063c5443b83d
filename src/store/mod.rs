//! Store Module
//!
//! The key-value capability every coordination primitive is built on, plus
//! an in-memory implementation used by the bundled server and by tests.

mod entry;
pub mod glob;
mod memory;
mod multi;
mod stats;

#[cfg(test)]
pub(crate) mod testing;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreResult;

pub use entry::StoredValue;
pub use memory::MemoryStore;
pub use multi::{process_exact, process_multi_results};
pub use stats::StoreStats;

// == Replies ==
/// A single reply value, as returned inside a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Absent value, or a conditional write that did not happen
    Nil,
    /// Simple acknowledgement
    Ok,
    /// Integer reply (counts, remaining TTLs)
    Int(i64),
    /// String payload
    Bulk(String),
}

impl Reply {
    /// Returns the integer payload, if this is an integer reply.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Reply::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Reply::Nil)
    }
}

/// One `(error, value)` slot of a transaction result.
pub type TxEntry = (Option<String>, Reply);

// == Set Options ==
/// Modifiers for [`Store::set`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Only write when the key does not currently exist (NX)
    pub only_if_absent: bool,
    /// Expiry applied with the write (PX)
    pub expiry: Option<Duration>,
}

impl SetOptions {
    /// Conditional write: succeeds only if the key is absent.
    pub fn nx() -> Self {
        Self {
            only_if_absent: true,
            expiry: None,
        }
    }

    /// Attaches an expiry to the write.
    pub fn px(mut self, expiry: Duration) -> Self {
        self.expiry = Some(expiry);
        self
    }
}

// == Commands ==
/// A command that can be queued inside an atomic transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Get { key: String },
    Set { key: String, value: String, options: SetOptions },
    SetEx { key: String, value: String, ttl_seconds: u64 },
    Del { keys: Vec<String> },
    Pttl { key: String },
}

// == Scan Page ==
/// One page of a cursor scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Cursor to resume from; `None` once the keyspace is exhausted
    pub cursor: Option<String>,
    /// Matching keys found in this page (possibly empty)
    pub keys: Vec<String>,
}

// == Store Trait ==
/// Capabilities required from the shared key-value store.
///
/// Every method is a single round trip. Implementations must make each
/// method atomic on its own, and [`Store::exec`] atomic as a whole.
#[async_trait]
pub trait Store: Send + Sync {
    /// Returns the value stored under `key`, or `None` if absent/expired.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Writes `value` under `key`. Returns `false` when an NX write lost.
    async fn set(&self, key: &str, value: &str, options: SetOptions) -> StoreResult<bool>;

    /// Writes `value` under `key` with an expiry in whole seconds.
    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> StoreResult<()>;

    /// Deletes every given key, returning how many existed.
    async fn del(&self, keys: &[String]) -> StoreResult<u64>;

    /// Remaining lifetime in milliseconds: `-2` if absent, `-1` if no expiry.
    async fn pttl(&self, key: &str) -> StoreResult<i64>;

    /// Examines up to `count` keys after `cursor`, returning those matching
    /// the glob `pattern`.
    async fn scan(&self, cursor: Option<&str>, pattern: &str, count: usize)
        -> StoreResult<ScanPage>;

    /// Runs `commands` as one atomic unit, one result slot per command.
    async fn exec(&self, commands: Vec<Command>) -> StoreResult<Vec<TxEntry>>;

    /// Deletes `key` only if it currently holds `expected`.
    async fn del_if_eq(&self, key: &str, expected: &str) -> StoreResult<bool>;
}

// == Key Scan ==
/// Pull-based batch sequence over the keys matching a pattern.
///
/// The next page is only requested when the caller asks for it, so work
/// done on a batch naturally throttles the scan. The sequence is finite and
/// can be restarted from the beginning.
pub struct KeyScan<'a, S: Store + ?Sized> {
    store: &'a S,
    pattern: String,
    count: usize,
    cursor: Option<String>,
    finished: bool,
}

impl<'a, S: Store + ?Sized> KeyScan<'a, S> {
    pub fn new(store: &'a S, pattern: impl Into<String>, count: usize) -> Self {
        Self {
            store,
            pattern: pattern.into(),
            count,
            cursor: None,
            finished: false,
        }
    }

    /// Fetches the next batch, or `None` once the scan reached its end.
    ///
    /// Pages with no matching keys are skipped.
    pub async fn next_batch(&mut self) -> StoreResult<Option<Vec<String>>> {
        while !self.finished {
            let page = self
                .store
                .scan(self.cursor.as_deref(), &self.pattern, self.count)
                .await?;
            self.finished = page.cursor.is_none();
            self.cursor = page.cursor;
            if !page.keys.is_empty() {
                return Ok(Some(page.keys));
            }
        }
        Ok(None)
    }

    /// Rewinds the scan to the start of the keyspace.
    pub fn restart(&mut self) {
        self.cursor = None;
        self.finished = false;
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}
