//! Key-value store interface and implementations.
//!
//! The store is the collaborator the record mapper talks to. It speaks in
//! batches: one call is one round trip, whether it writes many entries,
//! reads many keys or removes many keys. Two implementations are provided:
//! an in-memory store with a controllable clock for tests, and a redb-based
//! store for persistence.

pub mod deadline;
pub mod memory;
pub mod redb;

use std::fmt;
use std::time::Duration;

use thiserror::Error;

pub use deadline::Deadline;

/// Errors that can occur in KV store operations.
#[derive(Error, Debug)]
pub enum KVError {
    #[error("kv: deadline exceeded")]
    DeadlineExceeded,

    #[error("kv: store closed")]
    Closed,

    #[error("kv: invalid argument: {0}")]
    InvalidArgument(String),

    #[error("kv: storage error: {0}")]
    Storage(String),
}

/// Result type for KV operations.
pub type KVResult<T> = Result<T, KVError>;

/// Key-value store trait.
///
/// Keys are strings and values are opaque bytes. Every multi-key operation
/// is a single request to the backend; implementations must keep the
/// position of each key in the request aligned with its result.
pub trait KVStore: Send + Sync {
    /// Liveness check.
    fn ping(&self) -> KVResult<()>;

    /// Write all entries in one request. No expiry is attached, and any
    /// expiry previously set on the written keys is cleared.
    fn mset(&self, entries: &[(&str, &[u8])], deadline: Deadline) -> KVResult<()>;

    /// Write each entry with its own expiry, all submitted together.
    fn set_ex_pipeline(
        &self,
        entries: &[(&str, &[u8], Duration)],
        deadline: Deadline,
    ) -> KVResult<()>;

    /// Read all keys in one request. `None` marks an absent key.
    fn mget(&self, keys: &[&str], deadline: Deadline) -> KVResult<Vec<Option<Vec<u8>>>>;

    /// Delete all keys in one request and return how many existed.
    /// Absent keys are not an error.
    fn mdel(&self, keys: &[&str], deadline: Deadline) -> KVResult<usize>;

    /// Release the backend. Subsequent calls fail with [`KVError::Closed`].
    fn close(&self) -> KVResult<()> {
        Ok(())
    }
}

impl fmt::Debug for dyn KVStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KVStore {{ ... }}")
    }
}

/// Rejects empty requests the way Redis rejects `MSET`/`MGET`/`DEL` with
/// no arguments.
pub(crate) fn require_non_empty(op: &str, len: usize) -> KVResult<()> {
    if len == 0 {
        return Err(KVError::InvalidArgument(format!(
            "wrong number of arguments for '{op}'"
        )));
    }
    Ok(())
}

// Re-export the implementations
pub use self::memory::MemoryStore;
pub use self::redb::RedbStore;
