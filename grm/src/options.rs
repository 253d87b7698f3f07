use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use grm_kv::{Deadline, KVStore, MemoryStore, RedbStore};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Connection options for [`DB::open`](crate::DB::open).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Options {
    #[serde(default)]
    pub backend: Backend,
}

/// Which store a handle connects to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Backend {
    /// Process-local store. Contents vanish with the handle.
    #[default]
    Memory,

    /// Embedded redb database file, created if missing.
    Redb { path: PathBuf },
}

impl Options {
    pub fn memory() -> Self {
        Self {
            backend: Backend::Memory,
        }
    }

    pub fn redb(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: Backend::Redb { path: path.into() },
        }
    }

    pub(crate) fn connect(&self) -> Result<Arc<dyn KVStore>> {
        Ok(match &self.backend {
            Backend::Memory => Arc::new(MemoryStore::new()),
            Backend::Redb { path } => Arc::new(RedbStore::open(path)?),
        })
    }
}

/// Per-call options for writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Expire every written record after this long. `None` or zero writes
    /// without expiry.
    pub ttl: Option<Duration>,
    pub deadline: Deadline,
}

impl SetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_deadline(mut self, at: Instant) -> Self {
        self.deadline = Deadline::at(at);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Deadline::after(timeout);
        self
    }

    pub(crate) fn expiry(&self) -> Option<Duration> {
        self.ttl.filter(|ttl| !ttl.is_zero())
    }
}

/// Per-call options for reads and deletes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallOptions {
    pub deadline: Deadline,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, at: Instant) -> Self {
        self.deadline = Deadline::at(at);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Deadline::after(timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_from_json() {
        let opts: Options = serde_json::from_str(r#"{"backend":{"type":"redb","path":"/tmp/grm.redb"}}"#).unwrap();
        assert_eq!(opts, Options::redb("/tmp/grm.redb"));

        let opts: Options = serde_json::from_str("{}").unwrap();
        assert_eq!(opts.backend, Backend::Memory);
    }

    #[test]
    fn test_zero_ttl_means_no_expiry() {
        assert_eq!(SetOptions::new().expiry(), None);
        assert_eq!(SetOptions::new().with_ttl(Duration::ZERO).expiry(), None);
        assert_eq!(
            SetOptions::new().with_ttl(Duration::from_secs(1)).expiry(),
            Some(Duration::from_secs(1))
        );
    }

    #[test]
    fn test_timeout_sets_deadline() {
        let opts = CallOptions::new().with_timeout(Duration::from_secs(5));
        assert!(opts.deadline.instant().is_some());
        assert!(!opts.deadline.is_expired());
    }
}
