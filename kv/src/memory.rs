//! In-memory key-value store implementation for testing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::{Deadline, KVError, KVResult, KVStore, require_non_empty};

struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    // Added to the wall clock; lets tests jump past expiries.
    offset: Duration,
    closed: bool,
}

impl Inner {
    fn now(&self) -> Instant {
        Instant::now() + self.offset
    }

    fn is_live(entry: &Entry, now: Instant) -> bool {
        entry.expires_at.is_none_or(|at| at > now)
    }

    fn live(&mut self, key: &str) -> Option<&Entry> {
        let now = self.now();
        if self.entries.get(key).is_some_and(|e| !Self::is_live(e, now)) {
            self.entries.remove(key);
        }
        self.entries.get(key)
    }
}

/// An in-memory key-value store backed by a HashMap.
///
/// Expiry is lazy: an expired entry reads as absent and is dropped the next
/// time it is touched. The store keeps its own clock offset so tests can
/// skip ahead with [`MemoryStore::fast_forward`] instead of sleeping.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> KVResult<MutexGuard<'_, Inner>> {
        let inner = self
            .inner
            .lock()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        if inner.closed {
            return Err(KVError::Closed);
        }
        Ok(inner)
    }

    /// Advance the store clock. Entries whose expiry falls inside the
    /// skipped interval become absent.
    pub fn fast_forward(&self, d: Duration) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.offset += d;
        }
    }

    /// Remaining time to live of a key. `None` if the key is absent or has
    /// no expiry.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let mut inner = self.lock().ok()?;
        let now = inner.now();
        let at = inner.live(key)?.expires_at?;
        Some(at.saturating_duration_since(now))
    }

    /// Reports whether a live entry exists for the key.
    pub fn exists(&self, key: &str) -> bool {
        self.lock()
            .map(|mut inner| inner.live(key).is_some())
            .unwrap_or(false)
    }

    /// Sorted list of live keys.
    pub fn keys(&self) -> Vec<String> {
        let Ok(inner) = self.lock() else {
            return Vec::new();
        };
        let now = inner.now();
        let mut keys: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, e)| Inner::is_live(e, now))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.keys().len()
    }

    /// Returns `true` if no live entry exists.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KVStore for MemoryStore {
    fn ping(&self) -> KVResult<()> {
        self.lock().map(|_| ())
    }

    fn mset(&self, entries: &[(&str, &[u8])], deadline: Deadline) -> KVResult<()> {
        require_non_empty("mset", entries.len())?;
        deadline.check()?;
        let mut inner = self.lock()?;
        for (key, value) in entries {
            inner.entries.insert(
                key.to_string(),
                Entry {
                    value: value.to_vec(),
                    expires_at: None,
                },
            );
        }
        Ok(())
    }

    fn set_ex_pipeline(
        &self,
        entries: &[(&str, &[u8], Duration)],
        deadline: Deadline,
    ) -> KVResult<()> {
        require_non_empty("set", entries.len())?;
        if let Some((key, _, _)) = entries.iter().find(|(_, _, ttl)| ttl.is_zero()) {
            return Err(KVError::InvalidArgument(format!(
                "invalid expire time for key {key}"
            )));
        }
        deadline.check()?;
        let mut inner = self.lock()?;
        let now = inner.now();
        for (key, value, ttl) in entries {
            inner.entries.insert(
                key.to_string(),
                Entry {
                    value: value.to_vec(),
                    // Past the end of the clock: never expires.
                    expires_at: now.checked_add(*ttl),
                },
            );
        }
        Ok(())
    }

    fn mget(&self, keys: &[&str], deadline: Deadline) -> KVResult<Vec<Option<Vec<u8>>>> {
        require_non_empty("mget", keys.len())?;
        deadline.check()?;
        let mut inner = self.lock()?;
        Ok(keys
            .iter()
            .map(|key| inner.live(key).map(|e| e.value.clone()))
            .collect())
    }

    fn mdel(&self, keys: &[&str], deadline: Deadline) -> KVResult<usize> {
        require_non_empty("del", keys.len())?;
        deadline.check()?;
        let mut inner = self.lock()?;
        let mut removed = 0;
        for key in keys {
            if inner.live(key).is_some() {
                inner.entries.remove(*key);
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn close(&self) -> KVResult<()> {
        let mut inner = self.lock()?;
        inner.closed = true;
        inner.entries.clear();
        Ok(())
    }
}
