//! Redb-based persistent key-value store implementation.
//!
//! Values carry an 8-byte big-endian expiry header (unix milliseconds,
//! zero for no expiry) followed by the payload.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use ::redb::{Database, TableDefinition};

use crate::{Deadline, KVError, KVResult, KVStore, require_non_empty};

const TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("kv");

const HEADER_LEN: usize = 8;

fn storage<E: std::fmt::Display>(e: E) -> KVError {
    KVError::Storage(e.to_string())
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Whole milliseconds of a non-zero TTL, at least 1 and saturating at
/// `u64::MAX`.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

fn encode(value: &[u8], expires_at: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + value.len());
    buf.extend_from_slice(&expires_at.to_be_bytes());
    buf.extend_from_slice(value);
    buf
}

/// Returns the payload of a stored value, or `None` if it has expired.
fn decode(raw: &[u8], now: u64) -> KVResult<Option<&[u8]>> {
    if raw.len() < HEADER_LEN {
        return Err(KVError::Storage(format!(
            "corrupt value: {} bytes, header needs {HEADER_LEN}",
            raw.len()
        )));
    }
    let (header, payload) = raw.split_at(HEADER_LEN);
    let mut at = [0u8; HEADER_LEN];
    at.copy_from_slice(header);
    let expires_at = u64::from_be_bytes(at);
    if expires_at != 0 && expires_at <= now {
        return Ok(None);
    }
    Ok(Some(payload))
}

/// A persistent key-value store backed by redb.
pub struct RedbStore {
    db: Database,
    closed: AtomicBool,
}

impl RedbStore {
    /// Open or create a redb store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> KVResult<Self> {
        let db = Database::create(path).map_err(storage)?;

        // Create the table if it doesn't exist
        let tx = db.begin_write().map_err(storage)?;
        {
            let _ = tx.open_table(TABLE).map_err(storage)?;
        }
        tx.commit().map_err(storage)?;

        Ok(Self {
            db,
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> KVResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(KVError::Closed);
        }
        Ok(())
    }

    fn write_all(&self, entries: &[(&str, Vec<u8>)], deadline: Deadline) -> KVResult<()> {
        let tx = self.db.begin_write().map_err(storage)?;
        {
            let mut table = tx.open_table(TABLE).map_err(storage)?;
            for (key, value) in entries {
                table.insert(*key, value.as_slice()).map_err(storage)?;
            }
        }
        // Dropping an uncommitted transaction aborts it.
        deadline.check()?;
        tx.commit().map_err(storage)?;
        Ok(())
    }
}

impl KVStore for RedbStore {
    fn ping(&self) -> KVResult<()> {
        self.ensure_open()?;
        let tx = self.db.begin_read().map_err(storage)?;
        tx.open_table(TABLE).map_err(storage)?;
        Ok(())
    }

    fn mset(&self, entries: &[(&str, &[u8])], deadline: Deadline) -> KVResult<()> {
        require_non_empty("mset", entries.len())?;
        self.ensure_open()?;
        deadline.check()?;
        let encoded: Vec<(&str, Vec<u8>)> = entries
            .iter()
            .map(|(key, value)| (*key, encode(value, 0)))
            .collect();
        self.write_all(&encoded, deadline)
    }

    fn set_ex_pipeline(
        &self,
        entries: &[(&str, &[u8], Duration)],
        deadline: Deadline,
    ) -> KVResult<()> {
        require_non_empty("set", entries.len())?;
        self.ensure_open()?;
        deadline.check()?;
        let now = now_millis();
        let mut encoded = Vec::with_capacity(entries.len());
        for (key, value, ttl) in entries {
            if ttl.is_zero() {
                return Err(KVError::InvalidArgument(format!(
                    "invalid expire time for key {key}"
                )));
            }
            encoded.push((*key, encode(value, now.saturating_add(ttl_millis(*ttl)))));
        }
        self.write_all(&encoded, deadline)
    }

    fn mget(&self, keys: &[&str], deadline: Deadline) -> KVResult<Vec<Option<Vec<u8>>>> {
        require_non_empty("mget", keys.len())?;
        self.ensure_open()?;
        deadline.check()?;
        let tx = self.db.begin_read().map_err(storage)?;
        let table = tx.open_table(TABLE).map_err(storage)?;

        let now = now_millis();
        let mut results = Vec::with_capacity(keys.len());
        for key in keys {
            let value = match table.get(*key).map_err(storage)? {
                Some(raw) => decode(raw.value(), now)?.map(|p| p.to_vec()),
                None => None,
            };
            results.push(value);
        }
        Ok(results)
    }

    fn mdel(&self, keys: &[&str], deadline: Deadline) -> KVResult<usize> {
        require_non_empty("del", keys.len())?;
        self.ensure_open()?;
        deadline.check()?;
        let now = now_millis();
        let tx = self.db.begin_write().map_err(storage)?;
        let mut removed = 0;
        {
            let mut table = tx.open_table(TABLE).map_err(storage)?;
            for key in keys {
                if let Some(raw) = table.remove(*key).map_err(storage)? {
                    if decode(raw.value(), now)?.is_some() {
                        removed += 1;
                    }
                }
            }
        }
        deadline.check()?;
        tx.commit().map_err(storage)?;
        Ok(removed)
    }

    fn close(&self) -> KVResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
