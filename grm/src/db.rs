use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use grm_kv::{Deadline, KVError, KVStore};
use tracing::{debug, warn};

use crate::batch::Batch;
use crate::error::{Error, KeyError, PartialError, Result};
use crate::key::key_for;
use crate::model::Model;
use crate::options::{CallOptions, Options, SetOptions};
use crate::serializer::{Json, Serializer};

/// Handle to a key-value store that persists [`Model`] records.
///
/// Open it once and share it; every call issues exactly one round trip to
/// the store and holds no lock of its own, so concurrent calls from many
/// threads interleave freely.
///
/// The serializer is part of the handle's type and cannot change after
/// construction.
pub struct DB<S: Serializer = Json> {
    store: Arc<dyn KVStore>,
    serializer: S,
}

impl DB<Json> {
    /// Connect with the default JSON serializer.
    pub fn open(opts: &Options) -> Result<Self> {
        Self::open_with(opts, Json)
    }
}

impl<S: Serializer> DB<S> {
    /// Connect with the given serializer.
    pub fn open_with(opts: &Options, serializer: S) -> Result<Self> {
        let store = opts.connect()?;
        Self::with_store(store, serializer)
    }

    /// Use an existing store. Fails if the store does not answer a ping.
    pub fn with_store(store: Arc<dyn KVStore>, serializer: S) -> Result<Self> {
        store.ping()?;
        debug!("grm: opened store with {} serializer", serializer.name());
        Ok(Self { store, serializer })
    }

    pub fn serializer(&self) -> &S {
        &self.serializer
    }

    pub fn store(&self) -> &Arc<dyn KVStore> {
        &self.store
    }

    /// Close the underlying store. Later calls fail with a transport error.
    pub fn close(&self) -> Result<()> {
        self.store.close()?;
        Ok(())
    }

    /// Write one record without expiry.
    pub fn set<M: Model>(&self, model: &mut M) -> Result<()> {
        self.set_batch(Batch::one(model), SetOptions::default())
    }

    /// Write a collection of records without expiry.
    pub fn set_many<M: Model>(&self, models: &mut [M]) -> Result<()> {
        self.set_batch(Batch::many(models), SetOptions::default())
    }

    /// Write a batch.
    ///
    /// Timestamps are touched, keys derived and payloads encoded for every
    /// record before anything is sent; the first failure aborts the call
    /// with the store untouched. Without a TTL the batch goes out as one
    /// multi-set. With a TTL each record is written with its own expiry in
    /// one pipelined request, whose outcome is reported as a whole.
    pub fn set_batch<M: Model>(&self, batch: Batch<'_, M>, opts: SetOptions) -> Result<()> {
        let mut items = batch.into_handles()?;

        let now = Utc::now();
        let mut keys = Vec::with_capacity(items.len());
        let mut payloads = Vec::with_capacity(items.len());
        for item in items.iter_mut() {
            if let Some(ts) = item.timestamps() {
                ts.touch_created(now);
                ts.touch_updated(now);
            }
            keys.push(key_for(&**item)?);
            payloads.push(self.serializer.marshal(&**item)?);
        }

        match opts.expiry() {
            None => self.write_all(&keys, &payloads, opts.deadline),
            Some(ttl) => self.write_all_ex(&keys, &payloads, ttl, opts.deadline),
        }
    }

    fn write_all(&self, keys: &[String], payloads: &[Vec<u8>], deadline: Deadline) -> Result<()> {
        let entries: Vec<(&str, &[u8])> = keys
            .iter()
            .zip(payloads)
            .map(|(k, v)| (k.as_str(), v.as_slice()))
            .collect();
        debug!("grm: mset {} keys", entries.len());
        self.store.mset(&entries, deadline)?;
        Ok(())
    }

    fn write_all_ex(
        &self,
        keys: &[String],
        payloads: &[Vec<u8>],
        ttl: Duration,
        deadline: Deadline,
    ) -> Result<()> {
        let entries: Vec<(&str, &[u8], Duration)> = keys
            .iter()
            .zip(payloads)
            .map(|(k, v)| (k.as_str(), v.as_slice(), ttl))
            .collect();
        debug!("grm: pipelined set of {} keys, ttl={:?}", entries.len(), ttl);
        self.store.set_ex_pipeline(&entries, deadline)?;
        Ok(())
    }

    /// Read one record in place. The identifier must already be set.
    pub fn get<M: Model>(&self, model: &mut M) -> Result<()> {
        self.get_batch(Batch::one(model), CallOptions::default())
    }

    /// Read a collection of records in place, by their identifiers.
    pub fn get_many<M: Model>(&self, models: &mut [M]) -> Result<()> {
        self.get_batch(Batch::many(models), CallOptions::default())
    }

    /// Read a batch in one multi-get and decode each record in place.
    ///
    /// Absent keys and undecodable payloads do not stop the batch; they are
    /// collected into one [`Error::Partial`] naming every failing key.
    /// Records that failed keep whatever they held before the call.
    pub fn get_batch<M: Model>(&self, batch: Batch<'_, M>, opts: CallOptions) -> Result<()> {
        let mut items = batch.into_handles()?;
        let keys = derive_keys(&items)?;
        let refs: Vec<&str> = keys.iter().map(String::as_str).collect();

        debug!("grm: mget {} keys", refs.len());
        let values = self.store.mget(&refs, opts.deadline)?;
        if values.len() != keys.len() {
            return Err(Error::Transport(KVError::Storage(format!(
                "mget returned {} values for {} keys",
                values.len(),
                keys.len()
            ))));
        }

        let mut partial = PartialError::default();
        for ((key, value), item) in keys.into_iter().zip(values).zip(items.iter_mut()) {
            let Some(data) = value else {
                partial.insert(key, KeyError::NotFound);
                continue;
            };
            if let Err(e) = self.serializer.unmarshal(&data, &mut **item) {
                partial.insert(key, KeyError::Decode(e));
            }
        }

        if partial.is_empty() {
            return Ok(());
        }
        warn!("grm: mget finished with {} failed keys", partial.len());
        Err(Error::Partial(partial))
    }

    /// Delete one record. Deleting an absent record is not an error.
    pub fn delete<M: Model>(&self, model: &mut M) -> Result<()> {
        self.delete_batch(Batch::one(model), CallOptions::default())
    }

    /// Delete a collection of records.
    pub fn delete_many<M: Model>(&self, models: &mut [M]) -> Result<()> {
        self.delete_batch(Batch::many(models), CallOptions::default())
    }

    /// Delete a batch in one request.
    pub fn delete_batch<M: Model>(&self, batch: Batch<'_, M>, opts: CallOptions) -> Result<()> {
        let items = batch.into_handles()?;
        let keys = derive_keys(&items)?;
        let refs: Vec<&str> = keys.iter().map(String::as_str).collect();

        let removed = self.store.mdel(&refs, opts.deadline)?;
        debug!("grm: del {} keys, {} existed", refs.len(), removed);
        Ok(())
    }
}

fn derive_keys<M: Model>(items: &[&mut M]) -> Result<Vec<String>> {
    items.iter().map(|item| key_for(&**item)).collect()
}

impl<S: Serializer> fmt::Debug for DB<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DB")
            .field("serializer", &self.serializer.name())
            .finish_non_exhaustive()
    }
}
