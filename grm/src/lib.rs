//! GRM - maps Rust records onto a key-value store.
//!
//! Each record lives under one key derived from its type and identifier:
//!
//! ```text
//! grm:{plural_snake_type}:{id}   -> encoded record
//! ```
//!
//! A record and a collection of records are handled the same way: every
//! operation works on an ordered [`Batch`] and costs one store round trip.
//!
//! # Quick Start
//!
//! ```rust
//! use grm::{impl_model, Options, SetOptions, DB};
//! use serde::{Deserialize, Serialize};
//! use std::time::Duration;
//!
//! #[derive(Debug, Default, Serialize, Deserialize)]
//! struct User {
//!     id: u32,
//!     name: String,
//! }
//!
//! impl_model!(User, id = id);
//!
//! let db = DB::open(&Options::memory()).unwrap();
//!
//! let mut users = vec![
//!     User { id: 1, name: "Alice".into() },
//!     User { id: 2, name: "Bob".into() },
//! ];
//! db.set_many(&mut users).unwrap();
//!
//! let mut fetched = vec![User { id: 1, ..Default::default() }, User { id: 2, ..Default::default() }];
//! db.get_many(&mut fetched).unwrap();
//! assert_eq!(fetched[1].name, "Bob");
//!
//! // Expiring write.
//! let mut session = User { id: 3, name: "tmp".into() };
//! db.set_batch(
//!     grm::Batch::one(&mut session),
//!     SetOptions::new().with_ttl(Duration::from_secs(60)),
//! )
//! .unwrap();
//! ```
//!
//! # Modules
//!
//! - [`key`]: canonical key derivation
//! - [`model`]: the [`Model`] capability trait and [`impl_model!`]
//! - [`serializer`]: [`Json`], [`MessagePack`] and [`Protobuf`] codecs
//! - [`batch`]: single record / collection normalization
//! - [`db`]: the [`DB`] handle and its set, get and delete operations

pub mod batch;
pub mod db;
pub mod error;
pub mod key;
pub mod model;
pub mod options;
pub mod serializer;

pub use batch::Batch;
pub use db::DB;
pub use error::{CodecError, Error, KeyError, PartialError, Result};
pub use key::{KEY_PREFIX, derive_key, key_for};
pub use model::{Base, Model, Timestamps};
pub use options::{Backend, CallOptions, Options, SetOptions};
pub use serializer::{Json, MessagePack, Protobuf, ProtoMessage, Serializer};

pub use grm_kv::{Deadline, KVError, KVStore, MemoryStore, RedbStore};
