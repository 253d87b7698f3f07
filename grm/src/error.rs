use std::collections::BTreeMap;
use std::fmt;

use grm_kv::KVError;
use thiserror::Error;

/// Codec-level failure from a [`Serializer`](crate::Serializer).
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("msgpack encode: {0}")]
    MsgpackEncode(#[from] rmp_serde::encode::Error),

    #[error("msgpack decode: {0}")]
    MsgpackDecode(#[from] rmp_serde::decode::Error),

    #[error("protobuf decode: {0}")]
    ProtobufDecode(#[from] prost::DecodeError),

    #[error("value {0} is not a protobuf message")]
    Unsupported(&'static str),
}

/// Why a single key failed during a batch read.
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("key not found")]
    NotFound,

    #[error("decode error: {0}")]
    Decode(#[source] CodecError),
}

impl KeyError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, KeyError::NotFound)
    }
}

/// Aggregated per-key failures of one batch read.
///
/// Every failing key is present; keys that decoded successfully are not.
#[derive(Debug, Default)]
pub struct PartialError {
    errors: BTreeMap<String, KeyError>,
}

impl PartialError {
    pub(crate) fn insert(&mut self, key: String, err: KeyError) {
        self.errors.insert(key, err);
    }

    /// Number of failing keys.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// The failure recorded for a key, if it failed.
    pub fn get(&self, key: &str) -> Option<&KeyError> {
        self.errors.get(key)
    }

    /// Failing keys in lexicographic order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.errors.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &KeyError)> {
        self.errors.iter().map(|(k, e)| (k.as_str(), e))
    }

    /// Keys that were absent from the store.
    pub fn not_found_keys(&self) -> Vec<&str> {
        self.iter()
            .filter(|(_, e)| e.is_not_found())
            .map(|(k, _)| k)
            .collect()
    }

    pub fn into_inner(self) -> BTreeMap<String, KeyError> {
        self.errors
    }
}

impl fmt::Display for PartialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "partial error ({} failures)", self.errors.len())
    }
}

impl std::error::Error for PartialError {}

#[derive(Error, Debug)]
pub enum Error {
    #[error("grm: invalid input: {0}")]
    InvalidInput(String),

    #[error("grm: model {0} must have an identifier field")]
    InvalidModel(&'static str),

    #[error("grm: serialization error: {0}")]
    Serialization(#[source] CodecError),

    #[error("grm: unsupported type: {0} does not implement the required message capability")]
    UnsupportedType(&'static str),

    #[error("grm: transport error: {0}")]
    Transport(#[from] KVError),

    #[error("grm: {0}")]
    Partial(PartialError),
}

impl Error {
    /// Reports whether this is the aggregated failure of a batch read.
    pub fn is_partial(&self) -> bool {
        matches!(self, Error::Partial(_))
    }

    pub fn as_partial(&self) -> Option<&PartialError> {
        match self {
            Error::Partial(p) => Some(p),
            _ => None,
        }
    }
}

impl From<CodecError> for Error {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::Unsupported(name) => Error::UnsupportedType(name),
            other => Error::Serialization(other),
        }
    }
}

/// Result alias for mapper operations.
pub type Result<T> = std::result::Result<T, Error>;
