//! Entry codecs
//!
//! A [`Codec`] turns entries into the bytes that get hashed and stored, and
//! back. The log never interprets those bytes itself.

use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::CodecError;

/// Serialization capability for entries of type `T`
///
/// `deserialize(serialize(e))` must equal `e` for every accepted entry; the log
/// relies on this for `write` followed by `read_at` to round-trip.
pub trait Codec<T>: Send + Sync {
    /// Encode an entry to bytes
    fn serialize(&self, entry: &T) -> Result<Vec<u8>, CodecError>;

    /// Decode bytes previously produced by [`serialize`](Codec::serialize)
    fn deserialize(&self, bytes: &[u8]) -> Result<T, CodecError>;
}

/// JSON text encoding via `serde_json`
pub struct JsonCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonCodec<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Codec<T> for JsonCodec<T>
where
    T: Serialize + DeserializeOwned,
{
    fn serialize(&self, entry: &T) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(entry).map_err(|e| CodecError::serialize(e.to_string()))
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::deserialize(e.to_string()))
    }
}

/// Compact binary encoding via `postcard`
pub struct PostcardCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> PostcardCodec<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for PostcardCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Codec<T> for PostcardCodec<T>
where
    T: Serialize + DeserializeOwned,
{
    fn serialize(&self, entry: &T) -> Result<Vec<u8>, CodecError> {
        postcard::to_allocvec(entry).map_err(|e| CodecError::serialize(e.to_string()))
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<T, CodecError> {
        postcard::from_bytes(bytes).map_err(|e| CodecError::deserialize(e.to_string()))
    }
}
