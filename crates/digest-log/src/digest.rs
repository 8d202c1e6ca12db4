//! Digest value type

use std::fmt;

use serde::{Deserialize, Serialize};

/// Digest of a serialized entry
///
/// Holds the raw bytes produced by the log's [`HashFunction`](crate::HashFunction).
/// On disk a digest is always its lowercase hex text, both as an index line
/// and as the blob file name.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Digest(Vec<u8>);

impl Digest {
    /// Wrap raw digest bytes
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Parse the hex text form. Returns `None` for odd length or non-hex input.
    pub fn from_hex(text: &str) -> Option<Self> {
        hex::decode(text).ok().map(Self)
    }

    /// Lowercase hex text, as written to the index and used as a file name
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Get a short hash for display (first 8 chars)
    pub fn short(&self) -> String {
        hex::encode(&self.0[..self.0.len().min(4)])
    }

    /// Raw digest bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length of the raw digest in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.short())
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
