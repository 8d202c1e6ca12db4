//! Error types for digest-log
//!
//! Construction problems are [`ConfigError`]s and are reported by the builder
//! before any file is touched. Everything else surfaces through the `Result`
//! of the operation that failed, or as an `Err` item of a stream.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::AtomicityMode;
use crate::digest::Digest;

/// Errors that can occur in log operations
#[derive(Debug, Error)]
pub enum LogError {
    /// The log was constructed with invalid or missing options
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Filesystem open/read/write/stat failure
    #[error("I/O error on {}{}: {source}", .path.display(), offset_suffix(.offset))]
    Io {
        /// File or directory the operation targeted
        path: PathBuf,
        /// Byte offset in the file, when the operation was positional
        offset: Option<u64>,
        #[source]
        source: io::Error,
    },

    /// The codec failed to serialize or deserialize an entry
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// The requested logical index is at or beyond the current head
    #[error("Entry not found at index {0}")]
    NotFound(u64),

    /// The index and entry store disagree, or the index is malformed
    #[error("Integrity error: {0}")]
    Integrity(#[from] IntegrityError),

    /// The filesystem watch backing a tail failed
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),
}

/// Construction-time contract violations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("directory not provided")]
    MissingDirectory,

    #[error("codec not provided")]
    MissingCodec,

    #[error("hashFunction not provided")]
    MissingHashFunction,

    #[error("hash function produced an empty digest")]
    EmptyDigest,

    /// Index line would not fit in a single atomic append
    #[error(
        "the hash function produces index lines of {width} bytes, longer than {mode} PIPE_BUF \
         ({limit} bytes); log lines must fit in PIPE_BUF to be written atomically{}",
        linux_hint(.mode)
    )]
    LineTooWide {
        width: usize,
        limit: usize,
        mode: AtomicityMode,
    },

    /// The hash function changed its output length after construction
    #[error("digest length changed from {expected} to {actual} bytes")]
    DigestLengthChanged { expected: usize, actual: usize },
}

/// Serialization failures raised by a [`Codec`](crate::codec::Codec)
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("serialize failed: {0}")]
    Serialize(String),

    #[error("deserialize failed: {0}")]
    Deserialize(String),
}

/// Index/blob inconsistencies; these indicate external corruption
#[derive(Debug, Error)]
pub enum IntegrityError {
    /// The index references a digest with no blob file
    #[error("no entry blob for digest {0}")]
    MissingBlob(Digest),

    /// Blob contents hash to a different digest than their name
    #[error("blob {expected} hashes to {actual}")]
    DigestMismatch { expected: Digest, actual: Digest },

    /// Index file length is not a multiple of the line width
    #[error("index length {len} is not a multiple of line width {width}")]
    TornIndex { len: u64, width: usize },

    /// An index line is not `hex + "\n"`
    #[error("malformed index line at offset {offset}: {reason}")]
    MalformedLine { offset: u64, reason: String },
}

fn offset_suffix(offset: &Option<u64>) -> String {
    offset.map(|o| format!(" at offset {o}")).unwrap_or_default()
}

fn linux_hint(mode: &AtomicityMode) -> &'static str {
    match mode {
        AtomicityMode::Posix => {
            ". Use AtomicityMode::Linux if you will run only on Linux and can rely on its \
             4096-byte PIPE_BUF"
        }
        AtomicityMode::Linux => "",
    }
}

impl LogError {
    /// Wrap an I/O error with the path it occurred on
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            offset: None,
            source,
        }
    }

    /// Wrap an I/O error with the path and byte offset it occurred at
    pub fn io_at(path: impl AsRef<Path>, offset: u64, source: io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            offset: Some(offset),
            source,
        }
    }

    /// True for a logical index beyond the head
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// True for index/blob inconsistencies
    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::Integrity(_))
    }
}

impl CodecError {
    pub fn serialize(message: impl Into<String>) -> Self {
        Self::Serialize(message.into())
    }

    pub fn deserialize(message: impl Into<String>) -> Self {
        Self::Deserialize(message.into())
    }
}

/// Result alias for log operations
pub type Result<T, E = LogError> = std::result::Result<T, E>;
