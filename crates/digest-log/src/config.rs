//! Configuration types for the log

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Which platform guarantee the index relies on for atomic appends
///
/// An index line is written with a single append-mode write. Writes no larger
/// than `PIPE_BUF` are atomic, so concurrent readers never observe part of a
/// line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AtomicityMode {
    /// POSIX minimum `PIPE_BUF` of 512 bytes
    #[default]
    Posix,
    /// Linux `PIPE_BUF` of 4096 bytes; only valid for Linux-only deployments
    Linux,
}

impl AtomicityMode {
    /// Largest index line, in bytes, that can be appended atomically
    pub const fn pipe_buf(self) -> usize {
        match self {
            Self::Posix => 512,
            Self::Linux => 4096,
        }
    }
}

impl fmt::Display for AtomicityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Posix => f.write_str("POSIX"),
            Self::Linux => f.write_str("Linux"),
        }
    }
}

/// Configuration for an [`AppendOnlyLog`](crate::AppendOnlyLog)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Storage root holding `log` and `entries/`. Required.
    pub directory: Option<PathBuf>,
    /// Atomic-append window the index line width is checked against
    pub atomicity: AtomicityMode,
    /// Whether to sync blobs and index lines to disk before returning
    pub sync_on_write: bool,
    /// Whether `read_at` re-hashes blobs and compares against their digest
    pub verify_on_read: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            directory: None,
            atomicity: AtomicityMode::Posix,
            sync_on_write: true,
            verify_on_read: false,
        }
    }
}

impl LogConfig {
    /// Config rooted at `directory` with defaults for everything else
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: Some(directory.into()),
            ..Default::default()
        }
    }

    /// Assert a Linux-only deployment, raising the line limit to 4096 bytes
    pub fn linux_only(mut self) -> Self {
        self.atomicity = AtomicityMode::Linux;
        self
    }

    /// Config for tests: no fsync, blob verification on
    pub fn testing(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: Some(directory.into()),
            atomicity: AtomicityMode::Posix,
            sync_on_write: false,
            verify_on_read: true,
        }
    }
}
