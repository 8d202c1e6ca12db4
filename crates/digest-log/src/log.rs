//! Append-only log engine
//!
//! Composes the [`IndexFile`] and [`EntryStore`] into the public log API.

use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use tracing::{debug, info, instrument, trace, warn};

use crate::codec::Codec;
use crate::config::{AtomicityMode, LogConfig};
use crate::digest::Digest;
use crate::error::{ConfigError, IntegrityError, Result};
use crate::hash::HashFunction;
use crate::store::{EntryStore, IndexFile};
use crate::tail::{self, ChangeSource, FsWatchSource};

/// Boxed stream of entries, as returned by streaming and tailing
pub type EntryStream<T> = Pin<Box<dyn Stream<Item = Result<T>> + Send>>;

/// Value hashed at construction to measure the digest length: `"x"` as JSON
const PROBE: &[u8] = b"\"x\"";

/// Content-addressed append-only log of `T` entries
///
/// Cloning is cheap and clones share the same storage root.
pub struct AppendOnlyLog<T> {
    config: LogConfig,
    /// Storage root
    directory: PathBuf,
    index: IndexFile,
    entries: EntryStore,
    codec: Arc<dyn Codec<T>>,
    hasher: Arc<dyn HashFunction>,
}

impl<T> Clone for AppendOnlyLog<T> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            directory: self.directory.clone(),
            index: self.index.clone(),
            entries: self.entries.clone(),
            codec: Arc::clone(&self.codec),
            hasher: Arc::clone(&self.hasher),
        }
    }
}

impl<T> std::fmt::Debug for AppendOnlyLog<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppendOnlyLog")
            .field("directory", &self.directory)
            .field("line_width", &self.index.line_width())
            .field("atomicity", &self.config.atomicity)
            .finish()
    }
}

/// Builder for [`AppendOnlyLog`]
///
/// Every check happens in [`build`](LogBuilder::build), before any I/O.
pub struct LogBuilder<T> {
    config: LogConfig,
    codec: Option<Arc<dyn Codec<T>>>,
    hasher: Option<Arc<dyn HashFunction>>,
}

impl<T> Default for LogBuilder<T> {
    fn default() -> Self {
        Self {
            config: LogConfig::default(),
            codec: None,
            hasher: None,
        }
    }
}

impl<T> LogBuilder<T> {
    /// Use a complete configuration, replacing earlier settings
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the storage root
    pub fn directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.config.directory = Some(directory.into());
        self
    }

    /// Set the atomic-append window
    pub fn atomicity(mut self, mode: AtomicityMode) -> Self {
        self.config.atomicity = mode;
        self
    }

    /// Enable or disable syncing blobs and index lines on write
    pub fn sync_on_write(mut self, enabled: bool) -> Self {
        self.config.sync_on_write = enabled;
        self
    }

    /// Enable or disable re-hashing blobs on `read_at`
    pub fn verify_on_read(mut self, enabled: bool) -> Self {
        self.config.verify_on_read = enabled;
        self
    }

    /// Set the entry codec
    pub fn codec(mut self, codec: impl Codec<T> + 'static) -> Self {
        self.codec = Some(Arc::new(codec));
        self
    }

    /// Set the hash function
    pub fn hash_function(mut self, hasher: impl HashFunction + 'static) -> Self {
        self.hasher = Some(Arc::new(hasher));
        self
    }

    /// Validate the options and derive the index geometry
    pub fn build(self) -> Result<AppendOnlyLog<T>> {
        let directory = self
            .config
            .directory
            .clone()
            .ok_or(ConfigError::MissingDirectory)?;
        let codec = self.codec.ok_or(ConfigError::MissingCodec)?;
        let hasher = self.hasher.ok_or(ConfigError::MissingHashFunction)?;

        let sample = Digest::new(hasher.hash(PROBE));
        if sample.is_empty() {
            return Err(ConfigError::EmptyDigest.into());
        }
        let digest_len = sample.len();

        let width = IndexFile::line_width_for(digest_len);
        let mode = self.config.atomicity;
        if width > mode.pipe_buf() {
            return Err(ConfigError::LineTooWide {
                width,
                limit: mode.pipe_buf(),
                mode,
            }
            .into());
        }

        let index = IndexFile::new(
            directory.join(IndexFile::FILE_NAME),
            digest_len,
            self.config.sync_on_write,
        );
        let entries = EntryStore::new(
            directory.join(EntryStore::DIR_NAME),
            self.config.sync_on_write,
        );

        info!(
            path = %directory.display(),
            digest_len,
            line_width = width,
            atomicity = %mode,
            "Opened append-only log"
        );

        Ok(AppendOnlyLog {
            config: self.config,
            directory,
            index,
            entries,
            codec,
            hasher,
        })
    }
}

impl<T> AppendOnlyLog<T> {
    /// Start building a log
    pub fn builder() -> LogBuilder<T> {
        LogBuilder::default()
    }

    /// Build a log from a configuration, codec and hash function
    pub fn new(
        config: LogConfig,
        codec: impl Codec<T> + 'static,
        hasher: impl HashFunction + 'static,
    ) -> Result<Self> {
        Self::builder()
            .with_config(config)
            .codec(codec)
            .hash_function(hasher)
            .build()
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Storage root
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path of the `log` index file
    pub fn index_path(&self) -> &Path {
        self.index.path()
    }

    /// Path of the `entries/` directory
    pub fn entries_path(&self) -> &Path {
        self.entries.path()
    }

    /// Raw digest length measured at construction
    pub fn digest_len(&self) -> usize {
        self.index.digest_len()
    }

    /// Bytes per index line
    pub fn line_width(&self) -> usize {
        self.index.line_width()
    }

    /// Create the entries directory and the index file if missing
    ///
    /// Safe to call repeatedly; existing entries are kept.
    #[instrument(skip(self), fields(path = %self.directory.display()))]
    pub async fn initialize(&self) -> Result<()> {
        self.entries.create().await?;
        self.index.create().await?;
        info!("Log initialized");
        Ok(())
    }

    /// Append `entry` and return its digest
    ///
    /// The blob is stored before the index line is appended, so any reader
    /// that sees the line can resolve it. If the append fails the blob stays
    /// behind as an orphan, which is harmless.
    #[instrument(skip_all)]
    pub async fn write(&self, entry: &T) -> Result<Digest> {
        let bytes = self.codec.serialize(entry)?;
        let digest = Digest::new(self.hasher.hash(&bytes));
        self.index.check_digest(&digest)?;

        self.entries.put(&digest, &bytes).await?;
        self.index.append_line(&digest).await?;

        debug!(digest = %digest.short(), size = bytes.len(), "Wrote entry");
        Ok(digest)
    }

    /// Read the entry at logical `index`
    #[instrument(skip(self))]
    pub async fn read_at(&self, index: u64) -> Result<T> {
        let digest = self.index.read_digest(index).await?;
        self.resolve(&digest).await
    }

    /// Digest recorded at logical `index`
    pub async fn digest_at(&self, index: u64) -> Result<Digest> {
        self.index.read_digest(index).await
    }

    /// Number of committed entries; the index one past the newest entry
    pub async fn head(&self) -> Result<u64> {
        self.index.entry_count().await
    }

    async fn resolve(&self, digest: &Digest) -> Result<T> {
        let bytes = self.entries.get(digest).await?;

        if self.config.verify_on_read {
            let actual = Digest::new(self.hasher.hash(&bytes));
            if actual != *digest {
                warn!(expected = %digest.short(), actual = %actual.short(), "Entry blob hash mismatch");
                return Err(IntegrityError::DigestMismatch {
                    expected: digest.clone(),
                    actual,
                }
                .into());
            }
        }

        trace!(digest = %digest.short(), "Resolved entry");
        Ok(self.codec.deserialize(&bytes)?)
    }
}

impl<T: Send + 'static> AppendOnlyLog<T> {
    /// Stream entries from logical `start` to the end of the index
    ///
    /// The end is the index length when the stream first reads it; later
    /// writes need a new call. Nothing is read until the stream is polled.
    pub fn stream_from(&self, start: u64) -> EntryStream<T> {
        let log = self.clone();
        Box::pin(async_stream::try_stream! {
            let digests = log.index.digests_from(start);
            futures::pin_mut!(digests);

            while let Some(digest) = digests.next().await {
                let digest = digest?;
                let entry = log.resolve(&digest).await?;
                yield entry;
            }
        })
    }

    /// Stream every entry currently in the log
    pub fn stream(&self) -> EntryStream<T> {
        self.stream_from(0)
    }

    /// Follow the log from logical `start`, including future writes
    ///
    /// The stream never ends on its own. It watches the index file for
    /// changes; dropping the stream stops the watch. Errors, including a
    /// failure to set up the watch, are yielded once and end the stream.
    pub fn tail(&self, start: u64) -> EntryStream<T> {
        match FsWatchSource::watch(self.index.path()) {
            Ok(source) => self.tail_with(start, source),
            Err(err) => Box::pin(futures::stream::once(async move { Err(err) })),
        }
    }

    /// Follow the log from `start`, re-reading whenever `source` signals a change
    pub fn tail_with<S>(&self, start: u64, source: S) -> EntryStream<T>
    where
        S: ChangeSource + 'static,
    {
        tail::drive(self.clone(), start, source)
    }
}
