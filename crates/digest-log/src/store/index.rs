//! Fixed-width digest index
//!
//! Every line is the same width, so the line for logical index `i` starts at
//! byte `i * width` and no offset table is needed.

use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};

use futures::Stream;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufReader};
use tracing::{debug, instrument, warn};

use crate::digest::Digest;
use crate::error::{ConfigError, IntegrityError, LogError, Result};

/// The `log` file: one `hex(digest) + "\n"` line per entry
#[derive(Debug, Clone)]
pub struct IndexFile {
    /// Path to the index file
    path: PathBuf,
    /// Raw digest length in bytes
    digest_len: usize,
    /// Bytes per line, newline included
    line_width: usize,
    /// Whether to sync after each append
    sync_on_write: bool,
}

impl IndexFile {
    /// File name of the index under the storage root
    pub const FILE_NAME: &'static str = "log";

    /// Create a handle for the index at `path`. Does no I/O.
    pub fn new(path: impl Into<PathBuf>, digest_len: usize, sync_on_write: bool) -> Self {
        Self {
            path: path.into(),
            digest_len,
            line_width: Self::line_width_for(digest_len),
            sync_on_write,
        }
    }

    /// Line width for a raw digest length: hex text plus the newline
    pub const fn line_width_for(digest_len: usize) -> usize {
        digest_len * 2 + 1
    }

    /// Byte offset of the line for `index`
    ///
    /// Not checked against the file length; an index past the end shows up as
    /// a short read. `None` when the offset is beyond any seekable position.
    pub fn offset_of(&self, index: u64) -> Option<u64> {
        index
            .checked_mul(self.line_width as u64)
            .filter(|offset| *offset <= i64::MAX as u64)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn line_width(&self) -> usize {
        self.line_width
    }

    pub fn digest_len(&self) -> usize {
        self.digest_len
    }

    /// Create the index file if it does not exist. Never truncates.
    pub async fn create(&self) -> Result<()> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| LogError::io(&self.path, e))?;
        Ok(())
    }

    /// Reject digests whose length differs from the one measured at construction
    pub fn check_digest(&self, digest: &Digest) -> Result<()> {
        if digest.len() != self.digest_len {
            return Err(ConfigError::DigestLengthChanged {
                expected: self.digest_len,
                actual: digest.len(),
            }
            .into());
        }
        Ok(())
    }

    /// Append the line for `digest`
    ///
    /// The whole line goes out in one append-mode write no larger than the
    /// configured `PIPE_BUF`, so readers see either all of it or none of it.
    #[instrument(skip_all, fields(digest = %digest.short()))]
    pub async fn append_line(&self, digest: &Digest) -> Result<()> {
        self.check_digest(digest)?;

        let mut line = digest.to_hex().into_bytes();
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| LogError::io(&self.path, e))?;

        file.write_all(&line)
            .await
            .map_err(|e| LogError::io(&self.path, e))?;
        file.flush().await.map_err(|e| LogError::io(&self.path, e))?;

        if self.sync_on_write {
            file.sync_data()
                .await
                .map_err(|e| LogError::io(&self.path, e))?;
        }

        debug!("Appended index line");
        Ok(())
    }

    /// Number of committed entries
    pub async fn entry_count(&self) -> Result<u64> {
        let metadata = tokio::fs::metadata(&self.path)
            .await
            .map_err(|e| LogError::io(&self.path, e))?;
        whole_lines(metadata.len(), self.line_width)
    }

    /// Read the digest at logical `index`
    ///
    /// An index at or past the end is [`LogError::NotFound`].
    pub async fn read_digest(&self, index: u64) -> Result<Digest> {
        let offset = self.offset_of(index).ok_or(LogError::NotFound(index))?;

        let mut file = File::open(&self.path)
            .await
            .map_err(|e| LogError::io(&self.path, e))?;
        file.seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| LogError::io_at(&self.path, offset, e))?;

        let mut line = vec![0u8; self.line_width];
        match file.read_exact(&mut line).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Err(LogError::NotFound(index)),
            Err(e) => return Err(LogError::io_at(&self.path, offset, e)),
        }

        parse_line(&line, offset)
    }

    /// Stream digests from logical `start` to the end of the file
    ///
    /// The end is fixed when the file is opened on first poll: lines appended
    /// after that are not included.
    pub fn digests_from(&self, start: u64) -> impl Stream<Item = Result<Digest>> + Send + use<> {
        let path = self.path.clone();
        let width = self.line_width;
        // Unaddressable starts are past any end, giving an empty stream
        let mut offset = self.offset_of(start).unwrap_or(u64::MAX);

        async_stream::try_stream! {
            let mut file = File::open(&path)
                .await
                .map_err(|e| LogError::io(&path, e))?;
            let len = file
                .metadata()
                .await
                .map_err(|e| LogError::io(&path, e))?
                .len();
            let end = whole_lines(len, width)? * width as u64;

            if offset < end {
                file.seek(SeekFrom::Start(offset))
                    .await
                    .map_err(|e| LogError::io_at(&path, offset, e))?;
            }

            let mut reader = BufReader::new(file);
            let mut line = vec![0u8; width];
            while offset < end {
                reader
                    .read_exact(&mut line)
                    .await
                    .map_err(|e| LogError::io_at(&path, offset, e))?;
                yield parse_line(&line, offset)?;
                offset += width as u64;
            }
        }
    }
}

/// Whole lines in a file of `len` bytes; a partial line means corruption
fn whole_lines(len: u64, width: usize) -> Result<u64> {
    let width_u64 = width as u64;
    if len % width_u64 != 0 {
        warn!(len, width, "Index length is not a multiple of line width");
        return Err(IntegrityError::TornIndex { len, width }.into());
    }
    Ok(len / width_u64)
}

/// Decode one `hex + "\n"` line read from `offset`
fn parse_line(line: &[u8], offset: u64) -> Result<Digest> {
    let malformed = |reason: &str| -> LogError {
        IntegrityError::MalformedLine {
            offset,
            reason: reason.to_string(),
        }
        .into()
    };

    let Some((&b'\n', text)) = line.split_last() else {
        return Err(malformed("missing newline"));
    };
    let text = std::str::from_utf8(text).map_err(|_| malformed("not utf-8"))?;
    Digest::from_hex(text).ok_or_else(|| malformed("not hex"))
}
