//! Content-addressed entry blobs
//!
//! File-based storage keyed by digest hex. Blobs are immutable in practice:
//! the same digest always names the same bytes.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

use crate::digest::Digest;
use crate::error::{IntegrityError, LogError, Result};

/// The `entries/` directory of a log
#[derive(Debug, Clone)]
pub struct EntryStore {
    /// Directory holding one file per digest
    dir: PathBuf,
    /// Whether to sync blob contents before they become visible
    sync_on_write: bool,
    /// Suffix for the next temp file name, shared by clones
    temp_seq: Arc<AtomicU64>,
}

impl EntryStore {
    /// Directory name of the store under the storage root
    pub const DIR_NAME: &'static str = "entries";

    /// Create a handle for the store at `dir`. Does no I/O.
    pub fn new(dir: impl Into<PathBuf>, sync_on_write: bool) -> Self {
        Self {
            dir: dir.into(),
            sync_on_write,
            temp_seq: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Ensure the directory exists
    pub async fn create(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| LogError::io(&self.dir, e))?;
        info!(path = %self.dir.display(), "Entry store initialized");
        Ok(())
    }

    /// Get the file path for a digest
    pub fn blob_path(&self, digest: &Digest) -> PathBuf {
        self.dir.join(digest.to_hex())
    }

    /// Write `bytes` as the blob for `digest`, replacing any existing file
    ///
    /// Written to a temp file and renamed into place, so a reader resolving
    /// the digest never sees a partial blob.
    #[instrument(skip(self, bytes), fields(digest = %digest.short(), size = bytes.len()))]
    pub async fn put(&self, digest: &Digest, bytes: &[u8]) -> Result<()> {
        let path = self.blob_path(digest);
        let (temp_path, file) = self.create_temp(digest).await?;

        let result = self.write_then_rename(file, &temp_path, &path, bytes).await;
        if result.is_err() {
            // Leftover temp files are never read; removal is best effort
            let _ = fs::remove_file(&temp_path).await;
        }
        result?;

        debug!("Stored entry blob");
        Ok(())
    }

    /// Create a fresh temp file next to the blobs
    ///
    /// Names are claimed with `create_new`, so writers in other handles or
    /// processes never share one.
    async fn create_temp(&self, digest: &Digest) -> Result<(PathBuf, File)> {
        loop {
            let temp_path = self.dir.join(format!(
                ".{}.{}.{}.tmp",
                digest.to_hex(),
                std::process::id(),
                self.temp_seq.fetch_add(1, Ordering::Relaxed)
            ));
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&temp_path)
                .await
            {
                Ok(file) => return Ok((temp_path, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(LogError::io(&temp_path, e)),
            }
        }
    }

    async fn write_then_rename(
        &self,
        mut file: File,
        temp_path: &Path,
        path: &Path,
        bytes: &[u8],
    ) -> Result<()> {
        file.write_all(bytes)
            .await
            .map_err(|e| LogError::io(temp_path, e))?;
        file.flush().await.map_err(|e| LogError::io(temp_path, e))?;

        if self.sync_on_write {
            file.sync_all()
                .await
                .map_err(|e| LogError::io(temp_path, e))?;
        }
        drop(file);

        fs::rename(temp_path, path)
            .await
            .map_err(|e| LogError::io(path, e))
    }

    /// Read the blob for `digest`
    ///
    /// A missing blob means the index names content that was never stored,
    /// which is reported as [`IntegrityError::MissingBlob`].
    pub async fn get(&self, digest: &Digest) -> Result<Vec<u8>> {
        let path = self.blob_path(digest);
        fs::read(&path).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                LogError::from(IntegrityError::MissingBlob(digest.clone()))
            } else {
                LogError::io(&path, e)
            }
        })
    }
}
