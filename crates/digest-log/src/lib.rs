//! # Digest Log
//!
//! A content-addressed, append-only log on the local filesystem.
//!
//! Every entry is serialized by a [`Codec`], hashed by a [`HashFunction`] and
//! stored once under its digest. The order of the log lives in a separate
//! index file of fixed-width digest lines, so entry `i` is a single seek away
//! and a whole line can be appended atomically.
//!
//! ## Features
//!
//! - **Random access**: [`AppendOnlyLog::read_at`] by logical index
//! - **Bulk reads**: [`AppendOnlyLog::stream_from`] yields a finite stream up
//!   to the end of the index as it was when the stream opened
//! - **Live tailing**: [`AppendOnlyLog::tail`] follows the log through a
//!   filesystem watch, without missing or repeating entries
//! - **Pluggable capabilities**: bring your own codec and hash, or use
//!   [`JsonCodec`], [`PostcardCodec`] and [`Blake3`]
//!
//! ## Storage Format
//!
//! ```text
//! <root>/log                    "<digest-hex>\n" per entry
//! <root>/entries/<digest-hex>   serialized entry bytes
//! ```
//!
//! Index lines must fit in `PIPE_BUF` (512 bytes, or 4096 with
//! [`AtomicityMode::Linux`]); a hash that produces wider lines is rejected
//! when the log is built.
//!
//! ## Example
//!
//! ```rust,ignore
//! use digest_log::{AppendOnlyLog, Blake3, JsonCodec, LogConfig};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> digest_log::Result<()> {
//!     let log = AppendOnlyLog::new(LogConfig::new("./data/events"), JsonCodec::new(), Blake3)?;
//!     log.initialize().await?;
//!
//!     log.write(&serde_json::json!({ "x": 1 })).await?;
//!     assert_eq!(log.head().await?, 1);
//!
//!     // Follow everything written from now on
//!     let mut tail = log.tail(log.head().await?);
//!     while let Some(entry) = tail.next().await {
//!         println!("{}", entry?);
//!     }
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod config;
pub mod digest;
pub mod error;
pub mod hash;
pub mod log;
pub mod store;
pub mod tail;

// Re-exports
pub use codec::{Codec, JsonCodec, PostcardCodec};
pub use config::{AtomicityMode, LogConfig};
pub use digest::Digest;
pub use error::{CodecError, ConfigError, IntegrityError, LogError, Result};
pub use hash::{Blake3, HashFunction};
pub use log::{AppendOnlyLog, EntryStream, LogBuilder};
pub use tail::{ChangeSender, ChangeSource, ChannelSource, FsWatchSource, TailPhase, TailState};
