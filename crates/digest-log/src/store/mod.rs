//! On-disk storage for the log
//!
//! Two files make up a log rooted at a directory:
//!
//! ```text
//! <root>/log                    index: "<digest-hex>\n" per entry, fixed width
//! <root>/entries/<digest-hex>   serialized entry bytes, one file per digest
//! ```
//!
//! The index gives order, the entry store gives content. A blob is always
//! written before the index line that names it.

mod entries;
mod index;

pub use entries::EntryStore;
pub use index::IndexFile;
