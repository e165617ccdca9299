/**
 * Synchronous blob contract.
 *  Filters (compression, encryption) wrap these handles; the adapter
 *  lifts a finished chain back into the async storage contract.
 */
pub mod adapter;
pub mod file;
#[cfg(test)]
pub(crate) mod testutil;

use std::io::{Read, Write};

pub use adapter::BlobStorage;
pub use file::FileBlobStore;

/// A readable blob handle with an explicit close.
///
/// `close` drains and releases the underlying resource; for filtered
/// readers it also verifies trailing framing (e.g. a compression
/// footer). Dropping a handle without closing it loses that check.
pub trait BlobRead: Read + Send {
    fn close(&mut self) -> std::io::Result<()>;
}

impl std::fmt::Debug for dyn BlobRead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn BlobRead")
    }
}

/// A writable blob handle with an explicit close.
///
/// Data is not guaranteed durable (or, for filters, completely framed)
/// until `close` returns. Close order in a filter chain is transform
/// first, then base, so the transform can flush its footer into the
/// base before the base seals the blob.
pub trait BlobWrite: Write + Send {
    fn close(&mut self) -> std::io::Result<()>;
}

/// A flat blob namespace addressed by string ids.
///
/// Ids may contain `/` separators; stores treat them as opaque apart
/// from optional hierarchical layout. This is the seam the filter
/// chain composes over.
pub trait BlobStore: Send + Sync {
    fn get_reader(&self, id: &str) -> std::io::Result<Box<dyn BlobRead>>;
    fn get_writer(&self, id: &str) -> std::io::Result<Box<dyn BlobWrite>>;
    fn has(&self, id: &str) -> bool;
    fn delete(&self, id: &str) -> std::io::Result<()>;
    /// All ids starting with `prefix`, in ascending byte order.
    fn list(&self, prefix: &str) -> std::io::Result<Vec<String>>;
}
