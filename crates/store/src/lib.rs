/**
 * Blob-level storage contract and backends.
 *  Stream-shaped handles with an explicit close,
 *  wrapped by the compression/encryption filters.
 */
pub mod blob;
/**
 * The capability contract shared by every backend
 *  plus the document/list option types.
 */
pub mod contract;
/**
 * Backend engines implementing the contract:
 *  memory, file, the two-tier cache composite and
 *  the remote HTTP client.
 */
pub mod engines;
/**
 * The fixed error taxonomy every backend and
 *  filter translates into at its boundary.
 */
pub mod error;
/**
 * URI pipeline factory.
 *  Turns "gzip+aes+file:///srv/data" into an
 *  ordered filter chain over a backend.
 */
pub mod factory;
/**
 * Compression and encryption filters over the
 *  blob contract.
 */
pub mod filter;
/**
 * Streaming list engine: bounded producer,
 *  cancellation and decimation.
 */
pub mod list;

pub mod prelude {
    pub use crate::contract::{Document, ListOpts, Storage};
    pub use crate::error::{ErrorKind, StoreError};
    pub use crate::factory::{self, Config};
    pub use crate::list::DocStream;
}
