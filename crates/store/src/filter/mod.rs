/**
 * Filters wrap a blob store and transform values on the way through.
 *  Compression: gzip, lz4, zstd.
 *  Encryption: aes (static key), ecdhe (per-blob ephemeral key).
 *
 * Close ordering is transform first, then base. Both closes are
 * attempted even when the first fails; the first error wins.
 */
pub mod aes;
pub mod ecdhe;
pub mod gzip;
pub mod lz4;
pub mod zstd;

pub use aes::AesFilter;
pub use ecdhe::EcdheFilter;
pub use gzip::GzipFilter;
pub use lz4::Lz4Filter;
pub use zstd::ZstdFilter;
