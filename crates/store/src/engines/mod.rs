pub mod cache;
pub mod file;
pub mod memory;
pub mod remote;

pub use cache::CacheStorage;
pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use remote::RemoteStorage;
