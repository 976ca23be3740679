//! Blob backend implementations

pub mod memory;

pub use memory::MemoryBlobBackend;
