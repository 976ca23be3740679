//! # stowage
//!
//! Typed model mapping over the three primitives of a cloud storage
//! account: blob containers, queues and tables.
//!
//! Models declare their fields once; a context per storage kind registers
//! them (creating the container, queue or table), reconciles stored data
//! against the declared types and wires up client-side encryption.
//!
//! This is the umbrella package: it re-exports the core, table, blob and
//! queue crates and bundles a logging bootstrap.
//!
//! ```rust
//! use stowage::prelude::*;
//!
//! struct Visit;
//!
//! impl Model for Visit {
//!     const NAME: &'static str = "Visit";
//!     const KIND: StorageKind = StorageKind::Table;
//!
//!     fn define(schema: SchemaBuilder) -> SchemaBuilder {
//!         schema.partition_key("Site", "").row_key("Day", "").field("Count", 0)
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let mut tables = TableContext::new(StorageConfig::emulated(), MemoryTableBackend::new()).unwrap();
//! tables.register::<Visit>().await.unwrap();
//!
//! let mut visit = ModelInstance::<Visit>::with_overrides([("Site", "home"), ("Day", "2024-05-01")]).unwrap();
//! visit.set("Count", "12");
//! tables.insert(&mut visit).await.unwrap();
//!
//! assert!(!tables.is_empty::<Visit>("home", "").await.unwrap());
//! # });
//! ```

// Re-export all sub-packages as modules
pub use stowage_blob as blob;
pub use stowage_core as core;
pub use stowage_queue as queue;
pub use stowage_table as table;

// Re-export common types at root level for convenience
pub use stowage_blob::{Blob, BlobContext, BlobSource, MemoryBlobBackend};
pub use stowage_core::{
    ConfigError, EncryptionBinding, KeyCorrelation, Model, ModelInstance, Record,
    RelationshipQuery, SchemaBuilder, StorageConfig, StorageKind, StowageError, StowageResult,
    Value,
};
pub use stowage_queue::{MemoryQueueBackend, Message, QueueContext};
pub use stowage_table::{MemoryTableBackend, TableContext};

pub mod logging;
pub mod prelude;

/// Current version of stowage
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get stowage version
pub fn version() -> &'static str {
    VERSION
}
