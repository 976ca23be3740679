//! # stowage-blob
//!
//! Blob container mapping: each blob model owns one container, its fields
//! travel as blob metadata, and its content comes from text, a file or raw
//! bytes. Models may encrypt their whole content client-side.
//!
//! ## Quick Start
//!
//! ```rust
//! use stowage_blob::{Blob, BlobContext, MemoryBlobBackend};
//! use stowage_core::{Model, SchemaBuilder, StorageConfig, StorageKind};
//!
//! struct Document;
//!
//! impl Model for Document {
//!     const NAME: &'static str = "Document";
//!     const KIND: StorageKind = StorageKind::Blob;
//!
//!     fn define(schema: SchemaBuilder) -> SchemaBuilder {
//!         schema.field("Author", "").field("Pages", 0)
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let mut context = BlobContext::new(StorageConfig::emulated(), MemoryBlobBackend::new()).unwrap();
//! context.register::<Document>().await.unwrap();
//!
//! let mut blob = Blob::<Document>::named("readme.txt").unwrap().with_text("Hello, World!");
//! blob.set("Pages", 1);
//! context.upload(&mut blob).await.unwrap();
//!
//! let found = context.find::<Document>("readme.txt").await.unwrap().unwrap();
//! assert_eq!(found.text(), Some("Hello, World!"));
//! assert_eq!(found.get_as::<i64>("Pages"), Some(1));
//! # });
//! ```

pub mod backend;
pub mod backends;
pub mod blob;
pub mod content;
pub mod context;

pub use backend::{BlobBackend, ContentSettings, Metadata, StoredBlob};
pub use backends::MemoryBlobBackend;
pub use blob::{Blob, BlobSource};
pub use content::detect_content_type;
pub use context::BlobContext;
