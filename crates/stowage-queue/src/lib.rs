//! # stowage-queue
//!
//! Queue message mapping: each queue model owns one queue and its fields
//! travel as a JSON message payload. Retrieved messages keep their id and
//! pop receipt so they can be updated or deleted.
//!
//! ## Quick Start
//!
//! ```rust
//! use stowage_core::{Model, SchemaBuilder, StorageConfig, StorageKind};
//! use stowage_queue::{MemoryQueueBackend, Message, QueueContext};
//!
//! struct Job;
//!
//! impl Model for Job {
//!     const NAME: &'static str = "Job";
//!     const KIND: StorageKind = StorageKind::Queue;
//!
//!     fn define(schema: SchemaBuilder) -> SchemaBuilder {
//!         schema.field("task", "").field("attempt", 0)
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let mut context = QueueContext::new(StorageConfig::emulated(), MemoryQueueBackend::new()).unwrap();
//! context.register::<Job>().await.unwrap();
//!
//! let mut job = Message::<Job>::with_overrides([("task", "resize")]).unwrap();
//! context.put(&mut job).await.unwrap();
//!
//! let mut next = context.get::<Job>(None).await.unwrap().unwrap();
//! assert_eq!(next.get_as::<String>("task").as_deref(), Some("resize"));
//! assert!(context.delete(&mut next).await.unwrap());
//! # });
//! ```

pub mod backend;
pub mod backends;
pub mod context;
pub mod message;

pub use backend::{
    QueueBackend, QueueMessage, UpdatedMessage, DEFAULT_VISIBILITY_TIMEOUT, MESSAGE_TIME_TO_LIVE,
};
pub use backends::MemoryQueueBackend;
pub use context::QueueContext;
pub use message::Message;
