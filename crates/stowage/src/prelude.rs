//! # Prelude
//!
//! Convenient imports for declaring models and working with the contexts.
//!
//! ```rust
//! use stowage::prelude::*;
//! ```

// Model declaration
pub use stowage_core::{
    FieldType, FromValue, KeyCorrelation, Model, ModelInstance, Properties, Record,
    RelationshipQuery, SchemaBuilder, StorageKind, Value,
};

// Configuration and errors
pub use stowage_core::{
    BackendError, ConfigError, EnvConfig, StorageAccount, StorageConfig, StowageError,
    StowageResult,
};

// Contexts and reference backends
pub use stowage_blob::{Blob, BlobBackend, BlobContext, BlobSource, ContentSettings, MemoryBlobBackend};
pub use stowage_queue::{MemoryQueueBackend, Message, QueueBackend, QueueContext};
pub use stowage_table::{MemoryTableBackend, TableBackend, TableContext};

// Serialization
pub use serde::{Deserialize, Serialize};
pub use serde_json::json;

// Async traits
pub use async_trait::async_trait;
