//! # stowage-core
//!
//! Entity mapping core shared by the blob, queue and table contexts:
//! declarative model schemas, type-directed coercion of external values,
//! the per-context model registry and client-side encryption bindings.

pub mod backend;
pub mod config;
pub mod encryption;
pub mod error;
pub mod model;
pub mod naming;
pub mod registry;
pub mod relationship;
pub mod schema;
pub mod value;

pub use backend::{BackendError, BackendResult, StorageHandle};
pub use config::{ConfigError, ConfigSource, EnvConfig, StorageAccount, StorageConfig};
pub use encryption::{AesKeyWrapper, EncryptionBinding, KeyResolver, KeyWrapper, RsaKeyWrapper};
pub use error::{StowageError, StowageResult};
pub use model::{InstanceBuilder, Model, ModelInstance, Properties, Record, PARTITION_KEY, ROW_KEY};
pub use naming::{fits_convention, validate_storage_name};
pub use registry::{Registration, Registry};
pub use relationship::RelationshipQuery;
pub use schema::{
    schema_of, FieldRole, FieldSpec, KeyCorrelation, ModelRef, ModelSchema, RelationshipSpec,
    SchemaBuilder, StorageKind, FILTER_OPERATORS,
};
pub use value::{coerce, FieldType, FromValue, Value};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get crate version
pub fn version() -> &'static str {
    VERSION
}
