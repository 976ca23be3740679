//! # stowage-table
//!
//! Table entity mapping: models with a composite partition/row key,
//! client-side encryption of selected properties and one-to-many
//! relationships resolved through key-correlated queries.
//!
//! ## Quick Start
//!
//! ```rust
//! use stowage_core::{Model, ModelInstance, SchemaBuilder, StorageConfig, StorageKind};
//! use stowage_table::{MemoryTableBackend, TableContext};
//!
//! struct TableOne;
//!
//! impl Model for TableOne {
//!     const NAME: &'static str = "TableOne";
//!     const KIND: StorageKind = StorageKind::Table;
//!
//!     fn define(schema: SchemaBuilder) -> SchemaBuilder {
//!         schema.partition_key("Id", "").row_key("Id2", "").field("Name", "")
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let mut context = TableContext::new(StorageConfig::emulated(), MemoryTableBackend::new()).unwrap();
//! context.register::<TableOne>().await.unwrap();
//!
//! let mut entity = ModelInstance::<TableOne>::builder()
//!     .set("Id", "first")
//!     .set("Id2", "row")
//!     .set("Name", "Ada")
//!     .build()
//!     .unwrap();
//! context.insert(&mut entity).await.unwrap();
//!
//! let found = context.find::<TableOne>("first", "row").await.unwrap().unwrap();
//! assert_eq!(found.get_as::<String>("Name").as_deref(), Some("Ada"));
//! # });
//! ```

pub mod backend;
pub mod backends;
pub mod context;
pub mod filter;

pub use backend::{Entity, TableBackend};
pub use backends::MemoryTableBackend;
pub use context::TableContext;
pub use filter::{Filter, FilterCondition, FilterOperator};
