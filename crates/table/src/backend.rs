//! Table service abstraction

use async_trait::async_trait;
use stowage_core::{BackendResult, Properties, StorageHandle};

/// A table entity: a flat property bag carrying `PartitionKey` and `RowKey`
pub type Entity = Properties;

/// Table service operations used by the table context.
///
/// Every call receives the registration's [`StorageHandle`]; a handle with
/// an encryption binding asks the backend to encrypt the properties the
/// binding selects on write and to decrypt them on read.
#[async_trait]
pub trait TableBackend: Send + Sync {
    /// Create the table if it does not exist yet
    async fn create_table(&self, table: &StorageHandle) -> BackendResult<()>;

    /// Delete the table and every entity in it
    async fn delete_table(&self, table: &StorageHandle) -> BackendResult<()>;

    /// Fetch one entity; `NotFound` when the table or entity is missing
    async fn get_entity(
        &self,
        table: &StorageHandle,
        partition_key: &str,
        row_key: &str,
    ) -> BackendResult<Entity>;

    /// Write an entity, replacing any stored entity with the same keys
    async fn insert_or_replace_entity(&self, table: &StorageHandle, entity: Entity)
        -> BackendResult<()>;

    /// Write an entity, merging its properties into any stored entity
    async fn insert_or_merge_entity(&self, table: &StorageHandle, entity: Entity)
        -> BackendResult<()>;

    /// Delete one entity
    async fn delete_entity(
        &self,
        table: &StorageHandle,
        partition_key: &str,
        row_key: &str,
    ) -> BackendResult<()>;

    /// Entities matching `filter`, projected to `select` when given.
    ///
    /// An empty filter matches every entity.
    async fn query_entities(
        &self,
        table: &StorageHandle,
        filter: &str,
        select: Option<&[String]>,
        limit: Option<usize>,
    ) -> BackendResult<Vec<Entity>>;
}
