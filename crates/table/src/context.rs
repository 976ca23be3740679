//! Table context: registration and entity operations for table models

use crate::backend::TableBackend;
use stowage_core::{
    BackendError, Model, ModelInstance, Record, Registry, RelationshipQuery, StorageAccount,
    StorageConfig, StorageKind, StowageError, StowageResult, PARTITION_KEY,
};

/// Maps table models onto a table service.
///
/// `register` and `unregister` take `&mut self`; every data operation
/// first resolves the model's registration and fails with
/// [`StowageError::ModelNotRegistered`] when there is none. A missing
/// table or entity on a read resolves to `exists = false` or an empty
/// result instead of an error.
pub struct TableContext<B: TableBackend> {
    config: StorageConfig,
    account: StorageAccount,
    backend: B,
    registry: Registry,
}

impl<B: TableBackend> TableContext<B> {
    /// Create a context, failing immediately on invalid credentials
    pub fn new(config: StorageConfig, backend: B) -> StowageResult<Self> {
        let account = config.storage_account()?;
        Ok(Self {
            config,
            account,
            backend,
            registry: Registry::new(StorageKind::Table),
        })
    }

    pub fn account(&self) -> &StorageAccount {
        &self.account
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn is_registered<M: Model>(&self) -> bool {
        self.registry.get::<M>().is_ok()
    }

    /// Register `M` and create its table.
    ///
    /// Registering an already registered model does nothing.
    pub async fn register<M: Model>(&mut self) -> StowageResult<()> {
        let Some(registration) = self.registry.plan::<M>(&self.config)? else {
            tracing::info!(
                "model {} already registered. Models are {:?}",
                M::NAME,
                self.registry.model_names()
            );
            return Ok(());
        };

        if let Err(e) = self.backend.create_table(registration.handle()).await {
            tracing::error!("failed to create table {}: {}", registration.storage_name(), e);
            return Err(e.into());
        }

        self.registry.insert::<M>(registration)?;
        tracing::info!(
            "model {} registered successfully. Models are {:?}",
            M::NAME,
            self.registry.model_names()
        );
        Ok(())
    }

    /// Unregister `M`, optionally deleting its table
    pub async fn unregister<M: Model>(&mut self, delete_table: bool) -> StowageResult<()> {
        let registration = self.registry.remove::<M>()?;
        tracing::info!(
            "model {} unregistered. Models are {:?}",
            M::NAME,
            self.registry.model_names()
        );

        if delete_table {
            match self.backend.delete_table(registration.handle()).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {
                    tracing::debug!("table {} was already gone: {}", registration.storage_name(), e);
                }
                Err(e) => {
                    tracing::error!("failed to delete table {}: {}", registration.storage_name(), e);
                    return Err(e.into());
                }
            }
        }
        Ok(())
    }

    /// Whether the instance's entity is stored.
    ///
    /// A previously resolved existence flag is returned without a backend call.
    pub async fn exists<M: Model>(&self, instance: &mut ModelInstance<M>) -> StowageResult<bool> {
        let registration = self.registry.get::<M>()?;
        if let Some(exists) = instance.exists() {
            return Ok(exists);
        }

        let (pk, rk) = (instance.partition_key(), instance.row_key());
        match self.backend.get_entity(registration.handle(), &pk, &rk).await {
            Ok(_) => instance.mark_exists(true),
            Err(e) if e.is_not_found() => instance.mark_exists(false),
            Err(e) => return Err(surface(e, "test", registration.storage_name(), &pk, &rk)),
        }
        Ok(instance.exists() == Some(true))
    }

    /// Load the stored entity into the instance. Returns whether it was found.
    pub async fn get<M: Model>(&self, instance: &mut ModelInstance<M>) -> StowageResult<bool> {
        let registration = self.registry.get::<M>()?;
        let (pk, rk) = (instance.partition_key(), instance.row_key());

        match self.backend.get_entity(registration.handle(), &pk, &rk).await {
            Ok(stored) => {
                instance.merge_fill(&stored);
                instance.mark_exists(true);
                Ok(true)
            }
            Err(e) if e.is_not_found() => {
                tracing::debug!(
                    "can not get table entity: Table {}, PartitionKey {}, RowKey {} because {}",
                    registration.storage_name(),
                    pk,
                    rk,
                    e
                );
                instance.mark_exists(false);
                Ok(false)
            }
            Err(e) => Err(surface(e, "get", registration.storage_name(), &pk, &rk)),
        }
    }

    /// Insert or replace the instance's entity
    pub async fn insert<M: Model>(&self, instance: &mut ModelInstance<M>) -> StowageResult<()> {
        let registration = self.registry.get::<M>()?;
        let (pk, rk) = (instance.partition_key(), instance.row_key());

        match self
            .backend
            .insert_or_replace_entity(registration.handle(), instance.entity())
            .await
        {
            Ok(()) => {
                instance.mark_exists(true);
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                tracing::debug!(
                    "can not insert or replace table entity: Table {}, PartitionKey {}, RowKey {} because {}",
                    registration.storage_name(),
                    pk,
                    rk,
                    e
                );
                instance.mark_exists(false);
                Ok(())
            }
            Err(e) => {
                instance.mark_exists(false);
                Err(surface(e, "insert or replace", registration.storage_name(), &pk, &rk))
            }
        }
    }

    /// Merge the instance into its stored entity.
    ///
    /// Fields still at their schema default count as "not supplied" and take
    /// the stored value; the result replaces the stored entity. The read and
    /// the write are not atomic. Without a stored entity nothing is written
    /// and the instance is marked as not existing.
    pub async fn merge<M: Model>(&self, instance: &mut ModelInstance<M>) -> StowageResult<()> {
        let registration = self.registry.get::<M>()?;
        let handle = registration.handle();
        let (pk, rk) = (instance.partition_key(), instance.row_key());

        let written = match self.backend.get_entity(handle, &pk, &rk).await {
            Ok(stored) => {
                instance.fill_unset(&stored);
                self.backend
                    .insert_or_replace_entity(handle, instance.entity())
                    .await
            }
            Err(e) => Err(e),
        };

        match written {
            Ok(()) => {
                instance.mark_exists(true);
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                tracing::debug!(
                    "can not merge table entity: Table {}, PartitionKey {}, RowKey {} because {}",
                    registration.storage_name(),
                    pk,
                    rk,
                    e
                );
                instance.mark_exists(false);
                Ok(())
            }
            Err(e) => Err(surface(e, "merge", registration.storage_name(), &pk, &rk)),
        }
    }

    /// Delete the instance's entity
    pub async fn delete<M: Model>(&self, instance: &mut ModelInstance<M>) -> StowageResult<()> {
        let registration = self.registry.get::<M>()?;
        let (pk, rk) = (instance.partition_key(), instance.row_key());

        match self
            .backend
            .delete_entity(registration.handle(), &pk, &rk)
            .await
        {
            Ok(()) => {
                instance.mark_exists(false);
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                tracing::debug!(
                    "can not delete table entity: Table {}, PartitionKey {}, RowKey {} because {}",
                    registration.storage_name(),
                    pk,
                    rk,
                    e
                );
                instance.mark_exists(false);
                Ok(())
            }
            Err(e) => Err(surface(e, "delete", registration.storage_name(), &pk, &rk)),
        }
    }

    /// Resolve a relationship query against its target model's table.
    ///
    /// Returns the number of records the query now holds.
    pub async fn query(&self, query: &mut RelationshipQuery) -> StowageResult<usize> {
        let registration = self.registry.lookup(&query.target())?;
        let filter = query.query_filter();

        match self
            .backend
            .query_entities(registration.handle(), &filter, query.selected(), None)
            .await
        {
            Ok(rows) => {
                let schema = registration.schema();
                query.populate(
                    rows.iter()
                        .map(|row| Record::from_stored(schema.clone(), row))
                        .collect(),
                );
            }
            Err(e) if e.is_not_found() => {
                tracing::debug!(
                    "can not query table {} with filters {} because {}",
                    registration.storage_name(),
                    filter,
                    e
                );
                query.populate(Vec::new());
            }
            Err(e) => {
                tracing::error!(
                    "can not query table {} with filters {} because {}",
                    registration.storage_name(),
                    filter,
                    e
                );
                return Err(e.into());
            }
        }
        Ok(query.len())
    }

    /// Resolve the relationship `name` of an instance
    pub async fn query_relationship<M: Model>(
        &self,
        instance: &mut ModelInstance<M>,
        name: &str,
    ) -> StowageResult<usize> {
        self.registry.get::<M>()?;
        let query = instance
            .relationship_mut(name)
            .ok_or_else(|| StowageError::schema(M::NAME, format!("no relationship named '{}'", name)))?;
        self.query(query).await
    }

    /// Load the entity with the given keys, if stored
    pub async fn find<M: Model>(
        &self,
        partition_key: &str,
        row_key: &str,
    ) -> StowageResult<Option<ModelInstance<M>>> {
        let registration = self.registry.get::<M>()?;
        match self
            .backend
            .get_entity(registration.handle(), partition_key, row_key)
            .await
        {
            Ok(stored) => {
                let record = Record::from_stored(registration.schema().clone(), &stored);
                ModelInstance::from_record(record).map(Some)
            }
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(surface(e, "find", registration.storage_name(), partition_key, row_key)),
        }
    }

    /// Whether no entity matches the given keys.
    ///
    /// Empty keys are not filtered on, so `is_empty::<M>("", "")` checks the
    /// whole table. A missing table counts as empty.
    pub async fn is_empty<M: Model>(&self, partition_key: &str, row_key: &str) -> StowageResult<bool> {
        let registration = self.registry.get::<M>()?;
        let filter = RelationshipQuery::new::<M>()
            .partition("eq", partition_key)
            .row("eq", row_key)
            .query_filter();
        let select = [PARTITION_KEY.to_string()];

        match self
            .backend
            .query_entities(registration.handle(), &filter, Some(&select), Some(1))
            .await
        {
            Ok(rows) => Ok(rows.is_empty()),
            Err(e) if e.is_not_found() => {
                tracing::debug!("failed to query {} with error {}", registration.storage_name(), e);
                Ok(true)
            }
            Err(e) => {
                tracing::error!("failed to query {} with error {}", registration.storage_name(), e);
                Err(e.into())
            }
        }
    }
}

fn surface(error: BackendError, action: &str, table: &str, pk: &str, rk: &str) -> StowageError {
    tracing::error!(
        "can not {} table entity: Table {}, PartitionKey {}, RowKey {} because {}",
        action,
        table,
        pk,
        rk,
        error
    );
    error.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MemoryTableBackend;
    use stowage_core::{KeyCorrelation, SchemaBuilder, Value};

    struct TableOne;

    impl Model for TableOne {
        const NAME: &'static str = "TableOne";
        const KIND: StorageKind = StorageKind::Table;

        fn define(schema: SchemaBuilder) -> SchemaBuilder {
            schema
                .partition_key("Id", "")
                .row_key("Id2", "")
                .encrypted("Secret", "")
                .field("NonSecret", "")
                .relationship::<TableTwo>("Rows", KeyCorrelation::new().partition("eq", "Id2"))
        }
    }

    struct TableTwo;

    impl Model for TableTwo {
        const NAME: &'static str = "TableTwo";
        const KIND: StorageKind = StorageKind::Table;

        fn define(schema: SchemaBuilder) -> SchemaBuilder {
            schema
                .partition_key("Id", "")
                .row_key("Id2", "")
                .field("Rank", 0)
        }
    }

    struct Ab;

    impl Model for Ab {
        const NAME: &'static str = "Ab";
        const KIND: StorageKind = StorageKind::Table;

        fn define(schema: SchemaBuilder) -> SchemaBuilder {
            schema.partition_key("Id", "").row_key("Id2", "")
        }
    }

    fn config() -> StorageConfig {
        StorageConfig::emulated().with_encryption_key("key1", "supersecret")
    }

    async fn context() -> TableContext<MemoryTableBackend> {
        let mut context = TableContext::new(config(), MemoryTableBackend::new()).unwrap();
        context.register::<TableOne>().await.unwrap();
        context.register::<TableTwo>().await.unwrap();
        context
    }

    fn table_one(id: &str, id2: &str, secret: &str, non_secret: &str) -> ModelInstance<TableOne> {
        ModelInstance::builder()
            .set("Id", id)
            .set("Id2", id2)
            .set("Secret", secret)
            .set("NonSecret", non_secret)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_invalid_config_fails_construction() {
        let result = TableContext::new(StorageConfig::default(), MemoryTableBackend::new());
        assert!(matches!(result, Err(StowageError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_register_is_idempotent() {
        let mut context = context().await;
        context.register::<TableOne>().await.unwrap();
        assert_eq!(context.registry().model_names(), vec!["TableOne", "TableTwo"]);
        assert!(context.backend().has_table("TableOne"));
    }

    #[tokio::test]
    async fn test_short_table_name_rejected() {
        let mut context = context().await;
        let err = context.register::<Ab>().await.unwrap_err();
        assert!(matches!(err, StowageError::NameConvention { ref name, .. } if name == "Ab"));
        assert!(!context.is_registered::<Ab>());
    }

    #[tokio::test]
    async fn test_unregister() {
        let mut context = context().await;
        context.unregister::<TableTwo>(true).await.unwrap();
        assert!(!context.backend().has_table("TableTwo"));

        let err = context.unregister::<TableTwo>(false).await.unwrap_err();
        assert!(matches!(err, StowageError::ModelNotRegistered { .. }));

        let mut instance = ModelInstance::<TableTwo>::new().unwrap();
        assert!(matches!(
            context.insert(&mut instance).await,
            Err(StowageError::ModelNotRegistered { .. })
        ));
    }

    #[tokio::test]
    async fn test_insert_get_round_trip() {
        let context = context().await;
        let mut instance = table_one("first", "row", "Secret message", "plain");
        assert!(!context.exists(&mut instance).await.unwrap());

        let mut instance = table_one("first", "row", "Secret message", "plain");
        context.insert(&mut instance).await.unwrap();
        assert_eq!(instance.exists(), Some(true));

        let mut loaded = table_one("first", "row", "", "");
        assert!(context.get(&mut loaded).await.unwrap());
        assert_eq!(loaded.get("Secret"), Some(&Value::from("Secret message")));
        assert_eq!(loaded.get("NonSecret"), Some(&Value::from("plain")));

        let raw = context.backend().raw_entity("TableOne", "first", "row").unwrap();
        assert_ne!(raw.get("Secret"), Some(&Value::from("Secret message")));
    }

    #[tokio::test]
    async fn test_get_missing_entity() {
        let context = context().await;
        let mut instance = table_one("nobody", "row", "", "");
        assert!(!context.get(&mut instance).await.unwrap());
        assert_eq!(instance.exists(), Some(false));
        assert!(context.find::<TableOne>("nobody", "row").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_merge_keeps_stored_values_for_defaults() {
        let context = context().await;
        let mut first = table_one("merge", "row", "S", "");
        context.insert(&mut first).await.unwrap();

        let mut second = table_one("merge", "row", "", "N");
        context.merge(&mut second).await.unwrap();

        let merged = context.find::<TableOne>("merge", "row").await.unwrap().unwrap();
        assert_eq!(merged.get_as::<String>("Secret").as_deref(), Some("S"));
        assert_eq!(merged.get_as::<String>("NonSecret").as_deref(), Some("N"));
    }

    #[tokio::test]
    async fn test_merge_without_stored_entity_writes_nothing() {
        let context = context().await;
        let mut instance = table_one("fresh", "row", "", "N");
        context.merge(&mut instance).await.unwrap();
        assert_eq!(instance.exists(), Some(false));
        assert!(context.find::<TableOne>("fresh", "row").await.unwrap().is_none());
        assert!(context.backend().raw_entity("TableOne", "fresh", "row").is_none());
    }

    #[tokio::test]
    async fn test_delete() {
        let context = context().await;
        let mut instance = table_one("gone", "row", "", "");
        context.insert(&mut instance).await.unwrap();
        context.delete(&mut instance).await.unwrap();
        assert_eq!(instance.exists(), Some(false));

        // deleting twice is not an error
        context.delete(&mut instance).await.unwrap();
        assert!(context.is_empty::<TableOne>("gone", "row").await.unwrap());
    }

    #[tokio::test]
    async fn test_relationship_query() {
        let context = context().await;
        for pk in ["First", "Second"] {
            for i in 0..10 {
                let mut row = ModelInstance::<TableTwo>::builder()
                    .set("Id", pk)
                    .set("Id2", i.to_string())
                    .set("Rank", i)
                    .build()
                    .unwrap();
                context.insert(&mut row).await.unwrap();
            }
        }

        let mut parent = table_one("parent", "Second", "", "");
        let count = context.query_relationship(&mut parent, "Rows").await.unwrap();
        assert_eq!(count, 10);

        let rows = parent.relationship_mut("Rows").unwrap();
        rows.filter("Rank", &[Value::from(1), Value::from(2)]);
        assert_eq!(rows.len(), 2);

        assert!(!context.is_empty::<TableTwo>("First", "").await.unwrap());
        assert!(context.is_empty::<TableTwo>("Third", "").await.unwrap());
    }

    #[tokio::test]
    async fn test_get_and_merge_keep_resolved_relationship() {
        let context = context().await;
        for i in 0..3 {
            let mut row = ModelInstance::<TableTwo>::builder()
                .set("Id", "k")
                .set("Id2", i.to_string())
                .build()
                .unwrap();
            context.insert(&mut row).await.unwrap();
        }

        let mut parent = table_one("parent", "k", "s", "n");
        context.insert(&mut parent).await.unwrap();
        assert_eq!(context.query_relationship(&mut parent, "Rows").await.unwrap(), 3);

        assert!(context.get(&mut parent).await.unwrap());
        assert_eq!(parent.relationship("Rows").unwrap().len(), 3);

        context.merge(&mut parent).await.unwrap();
        assert_eq!(parent.relationship("Rows").unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_query_requires_target_registration() {
        let mut context = context().await;
        context.unregister::<TableTwo>(false).await.unwrap();

        let mut query = RelationshipQuery::new::<TableTwo>();
        let err = context.query(&mut query).await.unwrap_err();
        assert!(matches!(err, StowageError::ModelNotRegistered { .. }));
    }

    #[tokio::test]
    async fn test_query_on_deleted_table_is_empty() {
        let context = context().await;
        context
            .backend()
            .delete_table(context.registry().get::<TableTwo>().unwrap().handle())
            .await
            .unwrap();

        let mut query = RelationshipQuery::new::<TableTwo>().partition("eq", "First");
        assert_eq!(context.query(&mut query).await.unwrap(), 0);
    }
}
