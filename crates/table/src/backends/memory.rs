//! In-memory table backend for development and testing

use crate::backend::{Entity, TableBackend};
use crate::filter::Filter;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use stowage_core::{
    BackendError, BackendResult, EncryptionBinding, StorageHandle, Value, PARTITION_KEY, ROW_KEY,
};

/// Property listing which properties of a stored entity are encrypted
pub const ENCRYPTION_METADATA: &str = "_ClientEncryptionMetadata";

type Table = BTreeMap<(String, String), Entity>;

/// In-memory table backend.
///
/// Applies client-side encryption the way an encrypting table client does:
/// properties selected by the handle's binding are sealed before they are
/// stored and opened again on read.
#[derive(Default)]
pub struct MemoryTableBackend {
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryTableBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.read().contains_key(name)
    }

    /// Stored entity exactly as persisted, encrypted properties included
    pub fn raw_entity(&self, table: &str, partition_key: &str, row_key: &str) -> Option<Entity> {
        self.tables
            .read()
            .get(table)
            .and_then(|t| t.get(&(partition_key.to_string(), row_key.to_string())))
            .cloned()
    }

    /// Number of entities stored in a table
    pub fn entity_count(&self, table: &str) -> usize {
        self.tables.read().get(table).map_or(0, |t| t.len())
    }

    fn keys_of(entity: &Entity) -> BackendResult<(String, String)> {
        let key = |name: &str| -> BackendResult<String> {
            match entity.get(name) {
                Some(Value::Text(text)) => Ok(text.clone()),
                Some(other) => Ok(other.to_string()),
                None => Err(BackendError::Service(format!("entity has no {}", name))),
            }
        };
        Ok((key(PARTITION_KEY)?, key(ROW_KEY)?))
    }

    fn encrypt(binding: &EncryptionBinding, keys: &(String, String), entity: Entity) -> BackendResult<Entity> {
        let mut sealed = Entity::new();
        let mut encrypted = Vec::new();
        for (name, value) in entity {
            if name != PARTITION_KEY
                && name != ROW_KEY
                && binding.should_encrypt(&keys.0, &keys.1, &name)
            {
                let envelope = binding
                    .seal_value(&value)
                    .map_err(|e| BackendError::Encryption(e.to_string()))?;
                sealed.insert(name.clone(), Value::Text(envelope));
                encrypted.push(name);
            } else {
                sealed.insert(name, value);
            }
        }
        if !encrypted.is_empty() {
            let metadata = serde_json::to_string(&encrypted)
                .map_err(|e| BackendError::Encryption(e.to_string()))?;
            sealed.insert(ENCRYPTION_METADATA.to_string(), Value::Text(metadata));
        }
        Ok(sealed)
    }

    fn decrypt(binding: Option<&EncryptionBinding>, mut entity: Entity) -> BackendResult<Entity> {
        let Some(Value::Text(metadata)) = entity.remove(ENCRYPTION_METADATA) else {
            return Ok(entity);
        };
        let Some(binding) = binding else {
            return Err(BackendError::Encryption(
                "entity holds encrypted properties but no key is registered".to_string(),
            ));
        };

        let names: BTreeSet<String> = serde_json::from_str(&metadata)
            .map_err(|e| BackendError::Encryption(format!("malformed encryption metadata: {}", e)))?;
        for name in names {
            if let Some(Value::Text(envelope)) = entity.get(&name) {
                let value = binding
                    .open_value(envelope)
                    .map_err(|e| BackendError::Encryption(e.to_string()))?;
                entity.insert(name, value);
            }
        }
        Ok(entity)
    }

    fn project(entity: Entity, select: Option<&[String]>) -> Entity {
        match select {
            None => entity,
            Some(fields) => entity
                .into_iter()
                .filter(|(name, _)| fields.iter().any(|f| f == name))
                .collect(),
        }
    }

    fn write(&self, table: &StorageHandle, entity: Entity, merge: bool) -> BackendResult<()> {
        let keys = Self::keys_of(&entity)?;
        let mut tables = self.tables.write();
        let stored = tables
            .get_mut(table.name())
            .ok_or_else(|| BackendError::NotFound(format!("table {}", table.name())))?;

        let entity = match (merge, stored.get(&keys)) {
            (true, Some(existing)) => {
                let mut merged = Self::decrypt(table.encryption(), existing.clone())?;
                merged.extend(entity);
                merged
            }
            _ => entity,
        };
        let entity = match table.encryption() {
            Some(binding) => Self::encrypt(binding, &keys, entity)?,
            None => entity,
        };
        stored.insert(keys, entity);
        Ok(())
    }
}

#[async_trait]
impl TableBackend for MemoryTableBackend {
    async fn create_table(&self, table: &StorageHandle) -> BackendResult<()> {
        self.tables
            .write()
            .entry(table.name().to_string())
            .or_default();
        Ok(())
    }

    async fn delete_table(&self, table: &StorageHandle) -> BackendResult<()> {
        self.tables
            .write()
            .remove(table.name())
            .map(|_| ())
            .ok_or_else(|| BackendError::NotFound(format!("table {}", table.name())))
    }

    async fn get_entity(
        &self,
        table: &StorageHandle,
        partition_key: &str,
        row_key: &str,
    ) -> BackendResult<Entity> {
        let stored = {
            let tables = self.tables.read();
            let rows = tables
                .get(table.name())
                .ok_or_else(|| BackendError::NotFound(format!("table {}", table.name())))?;
            rows.get(&(partition_key.to_string(), row_key.to_string()))
                .cloned()
                .ok_or_else(|| {
                    BackendError::NotFound(format!(
                        "entity ({}, {}) in table {}",
                        partition_key,
                        row_key,
                        table.name()
                    ))
                })?
        };
        Self::decrypt(table.encryption(), stored)
    }

    async fn insert_or_replace_entity(&self, table: &StorageHandle, entity: Entity) -> BackendResult<()> {
        self.write(table, entity, false)
    }

    async fn insert_or_merge_entity(&self, table: &StorageHandle, entity: Entity) -> BackendResult<()> {
        self.write(table, entity, true)
    }

    async fn delete_entity(
        &self,
        table: &StorageHandle,
        partition_key: &str,
        row_key: &str,
    ) -> BackendResult<()> {
        let mut tables = self.tables.write();
        let rows = tables
            .get_mut(table.name())
            .ok_or_else(|| BackendError::NotFound(format!("table {}", table.name())))?;
        rows.remove(&(partition_key.to_string(), row_key.to_string()))
            .map(|_| ())
            .ok_or_else(|| {
                BackendError::NotFound(format!(
                    "entity ({}, {}) in table {}",
                    partition_key,
                    row_key,
                    table.name()
                ))
            })
    }

    async fn query_entities(
        &self,
        table: &StorageHandle,
        filter: &str,
        select: Option<&[String]>,
        limit: Option<usize>,
    ) -> BackendResult<Vec<Entity>> {
        let filter = Filter::parse(filter)?;
        let rows: Vec<Entity> = {
            let tables = self.tables.read();
            tables
                .get(table.name())
                .ok_or_else(|| BackendError::NotFound(format!("table {}", table.name())))?
                .values()
                .cloned()
                .collect()
        };

        let mut matched = Vec::new();
        for row in rows {
            if limit.is_some_and(|limit| matched.len() >= limit) {
                break;
            }
            let row = Self::decrypt(table.encryption(), row)?;
            if filter.matches(&row) {
                matched.push(Self::project(row, select));
            }
        }
        Ok(matched)
    }
}
