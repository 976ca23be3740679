//! Model schema descriptors
//!
//! A model type declares its fields once through [`SchemaBuilder`]; the
//! resulting [`ModelSchema`] is validated, cached per type and never
//! mutated afterwards. Field roles (partition key, row key, encrypted,
//! relationship) are explicit declarations rather than wrapper values.

use crate::error::{StowageError, StowageResult};
use crate::model::Model;
use crate::value::{coerce, FieldType, Value};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::any::TypeId;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

/// Comparison operators accepted in key correlations and filters
pub const FILTER_OPERATORS: [&str; 6] = ["eq", "ne", "gt", "ge", "lt", "le"];

/// The three storage resource kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageKind {
    Blob,
    Queue,
    Table,
}

impl StorageKind {
    /// Storage name used when a model does not declare one: tables keep the
    /// model name verbatim, containers and queues lower-case it.
    pub fn default_storage_name(self, model_name: &str) -> String {
        match self {
            StorageKind::Table => model_name.to_string(),
            StorageKind::Blob | StorageKind::Queue => model_name.to_lowercase(),
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageKind::Blob => f.write_str("container"),
            StorageKind::Queue => f.write_str("queue"),
            StorageKind::Table => f.write_str("table"),
        }
    }
}

/// Role a declared field plays in storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldRole {
    Plain,
    PartitionKey,
    RowKey,
    EncryptKey,
    Relationship,
}

/// A persisted field: name, declared type, default and role
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: FieldType,
    pub default: Value,
    pub role: FieldRole,
}

/// Reference to a model type, usable without naming the type statically
#[derive(Clone, Copy)]
pub struct ModelRef {
    type_id: TypeId,
    name: &'static str,
    schema: fn() -> StowageResult<Arc<ModelSchema>>,
}

impl ModelRef {
    pub fn of<M: Model>() -> Self {
        Self {
            type_id: TypeId::of::<M>(),
            name: M::NAME,
            schema: schema_of::<M>,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn schema(&self) -> StowageResult<Arc<ModelSchema>> {
        (self.schema)()
    }

    pub fn is<M: Model>(&self) -> bool {
        self.type_id == TypeId::of::<M>()
    }
}

impl fmt::Debug for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ModelRef").field(&self.name).finish()
    }
}

impl PartialEq for ModelRef {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ModelRef {}

/// How a relationship correlates the source instance's field values with
/// the target table's partition and row keys
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyCorrelation {
    pub partition_condition: String,
    pub partition_foreign_key: String,
    pub row_condition: String,
    pub row_foreign_key: String,
}

impl KeyCorrelation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Match the target's PartitionKey against a field of the source
    pub fn partition(mut self, condition: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        self.partition_condition = condition.into();
        self.partition_foreign_key = foreign_key.into();
        self
    }

    /// Match the target's RowKey against a field of the source
    pub fn row(mut self, condition: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        self.row_condition = condition.into();
        self.row_foreign_key = foreign_key.into();
        self
    }
}

/// A declared one-to-many relationship to another table model
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipSpec {
    pub name: String,
    pub target: ModelRef,
    pub correlation: KeyCorrelation,
}

/// Immutable per-type schema
#[derive(Debug, Clone)]
pub struct ModelSchema {
    model_name: &'static str,
    kind: StorageKind,
    storage_name: String,
    fields: Vec<FieldSpec>,
    relationships: Vec<RelationshipSpec>,
    date_format: Option<String>,
    datetime_format: Option<String>,
    encrypt_payload: bool,
}

impl ModelSchema {
    pub fn model_name(&self) -> &'static str {
        self.model_name
    }

    pub fn kind(&self) -> StorageKind {
        self.kind
    }

    /// Container, queue or table name
    pub fn storage_name(&self) -> &str {
        &self.storage_name
    }

    /// Persisted fields in declaration order
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn relationships(&self) -> &[RelationshipSpec] {
        &self.relationships
    }

    pub fn relationship(&self, name: &str) -> Option<&RelationshipSpec> {
        self.relationships.iter().find(|r| r.name == name)
    }

    pub fn role_of(&self, name: &str) -> Option<FieldRole> {
        self.field(name)
            .map(|f| f.role)
            .or_else(|| self.relationship(name).map(|_| FieldRole::Relationship))
    }

    pub fn partition_key_field(&self) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.role == FieldRole::PartitionKey)
    }

    pub fn row_key_field(&self) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.role == FieldRole::RowKey)
    }

    /// Names of the fields encrypted client-side (table models)
    pub fn encrypted_fields(&self) -> BTreeSet<String> {
        self.fields
            .iter()
            .filter(|f| f.role == FieldRole::EncryptKey)
            .map(|f| f.name.clone())
            .collect()
    }

    /// Whole-payload encryption flag (blob and queue models)
    pub fn encrypts_payload(&self) -> bool {
        self.encrypt_payload
    }

    pub fn date_format(&self) -> Option<&str> {
        self.date_format.as_deref()
    }

    pub fn datetime_format(&self) -> Option<&str> {
        self.datetime_format.as_deref()
    }

    /// Coerce an external value into a field's declared type
    pub fn coerce_field(&self, field: &FieldSpec, value: &Value) -> Value {
        let format = match (field.field_type, value) {
            (FieldType::Date, _) | (FieldType::Text, Value::Date(_)) => self.date_format(),
            (FieldType::DateTime, _) | (FieldType::Text, Value::DateTime(_)) => self.datetime_format(),
            _ => None,
        };
        coerce(value, field.field_type, &field.default, format)
    }

    /// Render a value as text using this model's date formats
    pub fn render(&self, value: &Value) -> Option<String> {
        value.render(
            self.date_format().unwrap_or(crate::value::DEFAULT_DATE_FORMAT),
            self.datetime_format().unwrap_or(crate::value::DEFAULT_DATETIME_FORMAT),
        )
    }

    /// Names starting with an underscore are bookkeeping, never data
    pub fn is_private(name: &str) -> bool {
        name.is_empty() || name.starts_with('_')
    }
}

/// Collects a model's field declarations
#[derive(Debug)]
pub struct SchemaBuilder {
    model_name: &'static str,
    kind: StorageKind,
    storage_name: Option<String>,
    fields: Vec<FieldSpec>,
    relationships: Vec<RelationshipSpec>,
    date_format: Option<String>,
    datetime_format: Option<String>,
    encrypt_payload: bool,
    errors: Vec<String>,
}

impl SchemaBuilder {
    pub fn new(model_name: &'static str, kind: StorageKind) -> Self {
        Self {
            model_name,
            kind,
            storage_name: None,
            fields: Vec::new(),
            relationships: Vec::new(),
            date_format: None,
            datetime_format: None,
            encrypt_payload: false,
            errors: Vec::new(),
        }
    }

    /// Override the container, queue or table name
    pub fn storage_name(mut self, name: impl Into<String>) -> Self {
        self.storage_name = Some(name.into());
        self
    }

    /// strftime pattern for date fields
    pub fn date_format(mut self, format: impl Into<String>) -> Self {
        self.date_format = Some(format.into());
        self
    }

    /// strftime pattern for date-time fields
    pub fn datetime_format(mut self, format: impl Into<String>) -> Self {
        self.datetime_format = Some(format.into());
        self
    }

    /// Encrypt the whole blob content or message payload
    pub fn encrypt_payload(mut self) -> Self {
        self.encrypt_payload = true;
        self
    }

    pub fn field(self, name: &str, default: impl Into<Value>) -> Self {
        self.declare(name, default.into(), FieldRole::Plain)
    }

    pub fn partition_key(self, name: &str, default: impl Into<Value>) -> Self {
        self.declare(name, default.into(), FieldRole::PartitionKey)
    }

    pub fn row_key(self, name: &str, default: impl Into<Value>) -> Self {
        self.declare(name, default.into(), FieldRole::RowKey)
    }

    /// A field encrypted client-side before it reaches the table service
    pub fn encrypted(self, name: &str, default: impl Into<Value>) -> Self {
        self.declare(name, default.into(), FieldRole::EncryptKey)
    }

    /// A one-to-many relationship to table model `T`
    pub fn relationship<T: Model>(mut self, name: &str, correlation: KeyCorrelation) -> Self {
        if ModelSchema::is_private(name) {
            tracing::debug!("skipping private relationship {} on model {}", name, self.model_name);
            return self;
        }
        self.relationships.push(RelationshipSpec {
            name: name.to_string(),
            target: ModelRef::of::<T>(),
            correlation,
        });
        self
    }

    fn declare(mut self, name: &str, default: Value, role: FieldRole) -> Self {
        if ModelSchema::is_private(name) {
            tracing::debug!("skipping private field {} on model {}", name, self.model_name);
            return self;
        }
        match default.field_type() {
            Some(field_type) => self.fields.push(FieldSpec {
                name: name.to_string(),
                field_type,
                default,
                role,
            }),
            None => self
                .errors
                .push(format!("field '{}' needs a typed default value", name)),
        }
        self
    }

    /// Validate the declarations and produce the schema
    pub fn build(self) -> StowageResult<ModelSchema> {
        let model = self.model_name;
        if let Some(message) = self.errors.into_iter().next() {
            return Err(StowageError::schema(model, message));
        }

        let mut seen = HashSet::new();
        let names = self
            .fields
            .iter()
            .map(|f| f.name.as_str())
            .chain(self.relationships.iter().map(|r| r.name.as_str()));
        for name in names {
            if !seen.insert(name) {
                return Err(StowageError::schema(model, format!("field '{}' is declared twice", name)));
            }
        }

        let count = |role: FieldRole| self.fields.iter().filter(|f| f.role == role).count();
        let (partition_keys, row_keys, encrypted) = (
            count(FieldRole::PartitionKey),
            count(FieldRole::RowKey),
            count(FieldRole::EncryptKey),
        );
        if partition_keys > 1 || row_keys > 1 {
            return Err(StowageError::schema(
                model,
                "at most one partition key and one row key may be declared",
            ));
        }

        if self.kind == StorageKind::Table {
            if partition_keys == 0 || row_keys == 0 {
                return Err(StowageError::schema(
                    model,
                    "table models need exactly one partition key and one row key",
                ));
            }
            if self.encrypt_payload {
                return Err(StowageError::schema(
                    model,
                    "table models encrypt individual fields, not the whole payload",
                ));
            }
        } else if partition_keys + row_keys + encrypted > 0 || !self.relationships.is_empty() {
            return Err(StowageError::schema(
                model,
                format!(
                    "key, encrypted and relationship fields are only supported on table models, not on a {}",
                    self.kind
                ),
            ));
        }

        for relationship in &self.relationships {
            let correlation = &relationship.correlation;
            let sides = [
                (&correlation.partition_condition, &correlation.partition_foreign_key),
                (&correlation.row_condition, &correlation.row_foreign_key),
            ];
            for (condition, foreign_key) in sides {
                if foreign_key.is_empty() {
                    continue;
                }
                if !FILTER_OPERATORS.contains(&condition.as_str()) {
                    return Err(StowageError::schema(
                        model,
                        format!(
                            "relationship '{}' uses unknown condition '{}'",
                            relationship.name, condition
                        ),
                    ));
                }
                if !self.fields.iter().any(|f| &f.name == foreign_key) {
                    return Err(StowageError::schema(
                        model,
                        format!(
                            "relationship '{}' refers to unknown field '{}'",
                            relationship.name, foreign_key
                        ),
                    ));
                }
            }
        }

        Ok(ModelSchema {
            model_name: model,
            kind: self.kind,
            storage_name: self
                .storage_name
                .unwrap_or_else(|| self.kind.default_storage_name(model)),
            fields: self.fields,
            relationships: self.relationships,
            date_format: self.date_format,
            datetime_format: self.datetime_format,
            encrypt_payload: self.encrypt_payload,
        })
    }
}

static SCHEMAS: Lazy<DashMap<TypeId, Arc<ModelSchema>>> = Lazy::new(DashMap::new);

/// The cached schema of model type `M`, derived on first use
pub fn schema_of<M: Model>() -> StowageResult<Arc<ModelSchema>> {
    let type_id = TypeId::of::<M>();
    if let Some(schema) = SCHEMAS.get(&type_id) {
        return Ok(Arc::clone(schema.value()));
    }

    let schema = Arc::new(M::define(SchemaBuilder::new(M::NAME, M::KIND)).build()?);
    let cached = SCHEMAS.entry(type_id).or_insert(schema);
    Ok(Arc::clone(cached.value()))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Child;

    impl Model for Child {
        const NAME: &'static str = "Child";
        const KIND: StorageKind = StorageKind::Table;

        fn define(schema: SchemaBuilder) -> SchemaBuilder {
            schema.partition_key("Id", "").row_key("Id2", "").encrypted("Secret", "")
        }
    }

    struct Parent;

    impl Model for Parent {
        const NAME: &'static str = "Parent";
        const KIND: StorageKind = StorageKind::Table;

        fn define(schema: SchemaBuilder) -> SchemaBuilder {
            schema
                .partition_key("Id", 0)
                .row_key("Id2", "")
                .field("_internal", "hidden")
                .relationship::<Child>("Children", KeyCorrelation::new().partition("eq", "Id2"))
        }
    }

    struct Message;

    impl Model for Message {
        const NAME: &'static str = "QueueOne";
        const KIND: StorageKind = StorageKind::Queue;

        fn define(schema: SchemaBuilder) -> SchemaBuilder {
            schema.field("epgid", 0).field("resolution", "")
        }
    }

    fn table(name: &'static str) -> SchemaBuilder {
        SchemaBuilder::new(name, StorageKind::Table)
    }

    #[test]
    fn test_schema_derivation() {
        let schema = schema_of::<Parent>().unwrap();
        assert_eq!(schema.storage_name(), "Parent");
        assert_eq!(schema.fields().len(), 2);
        assert!(schema.field("_internal").is_none());
        assert_eq!(schema.partition_key_field().unwrap().field_type, FieldType::Integer);
        assert_eq!(schema.role_of("Children"), Some(FieldRole::Relationship));
        assert_eq!(schema.relationship("Children").unwrap().target, ModelRef::of::<Child>());
    }

    #[test]
    fn test_schema_is_cached_per_type() {
        let first = schema_of::<Child>().unwrap();
        let second = schema_of::<Child>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.encrypted_fields().into_iter().collect::<Vec<_>>(), vec!["Secret"]);
    }

    #[test]
    fn test_queue_storage_name_is_lowercased() {
        let schema = schema_of::<Message>().unwrap();
        assert_eq!(schema.storage_name(), "queueone");
        assert_eq!(schema.kind(), StorageKind::Queue);
    }

    #[test]
    fn test_table_requires_both_keys() {
        let err = table("NoRowKey").partition_key("Id", 0).build().unwrap_err();
        assert!(matches!(err, StowageError::Schema { .. }));

        let err = table("TwoKeys")
            .partition_key("A", 0)
            .partition_key("B", 0)
            .row_key("C", "")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("at most one partition key"));
    }

    #[test]
    fn test_untyped_default_is_rejected() {
        let err = table("Untyped")
            .partition_key("Id", 0)
            .row_key("Id2", "")
            .field("Nothing", Value::Null)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("typed default"));
    }

    #[test]
    fn test_duplicate_field_is_rejected() {
        let err = table("Dup")
            .partition_key("Id", 0)
            .row_key("Id", "")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("declared twice"));
    }

    #[test]
    fn test_keys_rejected_outside_tables() {
        let err = SchemaBuilder::new("Blobby", StorageKind::Blob)
            .partition_key("Id", 0)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("only supported on table models"));
    }

    #[test]
    fn test_relationship_foreign_key_must_exist() {
        let err = table("Dangling")
            .partition_key("Id", 0)
            .row_key("Id2", "")
            .relationship::<Child>("Kids", KeyCorrelation::new().partition("eq", "Missing"))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("unknown field 'Missing'"));

        let err = table("BadOp")
            .partition_key("Id", 0)
            .row_key("Id2", "")
            .relationship::<Child>("Kids", KeyCorrelation::new().partition("like", "Id"))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("unknown condition 'like'"));
    }
}
