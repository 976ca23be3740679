//! Model trait and model instances
//!
//! A [`Record`] holds one instance's coerced field values against its
//! schema. [`ModelInstance`] is the typed face of a record for a concrete
//! model type.

use crate::error::{StowageError, StowageResult};
use crate::relationship::RelationshipQuery;
use crate::schema::{
    schema_of, FieldRole, ModelRef, ModelSchema, RelationshipSpec, SchemaBuilder, StorageKind,
};
use crate::value::{FromValue, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// Flat property bag as exchanged with a backend
pub type Properties = BTreeMap<String, Value>;

/// Entity property carrying the partition key
pub const PARTITION_KEY: &str = "PartitionKey";

/// Entity property carrying the row key
pub const ROW_KEY: &str = "RowKey";

/// A model type mapped onto a blob container, queue or table
///
/// ```rust
/// use stowage_core::{Model, SchemaBuilder, StorageKind};
///
/// struct TableOne;
///
/// impl Model for TableOne {
///     const NAME: &'static str = "TableOne";
///     const KIND: StorageKind = StorageKind::Table;
///
///     fn define(schema: SchemaBuilder) -> SchemaBuilder {
///         schema
///             .partition_key("Id", "")
///             .row_key("Id2", "")
///             .field("Name", "")
///     }
/// }
/// ```
pub trait Model: Send + Sync + 'static {
    /// Model name, also the default storage name
    const NAME: &'static str;

    /// Storage kind the model maps onto
    const KIND: StorageKind;

    /// Declare the model's fields
    fn define(schema: SchemaBuilder) -> SchemaBuilder;

    /// Compute empty table keys from other fields. Called once during
    /// construction when the partition or row key is still empty.
    fn derive_keys(_record: &mut Record) {}
}

/// Field values of one model instance
#[derive(Clone)]
pub struct Record {
    schema: Arc<ModelSchema>,
    values: HashMap<String, Value>,
    exists: Option<bool>,
    relationships: BTreeMap<String, RelationshipQuery>,
}

impl Record {
    /// A record seeded with every field's default
    pub fn new(schema: Arc<ModelSchema>) -> Self {
        let values = schema
            .fields()
            .iter()
            .map(|f| (f.name.clone(), f.default.clone()))
            .collect();
        let mut record = Self {
            schema,
            values,
            exists: None,
            relationships: BTreeMap::new(),
        };
        record.rebind_relationships();
        record
    }

    /// A record rebuilt from a stored representation
    pub fn from_stored(schema: Arc<ModelSchema>, stored: &Properties) -> Self {
        let mut record = Self::new(schema);
        record.merge_fill(stored);
        record.exists = Some(true);
        record
    }

    pub fn schema(&self) -> &Arc<ModelSchema> {
        &self.schema
    }

    pub fn model_name(&self) -> &'static str {
        self.schema.model_name()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Typed read of a field value
    pub fn get_as<T: FromValue>(&self, name: &str) -> Option<T> {
        self.values.get(name).and_then(T::from_value)
    }

    /// Assign a field, coercing to its declared type.
    ///
    /// Returns `false` when the model has no such field.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> bool {
        let Some(field) = self.schema.field(name) else {
            return false;
        };
        let coerced = self.schema.coerce_field(field, &value.into());
        if self.assign(name, coerced) {
            self.rebind_changed(&[name]);
        }
        true
    }

    /// Store a coerced value, reporting whether it differs from the old one
    fn assign(&mut self, name: &str, value: Value) -> bool {
        match self.values.insert(name.to_string(), value) {
            Some(previous) => self.values.get(name) != Some(&previous),
            None => true,
        }
    }

    /// Field values in declaration order
    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.schema
            .fields()
            .iter()
            .filter_map(|f| self.values.get(&f.name).map(|v| (f.name.as_str(), v)))
    }

    /// Backend existence: `None` until a lookup or write resolved it
    pub fn exists(&self) -> Option<bool> {
        self.exists
    }

    pub fn mark_exists(&mut self, exists: bool) {
        self.exists = Some(exists);
    }

    /// Partition key value rendered as text
    pub fn partition_key(&self) -> String {
        self.key_value(self.schema.partition_key_field().map(|f| f.name.as_str()))
    }

    /// Row key value rendered as text
    pub fn row_key(&self) -> String {
        self.key_value(self.schema.row_key_field().map(|f| f.name.as_str()))
    }

    fn key_value(&self, field: Option<&str>) -> String {
        field
            .and_then(|name| self.values.get(name))
            .and_then(|value| self.schema.render(value))
            .unwrap_or_default()
    }

    /// Declared field values without the table key properties.
    ///
    /// Null values are left out.
    pub fn properties(&self) -> Properties {
        self.values()
            .filter(|(_, value)| !value.is_null())
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    /// Flat entity for submission to a table backend.
    ///
    /// Carries `PartitionKey` and `RowKey` as text alongside the declared
    /// fields; relationships are never persisted.
    pub fn entity(&self) -> Properties {
        let mut entity = self.properties();
        if self.schema.kind() == StorageKind::Table {
            entity.insert(PARTITION_KEY.to_string(), Value::Text(self.partition_key()));
            entity.insert(ROW_KEY.to_string(), Value::Text(self.row_key()));
        }
        entity
    }

    /// Overwrite fields from a stored representation.
    ///
    /// Every declared field present in `stored` is coerced and replaces the
    /// current value; absent fields are left as they are.
    pub fn merge_fill(&mut self, stored: &Properties) {
        let schema = Arc::clone(&self.schema);
        let mut changed = Vec::new();
        for field in schema.fields() {
            if let Some(value) = stored.get(&field.name) {
                if self.assign(&field.name, schema.coerce_field(field, value)) {
                    changed.push(field.name.as_str());
                }
            }
        }
        self.rebind_changed(&changed);
    }

    /// Take stored values for every field still at its default.
    ///
    /// Used by table merge: a default in the payload means "not supplied".
    pub fn fill_unset(&mut self, stored: &Properties) {
        let schema = Arc::clone(&self.schema);
        let mut changed = Vec::new();
        for field in schema.fields() {
            let unset = self
                .values
                .get(&field.name)
                .map_or(true, |current| current.is_null() || *current == field.default);
            if !unset {
                continue;
            }
            if let Some(value) = stored.get(&field.name) {
                if self.assign(&field.name, schema.coerce_field(field, value)) {
                    changed.push(field.name.as_str());
                }
            }
        }
        self.rebind_changed(&changed);
    }

    /// Payload object for queue messages, dates rendered with the model formats
    pub fn to_json(&self) -> serde_json::Map<String, serde_json::Value> {
        let (date_format, datetime_format) = self.formats();
        self.values()
            .map(|(name, value)| (name.to_string(), value.to_json(date_format, datetime_format)))
            .collect()
    }

    /// Fill fields from a JSON payload object
    pub fn fill_json(&mut self, payload: &serde_json::Map<String, serde_json::Value>) {
        let stored: Properties = payload
            .iter()
            .map(|(name, value)| (name.clone(), Value::from_json(value)))
            .collect();
        self.merge_fill(&stored);
    }

    /// Field values rendered as strings, as blob metadata carries them
    pub fn to_metadata(&self) -> BTreeMap<String, String> {
        self.values()
            .filter_map(|(name, value)| self.schema.render(value).map(|text| (name.to_string(), text)))
            .collect()
    }

    fn formats(&self) -> (&str, &str) {
        (
            self.schema
                .date_format()
                .unwrap_or(crate::value::DEFAULT_DATE_FORMAT),
            self.schema
                .datetime_format()
                .unwrap_or(crate::value::DEFAULT_DATETIME_FORMAT),
        )
    }

    pub fn relationship(&self, name: &str) -> Option<&RelationshipQuery> {
        self.relationships.get(name)
    }

    pub fn relationship_mut(&mut self, name: &str) -> Option<&mut RelationshipQuery> {
        self.relationships.get_mut(name)
    }

    /// Rebuild every relationship query from the current foreign key values.
    ///
    /// An empty foreign key value binds the wildcard `*`.
    pub fn rebind_relationships(&mut self) {
        self.rebind_where(|_| true);
    }

    /// Rebind only the relationships keyed on one of `changed`. Resolved
    /// results of every other relationship are kept.
    fn rebind_changed(&mut self, changed: &[&str]) {
        if changed.is_empty() {
            return;
        }
        self.rebind_where(|spec| {
            changed.iter().any(|name| {
                spec.correlation.partition_foreign_key == *name
                    || spec.correlation.row_foreign_key == *name
            })
        });
    }

    fn rebind_where(&mut self, matches: impl Fn(&RelationshipSpec) -> bool) {
        let schema = Arc::clone(&self.schema);
        for spec in schema.relationships().iter().filter(|spec| matches(spec)) {
            let bind = |foreign_key: &str| -> String {
                if foreign_key.is_empty() {
                    return "*".to_string();
                }
                match self.values.get(foreign_key).and_then(|v| schema.render(v)) {
                    Some(text) if !text.is_empty() => text,
                    _ => "*".to_string(),
                }
            };
            let partition_value = bind(&spec.correlation.partition_foreign_key);
            let row_value = bind(&spec.correlation.row_foreign_key);

            let select = self
                .relationships
                .get(&spec.name)
                .and_then(|q| q.selected().map(|s| s.to_vec()));
            let mut query =
                RelationshipQuery::bound(spec.target, &spec.correlation, partition_value, row_value);
            if let Some(select) = select {
                query.set_select(select);
            }
            self.relationships.insert(spec.name.clone(), query);
        }
    }

    /// Key fields first, then the rest
    fn key_first_order(&self) -> Vec<(&str, &Value)> {
        let mut ordered: Vec<_> = self.values().collect();
        ordered.sort_by_key(|(name, _)| match self.schema.role_of(name) {
            Some(FieldRole::PartitionKey) => 0,
            Some(FieldRole::RowKey) => 1,
            _ => 2,
        });
        ordered
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct(self.model_name());
        for (name, value) in self.key_first_order() {
            debug.field(name, value);
        }
        debug.field("exists", &self.exists).finish()
    }
}

/// A record of model type `M`
pub struct ModelInstance<M: Model> {
    record: Record,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> ModelInstance<M> {
    /// An instance with every field at its default
    pub fn new() -> StowageResult<Self> {
        Self::with_overrides(std::iter::empty::<(&str, Value)>())
    }

    /// An instance with field overrides applied.
    ///
    /// Overrides are coerced to the declared types; unknown names are ignored.
    pub fn with_overrides<I, K, V>(overrides: I) -> StowageResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let schema = schema_of::<M>()?;
        let mut record = Record::new(Arc::clone(&schema));
        for (name, value) in overrides {
            let name = name.as_ref();
            if !record.set(name, value) {
                tracing::debug!("ignoring unknown field {} for model {}", name, M::NAME);
            }
        }

        if schema.kind() == StorageKind::Table
            && (record.partition_key().is_empty() || record.row_key().is_empty())
        {
            M::derive_keys(&mut record);
        }
        record.rebind_relationships();

        Ok(Self::wrap(record))
    }

    pub fn builder() -> InstanceBuilder<M> {
        InstanceBuilder {
            overrides: Vec::new(),
            _model: PhantomData,
        }
    }

    /// Reinterpret a record of this model's schema
    pub fn from_record(record: Record) -> StowageResult<Self> {
        let schema = schema_of::<M>()?;
        if !Arc::ptr_eq(&schema, record.schema()) {
            return Err(StowageError::schema(
                M::NAME,
                format!("record of model {} cannot become a {}", record.model_name(), M::NAME),
            ));
        }
        Ok(Self::wrap(record))
    }

    fn wrap(record: Record) -> Self {
        Self {
            record,
            _model: PhantomData,
        }
    }

    pub fn model_ref() -> ModelRef {
        ModelRef::of::<M>()
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn into_record(self) -> Record {
        self.record
    }
}

impl<M: Model> Deref for ModelInstance<M> {
    type Target = Record;

    fn deref(&self) -> &Record {
        &self.record
    }
}

impl<M: Model> DerefMut for ModelInstance<M> {
    fn deref_mut(&mut self) -> &mut Record {
        &mut self.record
    }
}

impl<M: Model> Clone for ModelInstance<M> {
    fn clone(&self) -> Self {
        Self::wrap(self.record.clone())
    }
}

impl<M: Model> fmt::Debug for ModelInstance<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.record.fmt(f)
    }
}

/// Collects overrides for a [`ModelInstance`]
pub struct InstanceBuilder<M: Model> {
    overrides: Vec<(String, Value)>,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> InstanceBuilder<M> {
    pub fn set(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.overrides.push((name.to_string(), value.into()));
        self
    }

    pub fn build(self) -> StowageResult<ModelInstance<M>> {
        ModelInstance::with_overrides(self.overrides)
    }
}
