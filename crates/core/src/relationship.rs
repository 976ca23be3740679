//! Relationship queries between table models
//!
//! A [`RelationshipQuery`] is bound to a target table model and the key
//! values it should match. It renders the backend filter string and, once a
//! table context resolved it, holds the matching records.

use crate::error::{StowageError, StowageResult};
use crate::model::{Model, ModelInstance, Record};
use crate::schema::{KeyCorrelation, ModelRef};
use crate::value::Value;
use std::ops::Deref;

/// A partition/row key query against a target table model
#[derive(Debug, Clone)]
pub struct RelationshipQuery {
    target: ModelRef,
    partition_condition: String,
    partition_value: String,
    row_condition: String,
    row_value: String,
    select: Option<Vec<String>>,
    results: Vec<Record>,
}

impl RelationshipQuery {
    /// An unbound query over every row of table model `T`
    pub fn new<T: Model>() -> Self {
        Self::bound(ModelRef::of::<T>(), &KeyCorrelation::new(), String::new(), String::new())
    }

    pub(crate) fn bound(
        target: ModelRef,
        correlation: &KeyCorrelation,
        partition_value: String,
        row_value: String,
    ) -> Self {
        Self {
            target,
            partition_condition: correlation.partition_condition.clone(),
            partition_value,
            row_condition: correlation.row_condition.clone(),
            row_value,
            select: None,
            results: Vec::new(),
        }
    }

    /// Match the target's PartitionKey
    pub fn partition(mut self, condition: impl Into<String>, value: impl Into<String>) -> Self {
        self.partition_condition = condition.into();
        self.partition_value = value.into();
        self
    }

    /// Match the target's RowKey
    pub fn row(mut self, condition: impl Into<String>, value: impl Into<String>) -> Self {
        self.row_condition = condition.into();
        self.row_value = value.into();
        self
    }

    /// Restrict the properties fetched for each row
    pub fn select<S: AsRef<str>>(mut self, fields: &[S]) -> Self {
        self.set_select(fields.iter().map(|f| f.as_ref().to_string()).collect());
        self
    }

    pub fn set_select(&mut self, fields: Vec<String>) {
        self.select = if fields.is_empty() { None } else { Some(fields) };
    }

    pub fn selected(&self) -> Option<&[String]> {
        self.select.as_deref()
    }

    /// Target table model
    pub fn target(&self) -> ModelRef {
        self.target
    }

    /// Backend filter, e.g. `PartitionKey eq 'a' and RowKey ge 'b'`.
    ///
    /// A side with an empty condition or value contributes nothing; an
    /// empty filter selects every row.
    pub fn query_filter(&self) -> String {
        let sides = [
            ("PartitionKey", &self.partition_condition, &self.partition_value),
            ("RowKey", &self.row_condition, &self.row_value),
        ];
        sides
            .iter()
            .filter(|(_, condition, value)| !condition.is_empty() && !value.is_empty())
            .map(|(key, condition, value)| format!("{} {} '{}'", key, condition, value.replace('\'', "''")))
            .collect::<Vec<_>>()
            .join(" and ")
    }

    /// Replace the results with freshly resolved records
    pub fn populate(&mut self, records: Vec<Record>) {
        self.results = records;
    }

    pub fn push(&mut self, record: Record) {
        self.results.push(record);
    }

    /// Keep only results whose `field` equals one of `allowed`.
    ///
    /// Allowed values are coerced to the field's type before comparing.
    /// Runs in memory against the resolved results.
    pub fn filter(&mut self, field: &str, allowed: &[Value]) {
        self.results.retain(|record| {
            let schema = record.schema();
            let (Some(spec), Some(current)) = (schema.field(field), record.get(field)) else {
                return false;
            };
            allowed
                .iter()
                .any(|candidate| schema.coerce_field(spec, candidate) == *current)
        });
    }

    pub fn results(&self) -> &[Record] {
        &self.results
    }

    pub fn into_records(self) -> Vec<Record> {
        self.results
    }

    /// Resolved results as typed instances of the target model
    pub fn into_instances<T: Model>(self) -> StowageResult<Vec<ModelInstance<T>>> {
        if !self.target.is::<T>() {
            return Err(StowageError::schema(
                T::NAME,
                format!("relationship targets model {}", self.target.name()),
            ));
        }
        self.results.into_iter().map(ModelInstance::from_record).collect()
    }
}

impl Deref for RelationshipQuery {
    type Target = [Record];

    fn deref(&self) -> &[Record] {
        &self.results
    }
}

impl<'a> IntoIterator for &'a RelationshipQuery {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Properties;
    use crate::schema::{schema_of, SchemaBuilder, StorageKind};

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

    struct Other;

    impl Model for Other {
        const NAME: &'static str = "Other";
        const KIND: StorageKind = StorageKind::Table;

        fn define(schema: SchemaBuilder) -> SchemaBuilder {
            schema.partition_key("A", "").row_key("B", "")
        }
    }

    fn row(id: &str, rank: i64) -> Record {
        let mut stored = Properties::new();
        stored.insert("Id".to_string(), Value::from(id));
        stored.insert("Id2".to_string(), Value::from(format!("{}-{}", id, rank)));
        stored.insert("Rank".to_string(), Value::from(rank));
        Record::from_stored(schema_of::<TableTwo>().unwrap(), &stored)
    }

    #[test]
    fn test_filter_string() {
        assert_eq!(RelationshipQuery::new::<TableTwo>().query_filter(), "");
        assert_eq!(
            RelationshipQuery::new::<TableTwo>()
                .partition("eq", "Second")
                .query_filter(),
            "PartitionKey eq 'Second'"
        );
        assert_eq!(
            RelationshipQuery::new::<TableTwo>()
                .partition("eq", "a")
                .row("ge", "b")
                .query_filter(),
            "PartitionKey eq 'a' and RowKey ge 'b'"
        );
        assert_eq!(
            RelationshipQuery::new::<TableTwo>().row("eq", "it's").query_filter(),
            "RowKey eq 'it''s'"
        );
        assert_eq!(
            RelationshipQuery::new::<TableTwo>().partition("", "ignored").query_filter(),
            ""
        );
    }

    #[test]
    fn test_in_memory_filter() {
        let mut query = RelationshipQuery::new::<TableTwo>();
        query.populate((0..5).map(|rank| row("First", rank)).collect());
        assert_eq!(query.len(), 5);

        query.filter("Rank", &[Value::from("1"), Value::from(3)]);
        let ranks: Vec<i64> = query.iter().filter_map(|r| r.get_as("Rank")).collect();
        assert_eq!(ranks, vec![1, 3]);

        query.filter("Missing", &[Value::from(1)]);
        assert!(query.is_empty());
    }

    #[test]
    fn test_into_instances_checks_target() {
        let mut query = RelationshipQuery::new::<TableTwo>();
        query.push(row("First", 1));

        assert!(query.clone().into_instances::<Other>().is_err());
        let instances = query.into_instances::<TableTwo>().unwrap();
        assert_eq!(instances[0].partition_key(), "First");
    }

    #[test]
    fn test_select_keeps_empty_as_none() {
        let query = RelationshipQuery::new::<TableTwo>().select::<&str>(&[]);
        assert!(query.selected().is_none());

        let query = RelationshipQuery::new::<TableTwo>().select(&["Rank"]);
        assert_eq!(query.selected(), Some(&["Rank".to_string()][..]));
    }
}
