//! Row and dataset model.
//!
//! A [`Row`] is an ordered list of `(field name, value)` string pairs — CSV
//! has no native typing, so values stay strings end to end. A [`Dataset`] is
//! a sequence of rows that all share one [`Schema`] (the sorted set of field
//! names). Schema equality is structural: two datasets agree when their
//! sorted field-name lists are identical, regardless of column order in the
//! source files.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

/// Errors raised while constructing a dataset.
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("dataset has no columns")]
    EmptySchema,
    #[error("duplicate column {name:?}")]
    DuplicateColumn { name: String },
    #[error("row {index} has columns {found:?}, expected {expected:?}")]
    RaggedRow {
        index: usize,
        expected: Vec<String>,
        found: Vec<String>,
    },
}

/// One tabular row: ordered `(field name, value)` pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    fields: Vec<(String, String)>,
}

impl Row {
    #[must_use]
    pub fn new(fields: Vec<(String, String)>) -> Self {
        Self { fields }
    }

    /// Value of a field by name, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }

    #[must_use]
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Field names in sorted order (the row's structural shape).
    #[must_use]
    pub fn sorted_field_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.fields.iter().map(|(f, _)| f.clone()).collect();
        names.sort();
        names
    }

    /// Canonical whole-row identity key.
    ///
    /// JSON serialization of the row's fields taken in sorted field-name
    /// order, so two rows with the same content but different column order
    /// produce the same key.
    #[must_use]
    pub fn identity_key(&self) -> String {
        // serde_json::Map is a BTreeMap underneath, which keeps keys sorted.
        let map: Map<String, Value> = self
            .fields
            .iter()
            .map(|(f, v)| (f.clone(), Value::String(v.clone())))
            .collect();
        Value::Object(map).to_string()
    }
}

/// Sorted, deduplicated field-name set shared by every row of a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    names: Vec<String>,
}

impl Schema {
    /// Build a schema from field names in any order.
    pub fn new(names: impl IntoIterator<Item = String>) -> Result<Self, DatasetError> {
        let mut names: Vec<String> = names.into_iter().collect();
        names.sort();
        for pair in names.windows(2) {
            if pair[0] == pair[1] {
                return Err(DatasetError::DuplicateColumn {
                    name: pair[0].clone(),
                });
            }
        }
        Ok(Self { names })
    }

    #[must_use]
    pub fn field_names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.binary_search_by(|n| n.as_str().cmp(name)).is_ok()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// An ordered collection of uniformly-schemed rows.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Dataset {
    schema: Schema,
    rows: Vec<Row>,
}

impl Dataset {
    /// Build a dataset from rows; the schema is taken from the first row and
    /// every subsequent row must match it structurally.
    pub fn from_rows(rows: Vec<Row>) -> Result<Self, DatasetError> {
        let Some(first) = rows.first() else {
            return Ok(Self::default());
        };
        let schema = Schema::new(first.sorted_field_names())?;
        if schema.is_empty() {
            return Err(DatasetError::EmptySchema);
        }
        Self::with_schema(schema, rows)
    }

    /// Build a dataset with a known schema (e.g. from a decoded header),
    /// validating every row against it.
    pub fn with_schema(schema: Schema, rows: Vec<Row>) -> Result<Self, DatasetError> {
        if schema.is_empty() && !rows.is_empty() {
            return Err(DatasetError::EmptySchema);
        }
        for (index, row) in rows.iter().enumerate() {
            let found = row.sorted_field_names();
            if found != schema.names {
                return Err(DatasetError::RaggedRow {
                    index,
                    expected: schema.names.clone(),
                    found,
                });
            }
        }
        Ok(Self { schema, rows })
    }

    /// Internal constructor for rows already known to match the schema
    /// (merge output is built from two validated datasets).
    pub(crate) fn from_validated(schema: Schema, rows: Vec<Row>) -> Self {
        Self { schema, rows }
    }

    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    #[must_use]
    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// The key actually used to compare rows during a merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectiveKey {
    /// A designated column present in the schema.
    Field(String),
    /// Whole-row identity: the canonical serialization of all fields.
    WholeRow,
}

impl EffectiveKey {
    /// Resolve the key for a merge: the requested column when it exists in
    /// the schema, otherwise whole-row identity. A requested-but-absent
    /// column degrades to whole-row identity rather than failing.
    #[must_use]
    pub fn resolve(requested: Option<&str>, schema: &Schema) -> Self {
        match requested {
            Some(name) if schema.contains(name) => Self::Field(name.to_string()),
            Some(name) => {
                warn!(
                    key = %name,
                    "primary key column not found in schema, comparing whole rows"
                );
                Self::WholeRow
            }
            None => Self::WholeRow,
        }
    }

    /// Key value for one row.
    #[must_use]
    pub fn key_of(&self, row: &Row) -> String {
        match self {
            Self::Field(name) => row.get(name).unwrap_or_default().to_string(),
            Self::WholeRow => row.identity_key(),
        }
    }

    /// Human-readable key name for error context.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Field(name) => name,
            Self::WholeRow => "<whole-row>",
        }
    }
}
