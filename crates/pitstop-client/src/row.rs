//! Result rows and column metadata.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::value::{FromSql, SqlValue};

/// Metadata for one column of a result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name as reported by the server.
    pub name: String,
    /// Zero-based position in the row.
    pub index: usize,
    /// SQL type name (`INT4`, `TEXT`, ...).
    pub type_name: String,
}

impl Column {
    /// Create column metadata.
    pub fn new(name: impl Into<String>, index: usize, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            index,
            type_name: type_name.into(),
        }
    }
}

/// One row of a result set.
///
/// Column metadata is shared across all rows of the same result.
#[derive(Debug, Clone)]
pub struct Row {
    columns: Arc<Vec<Column>>,
    values: Vec<SqlValue>,
}

impl Row {
    pub(crate) fn new(columns: Arc<Vec<Column>>, values: Vec<SqlValue>) -> Self {
        Self { columns, values }
    }

    /// Column metadata for this row.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Number of values in the row.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the row has no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw value at a position, if in range.
    #[must_use]
    pub fn value(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }

    /// Raw value by column name, if present.
    #[must_use]
    pub fn value_by_name(&self, name: &str) -> Option<&SqlValue> {
        let column = self.columns.iter().find(|c| c.name == name)?;
        self.values.get(column.index)
    }

    /// Read a value at a position as a concrete type.
    pub fn try_get<T: FromSql>(&self, index: usize) -> Result<T> {
        let value = self
            .values
            .get(index)
            .ok_or_else(|| Error::Decode(format!("column index {index} out of range")))?;
        T::from_sql(value)
    }

    /// Read a value by column name as a concrete type.
    pub fn try_get_by_name<T: FromSql>(&self, name: &str) -> Result<T> {
        let value = self
            .value_by_name(name)
            .ok_or_else(|| Error::Decode(format!("no column named {name}")))?;
        T::from_sql(value)
    }

    /// All values, in column order.
    #[must_use]
    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    /// Render as a JSON object keyed by column name.
    #[must_use]
    pub fn to_json_object(&self) -> serde_json::Value {
        let mut map = serde_json::Map::with_capacity(self.values.len());
        for column in self.columns.iter() {
            if let Some(value) = self.values.get(column.index) {
                map.insert(column.name.clone(), value.to_json());
            }
        }
        serde_json::Value::Object(map)
    }

    /// Render as a JSON array in column order.
    #[must_use]
    pub fn to_json_array(&self) -> serde_json::Value {
        serde_json::Value::Array(self.values.iter().map(SqlValue::to_json).collect())
    }
}
