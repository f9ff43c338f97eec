use std::sync::Arc;

use crate::types::SqlValue;

/// A single row of a drained result set.
///
/// Column names are shared across all rows of a set to avoid duplicating
/// them per row; field order matches the statement's column order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// The column names for this row (shared across the result set)
    pub columns: Arc<Vec<String>>,
    /// The values for this row, in column order
    pub values: Vec<SqlValue>,
}

impl Row {
    #[must_use]
    pub fn new(columns: Arc<Vec<String>>, values: Vec<SqlValue>) -> Self {
        Self { columns, values }
    }

    /// Get a value by column name, or None if the column is absent.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|idx| self.values.get(idx))
    }

    /// Get a value by column index.
    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }

    /// Project into an ordered field→value JSON document.
    #[must_use]
    pub fn to_document(&self) -> serde_json::Value {
        let mut map = serde_json::Map::with_capacity(self.columns.len());
        for (name, value) in self.columns.iter().zip(&self.values) {
            map.insert(name.clone(), value.to_json());
        }
        serde_json::Value::Object(map)
    }
}
