use std::sync::Arc;

use super::row::Row;
use crate::types::SqlValue;

/// A fully drained, finite, non-restartable result set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    columns: Arc<Vec<String>>,
    /// The rows, in the order the cursor produced them
    pub rows: Vec<Row>,
}

impl ResultSet {
    #[must_use]
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns: Arc::new(columns),
            rows: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_capacity(columns: Vec<String>, capacity: usize) -> Self {
        Self {
            columns: Arc::new(columns),
            rows: Vec::with_capacity(capacity),
        }
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a row's values; the row shares this set's column names.
    pub fn push_values(&mut self, values: Vec<SqlValue>) {
        self.rows.push(Row::new(self.columns.clone(), values));
    }

    /// Project every row into an ordered JSON document, preserving both row
    /// order and the statement's column order.
    #[must_use]
    pub fn to_documents(&self) -> Vec<serde_json::Value> {
        self.rows.iter().map(Row::to_document).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_preserve_column_order() {
        let mut rs = ResultSet::new(vec!["Zeta".into(), "alpha".into(), "Mid".into()]);
        rs.push_values(vec![
            SqlValue::Int(1),
            SqlValue::Text("x".into()),
            SqlValue::Null,
        ]);
        let docs = rs.to_documents();
        assert_eq!(docs.len(), 1);
        let keys: Vec<&String> = docs[0].as_object().unwrap().keys().collect();
        assert_eq!(keys, ["Zeta", "alpha", "Mid"]);
    }

    #[test]
    fn row_lookup_by_name_and_index() {
        let mut rs = ResultSet::new(vec!["id".into(), "name".into()]);
        rs.push_values(vec![SqlValue::Int(7), SqlValue::Text("meik".into())]);
        let row = &rs.rows[0];
        assert_eq!(row.get("id"), Some(&SqlValue::Int(7)));
        assert_eq!(row.get_by_index(1), Some(&SqlValue::Text("meik".into())));
        assert_eq!(row.get("missing"), None);
    }
}
