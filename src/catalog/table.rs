// Table Metadata
//
// This module defines the table metadata stored in the catalog.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::column::Column;

/// Metadata for a database table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    /// Table name
    name: String,
    /// Columns in declaration order, system columns first
    columns: Vec<Column>,
    /// Column name to index lookup
    column_map: HashMap<String, usize>,
}

impl Table {
    /// Create a new table with the given name and columns
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        let mut column_map = HashMap::new();
        for (i, col) in columns.iter().enumerate() {
            column_map.insert(col.name().to_string(), i);
        }
        Table {
            name: name.into(),
            columns,
            column_map,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// All columns, including system columns
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// User-visible columns, the set `*` expands to
    pub fn user_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| !c.is_system())
    }

    /// Number of user-visible columns
    pub fn user_column_count(&self) -> usize {
        self.user_columns().count()
    }

    /// Look up a column by name
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.column_map.get(name).map(|&idx| &self.columns[idx])
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_map.contains_key(name)
    }
}
