// Catalog Implementation
//
// The catalog is the place of record for table metadata. Statements hold
// `Arc<Table>` handles cloned out of it; the catalog outlives any plan
// referencing its tables.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::common::error::{QueryError, QueryResult};

use super::table::Table;

/// Central repository for table metadata
pub struct Catalog {
    tables: RwLock<HashMap<String, Arc<Table>>>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    /// Create a new, empty catalog
    pub fn new() -> Self {
        Catalog {
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Register a table; fails if the name is already taken
    pub fn create_table(&self, table: Table) -> QueryResult<()> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| QueryError::Internal("catalog lock poisoned".to_string()))?;
        let name = table.name().to_string();
        if tables.contains_key(&name) {
            return Err(QueryError::InvalidArgument(format!(
                "table {} already exists",
                name
            )));
        }
        tables.insert(name, Arc::new(table));
        Ok(())
    }

    /// Look up a table handle by name
    pub fn table(&self, name: &str) -> Option<Arc<Table>> {
        self.tables.read().ok()?.get(name).cloned()
    }

    pub fn table_exists(&self, name: &str) -> bool {
        self.tables
            .read()
            .map(|t| t.contains_key(name))
            .unwrap_or(false)
    }
}
