// Delete Statement Implementation

use std::sync::Arc;

use log::warn;

use crate::catalog::{Catalog, Table};
use crate::common::error::{QueryError, QueryResult};
use crate::query::ast::DeleteSqlNode;

use super::filter::FilterStmt;
use super::Scope;

/// A resolved DELETE statement
#[derive(Debug)]
pub struct DeleteStmt {
    table: Arc<Table>,
    filter: FilterStmt,
}

impl DeleteStmt {
    pub fn resolve(catalog: &Catalog, node: &DeleteSqlNode) -> QueryResult<DeleteStmt> {
        let table = catalog.table(&node.relation_name).ok_or_else(|| {
            warn!("no such table: {}", node.relation_name);
            QueryError::TableNotFound(node.relation_name.clone())
        })?;

        let mut scope = Scope::new();
        scope.add_table(table.name(), table.clone());
        let filter = FilterStmt::resolve(catalog, Some(&table), &mut scope, &node.conditions)?;

        Ok(DeleteStmt { table, filter })
    }

    pub fn table(&self) -> &Arc<Table> {
        &self.table
    }

    pub fn filter(&self) -> &FilterStmt {
        &self.filter
    }
}
