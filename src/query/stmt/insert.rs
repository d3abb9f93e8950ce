// Insert Statement Implementation
//
// Resolves a parsed INSERT: binds the target table and validates each row
// against the table's user-visible columns.

use std::sync::Arc;

use log::warn;

use crate::catalog::{Catalog, Table};
use crate::common::error::{QueryError, QueryResult};
use crate::common::types::AttrType;
use crate::common::value::Value;
use crate::query::ast::InsertSqlNode;

/// A resolved INSERT statement; multi-row form
#[derive(Debug)]
pub struct InsertStmt {
    table: Arc<Table>,
    rows: Vec<Vec<Value>>,
}

impl InsertStmt {
    pub fn resolve(catalog: &Catalog, node: &InsertSqlNode) -> QueryResult<InsertStmt> {
        let table = catalog.table(&node.relation_name).ok_or_else(|| {
            warn!("no such table: {}", node.relation_name);
            QueryError::TableNotFound(node.relation_name.clone())
        })?;

        if node.rows.is_empty() {
            return Err(QueryError::InvalidArgument(
                "INSERT carries no rows".to_string(),
            ));
        }

        let column_count = table.user_column_count();
        for row in &node.rows {
            if row.len() != column_count {
                warn!(
                    "row arity {} does not match {} columns of {}",
                    row.len(),
                    column_count,
                    table.name()
                );
                return Err(QueryError::ColumnNotFound(format!(
                    "{} values for {} columns",
                    row.len(),
                    column_count
                )));
            }
            for (value, column) in row.iter().zip(table.user_columns()) {
                if value.is_null() {
                    if !column.is_nullable() {
                        return Err(QueryError::InvalidArgument(format!(
                            "column {} is not nullable",
                            column.name()
                        )));
                    }
                    continue;
                }
                let compatible = value.attr_type() == column.attr_type()
                    || (value.attr_type() == AttrType::Ints
                        && column.attr_type() == AttrType::Floats);
                if !compatible {
                    warn!(
                        "value type {} does not fit column {} {}",
                        value.attr_type(),
                        column.name(),
                        column.attr_type()
                    );
                    return Err(QueryError::InvalidArgument(format!(
                        "value type {} does not fit column {}",
                        value.attr_type(),
                        column.name()
                    )));
                }
            }
        }

        Ok(InsertStmt {
            table,
            rows: node.rows.clone(),
        })
    }

    pub fn table(&self) -> &Arc<Table> {
        &self.table
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }
}
