// Update Statement Implementation
//
// Resolves a parsed UPDATE: binds the target table, validates SET columns
// and values, resolves sub-selects on the right-hand side of SET clauses
// and the WHERE filter.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::warn;

use crate::catalog::{Catalog, Table};
use crate::common::error::{QueryError, QueryResult};
use crate::common::types::AttrType;
use crate::common::value::Value;
use crate::query::ast::{SetValueSqlNode, UpdateSqlNode};

use super::filter::FilterStmt;
use super::select::SelectStmt;
use super::Scope;

/// A resolved UPDATE statement
#[derive(Debug)]
pub struct UpdateStmt {
    table: Arc<Table>,
    /// Columns assigned from scalar values, parallel to `values`
    attribute_names: Vec<String>,
    values: Vec<Value>,
    /// Columns assigned from sub-selects, in deterministic order
    subquery_sets: BTreeMap<String, Box<SelectStmt>>,
    filter: FilterStmt,
}

impl UpdateStmt {
    pub fn resolve(catalog: &Catalog, node: &UpdateSqlNode) -> QueryResult<UpdateStmt> {
        let table = catalog.table(&node.relation_name).ok_or_else(|| {
            warn!("no such table: {}", node.relation_name);
            QueryError::TableNotFound(node.relation_name.clone())
        })?;

        let mut attribute_names = Vec::new();
        let mut values = Vec::new();
        let mut subquery_sets = BTreeMap::new();

        for set in &node.sets {
            let column = table.column(&set.attribute_name).ok_or_else(|| {
                warn!("no such field: {}.{}", table.name(), set.attribute_name);
                QueryError::ColumnNotFound(format!("{}.{}", table.name(), set.attribute_name))
            })?;

            match &set.value {
                SetValueSqlNode::Value(value) => {
                    if value.is_null() {
                        if !column.is_nullable() {
                            return Err(QueryError::InvalidArgument(format!(
                                "column {} is not nullable",
                                column.name()
                            )));
                        }
                    } else {
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
                    attribute_names.push(set.attribute_name.clone());
                    values.push(value.clone());
                }
                SetValueSqlNode::SubSelect(select) => {
                    // SET sub-selects are uncorrelated scalar queries;
                    // they resolve in a scope of their own
                    let mut scope = Scope::new();
                    let stmt = SelectStmt::resolve_in_scope(catalog, select, false, &mut scope)?;
                    subquery_sets.insert(set.attribute_name.clone(), Box::new(stmt));
                }
            }
        }

        let mut scope = Scope::new();
        scope.add_table(table.name(), table.clone());
        let filter = FilterStmt::resolve(catalog, Some(&table), &mut scope, &node.conditions)?;

        Ok(UpdateStmt {
            table,
            attribute_names,
            values,
            subquery_sets,
            filter,
        })
    }

    pub fn table(&self) -> &Arc<Table> {
        &self.table
    }

    pub fn attribute_names(&self) -> &[String] {
        &self.attribute_names
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn subquery_sets(&self) -> &BTreeMap<String, Box<SelectStmt>> {
        &self.subquery_sets
    }

    pub fn filter(&self) -> &FilterStmt {
        &self.filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Column;
    use crate::query::ast::SetClauseSqlNode;

    fn catalog() -> Catalog {
        let catalog = Catalog::new();
        catalog
            .create_table(Table::new(
                "t",
                vec![
                    Column::new("a", AttrType::Ints, false),
                    Column::new("b", AttrType::Chars, true),
                ],
            ))
            .unwrap();
        catalog
    }

    #[test]
    fn test_scalar_set() {
        let catalog = catalog();
        let node = UpdateSqlNode {
            relation_name: "t".to_string(),
            sets: vec![SetClauseSqlNode {
                attribute_name: "a".to_string(),
                value: SetValueSqlNode::Value(Value::Int(9)),
            }],
            conditions: vec![],
        };
        let stmt = UpdateStmt::resolve(&catalog, &node).unwrap();
        assert_eq!(stmt.attribute_names(), ["a"]);
        assert_eq!(stmt.values(), [Value::Int(9)]);
        assert!(stmt.subquery_sets().is_empty());
    }

    #[test]
    fn test_unknown_set_column() {
        let catalog = catalog();
        let node = UpdateSqlNode {
            relation_name: "t".to_string(),
            sets: vec![SetClauseSqlNode {
                attribute_name: "zzz".to_string(),
                value: SetValueSqlNode::Value(Value::Int(9)),
            }],
            conditions: vec![],
        };
        let err = UpdateStmt::resolve(&catalog, &node).unwrap_err();
        assert!(matches!(err, QueryError::ColumnNotFound(_)));
    }
}
