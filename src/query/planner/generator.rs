// Logical Plan Generator
//
// Lowers resolved statements into logical operator trees. Table scans are
// registered in a `ScanRegistry` arena keyed by table name; a sub-select
// that references a table the enclosing statement already scans receives
// the scan's index and the fold attaches a correlated join instead of a
// second scan.

use std::collections::HashMap;
use std::sync::Arc;

use log::warn;

use crate::catalog::Table;
use crate::common::error::{QueryError, QueryResult};
use crate::query::planner::logical::{LogicalPlan, ScanId};
use crate::query::stmt::field::Field;
use crate::query::stmt::{DeleteStmt, InsertStmt, SelectStmt, Statement, UpdateStmt};

/// One registered table scan
#[derive(Debug, Clone)]
pub struct ScanDescriptor {
    table: Arc<Table>,
    readonly: bool,
}

impl ScanDescriptor {
    pub fn table(&self) -> &Arc<Table> {
        &self.table
    }

    pub fn readonly(&self) -> bool {
        self.readonly
    }
}

/// Arena of table scans shared between a statement and its sub-selects.
///
/// Sub-queries receive indices into this arena, never references into the
/// plan tree, so re-rooting the outer plan cannot dangle them.
#[derive(Debug, Default)]
pub struct ScanRegistry {
    entries: Vec<ScanDescriptor>,
    by_name: HashMap<String, ScanId>,
}

impl ScanRegistry {
    pub fn new() -> Self {
        ScanRegistry::default()
    }

    /// Register a scan for the given table and hand back its index
    pub fn register(&mut self, table: Arc<Table>, readonly: bool) -> ScanId {
        let id = self.entries.len();
        self.by_name.insert(table.name().to_string(), id);
        self.entries.push(ScanDescriptor { table, readonly });
        id
    }

    /// The scan already registered for a table name, if any
    pub fn lookup(&self, table_name: &str) -> Option<ScanId> {
        self.by_name.get(table_name).copied()
    }

    pub fn get(&self, id: ScanId) -> Option<&ScanDescriptor> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Produces logical operator trees from resolved statements
#[derive(Debug, Default)]
pub struct LogicalPlanGenerator;

impl LogicalPlanGenerator {
    pub fn new() -> Self {
        LogicalPlanGenerator
    }

    /// Lower a resolved statement into its logical plan
    pub fn create(&self, stmt: Statement) -> QueryResult<LogicalPlan> {
        match stmt {
            Statement::Calc(calc) => Ok(LogicalPlan::Calc {
                expressions: calc.into_expressions(),
            }),
            Statement::Select(select) => {
                let mut registry = ScanRegistry::new();
                self.create_select(&select, &mut registry)
            }
            Statement::Insert(insert) => self.create_insert(&insert),
            Statement::Update(update) => self.create_update(&update),
            Statement::Delete(delete) => self.create_delete(&delete),
            Statement::Explain(explain) => {
                let child = self.create(explain.into_child())?;
                Ok(LogicalPlan::Explain {
                    child: Box::new(child),
                })
            }
        }
    }

    /// Lower a SELECT. The registry is shared with nested sub-selects so
    /// their plans can link back to scans created here.
    pub fn create_select(
        &self,
        stmt: &SelectStmt,
        registry: &mut ScanRegistry,
    ) -> QueryResult<LogicalPlan> {
        if stmt.tables().is_empty() {
            return Err(QueryError::InvalidArgument(
                "SELECT requires at least one table".to_string(),
            ));
        }

        // fold tables left to right into a left-deep source tree
        let mut source: Option<LogicalPlan> = None;
        for table in stmt.tables() {
            if let Some(scan_id) = registry.lookup(table.name()) {
                // the enclosing statement already scans this table; attach
                // a correlated right-link instead of scanning again
                match source.take() {
                    Some(left) => {
                        source = Some(LogicalPlan::Join {
                            left: Box::new(left),
                            right: None,
                            correlated_scan: Some(scan_id),
                        });
                    }
                    None => {
                        warn!("correlated scan {} without a local source", table.name());
                        return Err(QueryError::Internal(
                            "correlated sub-link needs a local source".to_string(),
                        ));
                    }
                }
                continue;
            }

            let fields: Vec<Field> = stmt
                .query_fields()
                .iter()
                .filter(|f| f.table_name() == Some(table.name()))
                .cloned()
                .collect();
            let scan_id = registry.register(table.clone(), true);
            let scan = LogicalPlan::TableGet {
                scan_id,
                table: table.clone(),
                fields,
                readonly: true,
            };
            source = Some(match source.take() {
                None => scan,
                Some(left) => LogicalPlan::Join {
                    left: Box::new(left),
                    right: Some(Box::new(scan)),
                    correlated_scan: None,
                },
            });
        }
        let source = source.ok_or_else(|| {
            QueryError::Internal("table fold produced no source".to_string())
        })?;

        // predicate sits between the source tree and the projection
        let mut plan = match stmt.filter().to_conjunction(registry)? {
            Some(predicate) => LogicalPlan::Predicate {
                predicate,
                input: Box::new(source),
            },
            None => source,
        };

        plan = LogicalPlan::Project {
            fields: stmt.query_fields().to_vec(),
            input: Box::new(plan),
        };

        if !stmt.group_by_fields().is_empty() {
            plan = LogicalPlan::GroupBy {
                fields: stmt.group_by_fields().to_vec(),
                input: Box::new(plan),
            };
        }

        if !stmt.order_by_fields().is_empty() {
            plan = LogicalPlan::OrderBy {
                fields: stmt.order_by_fields().to_vec(),
                directions: stmt.order_by_directions().to_vec(),
                input: Box::new(plan),
            };
        }

        if stmt.has_aggregates() {
            let having = stmt.having_filter().to_comparisons(registry)?;
            // aggregates first, then the group columns passed through
            let mut fields = stmt.aggr_fields().to_vec();
            fields.extend(stmt.group_by_fields().iter().cloned());
            plan = LogicalPlan::Aggregate {
                fields,
                mapping: stmt.aggr_to_query().clone(),
                having,
                input: Box::new(plan),
            };
        }

        Ok(plan)
    }

    fn create_insert(&self, stmt: &InsertStmt) -> QueryResult<LogicalPlan> {
        Ok(LogicalPlan::Insert {
            table: stmt.table().clone(),
            rows: stmt.rows().to_vec(),
        })
    }

    fn create_update(&self, stmt: &UpdateStmt) -> QueryResult<LogicalPlan> {
        let mut registry = ScanRegistry::new();
        let input = self.write_source(stmt.table(), stmt.filter(), &mut registry)?;

        let mut subquery_columns = Vec::new();
        let mut subquery_plans = Vec::new();
        for (column, select) in stmt.subquery_sets() {
            subquery_columns.push(column.clone());
            // SET sub-selects are independent scalar queries with scans of
            // their own
            let mut sub_registry = ScanRegistry::new();
            subquery_plans.push(self.create_select(select, &mut sub_registry)?);
        }

        Ok(LogicalPlan::Update {
            table: stmt.table().clone(),
            columns: stmt.attribute_names().to_vec(),
            values: stmt.values().to_vec(),
            subquery_columns,
            subquery_plans,
            input: Box::new(input),
        })
    }

    fn create_delete(&self, stmt: &DeleteStmt) -> QueryResult<LogicalPlan> {
        let mut registry = ScanRegistry::new();
        let input = self.write_source(stmt.table(), stmt.filter(), &mut registry)?;
        Ok(LogicalPlan::Delete {
            table: stmt.table().clone(),
            input: Box::new(input),
        })
    }

    /// Writable scan of every user column, optionally filtered
    fn write_source(
        &self,
        table: &Arc<Table>,
        filter: &crate::query::stmt::FilterStmt,
        registry: &mut ScanRegistry,
    ) -> QueryResult<LogicalPlan> {
        let fields: Vec<Field> = table
            .user_columns()
            .map(|c| Field::new(table.clone(), c.clone()))
            .collect();
        let scan_id = registry.register(table.clone(), false);
        let table_get = LogicalPlan::TableGet {
            scan_id,
            table: table.clone(),
            fields,
            readonly: false,
        };
        Ok(match filter.to_conjunction(registry)? {
            Some(predicate) => LogicalPlan::Predicate {
                predicate,
                input: Box::new(table_get),
            },
            None => table_get,
        })
    }
}
