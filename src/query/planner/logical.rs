// Logical Query Plan Implementation
//
// This module defines the logical operator tree produced from a resolved
// statement. Nodes own their children; shared table scans are referenced
// through `ScanId` indices rather than pointers.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::catalog::Table;
use crate::common::value::Value;
use crate::query::ast::OrderDirection;
use crate::query::expr::expression::Expression;
use crate::query::stmt::field::Field;

/// Index into the plan's `ScanRegistry`
pub type ScanId = usize;

/// A node in the logical query plan
#[derive(Debug)]
pub enum LogicalPlan {
    /// Scan a table
    TableGet {
        scan_id: ScanId,
        table: Arc<Table>,
        fields: Vec<Field>,
        readonly: bool,
    },
    /// Filter rows by a conjunction of comparisons
    Predicate {
        predicate: Expression,
        input: Box<LogicalPlan>,
    },
    /// Project columns
    Project {
        fields: Vec<Field>,
        input: Box<LogicalPlan>,
    },
    /// Join two relations. A correlated sub-link has no owned right child;
    /// it re-opens the shared scan identified by `correlated_scan` on each
    /// outer row.
    Join {
        left: Box<LogicalPlan>,
        right: Option<Box<LogicalPlan>>,
        correlated_scan: Option<ScanId>,
    },
    /// Group rows by the given fields
    GroupBy {
        fields: Vec<Field>,
        input: Box<LogicalPlan>,
    },
    /// Order rows by the given fields and directions
    OrderBy {
        fields: Vec<Field>,
        directions: Vec<OrderDirection>,
        input: Box<LogicalPlan>,
    },
    /// Compute aggregates; `mapping` sends each aggregate to its projection
    /// index and `having` holds the post-aggregate predicates
    Aggregate {
        fields: Vec<Field>,
        mapping: BTreeMap<usize, usize>,
        having: Vec<Expression>,
        input: Box<LogicalPlan>,
    },
    /// Insert rows; no source child
    Insert {
        table: Arc<Table>,
        rows: Vec<Vec<Value>>,
    },
    /// Update rows; scalar SET values plus one child plan per SET sub-select
    Update {
        table: Arc<Table>,
        columns: Vec<String>,
        values: Vec<Value>,
        subquery_columns: Vec<String>,
        subquery_plans: Vec<LogicalPlan>,
        input: Box<LogicalPlan>,
    },
    /// Delete rows
    Delete {
        table: Arc<Table>,
        input: Box<LogicalPlan>,
    },
    /// Describe the child plan instead of running it
    Explain { child: Box<LogicalPlan> },
    /// Evaluate constant expressions with no table source
    Calc { expressions: Vec<Expression> },
}

impl LogicalPlan {
    /// Operator name as shown in plan output
    pub fn name(&self) -> &'static str {
        match self {
            LogicalPlan::TableGet { .. } => "TableGet",
            LogicalPlan::Predicate { .. } => "Predicate",
            LogicalPlan::Project { .. } => "Project",
            LogicalPlan::Join { .. } => "Join",
            LogicalPlan::GroupBy { .. } => "GroupBy",
            LogicalPlan::OrderBy { .. } => "OrderBy",
            LogicalPlan::Aggregate { .. } => "Aggregate",
            LogicalPlan::Insert { .. } => "Insert",
            LogicalPlan::Update { .. } => "Update",
            LogicalPlan::Delete { .. } => "Delete",
            LogicalPlan::Explain { .. } => "Explain",
            LogicalPlan::Calc { .. } => "Calc",
        }
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let pad = "  ".repeat(depth);
        match self {
            LogicalPlan::TableGet {
                table,
                fields,
                readonly,
                ..
            } => {
                let names: Vec<String> = fields
                    .iter()
                    .map(|fld| fld.column_name().unwrap_or("?").to_string())
                    .collect();
                writeln!(
                    f,
                    "{}TableGet: {} [{}]{}",
                    pad,
                    table.name(),
                    names.join(", "),
                    if *readonly { "" } else { " (write)" }
                )
            }
            LogicalPlan::Predicate { predicate, input } => {
                writeln!(f, "{}Predicate: {}", pad, predicate)?;
                input.fmt_indented(f, depth + 1)
            }
            LogicalPlan::Project { fields, input } => {
                let names: Vec<String> = fields.iter().map(field_label).collect();
                writeln!(f, "{}Project: [{}]", pad, names.join(", "))?;
                input.fmt_indented(f, depth + 1)
            }
            LogicalPlan::Join {
                left,
                right,
                correlated_scan,
            } => {
                match correlated_scan {
                    Some(id) => writeln!(f, "{}Join: correlated sub-link scan #{}", pad, id)?,
                    None => writeln!(f, "{}Join", pad)?,
                }
                left.fmt_indented(f, depth + 1)?;
                if let Some(right) = right {
                    right.fmt_indented(f, depth + 1)?;
                }
                Ok(())
            }
            LogicalPlan::GroupBy { fields, input } => {
                let names: Vec<String> = fields.iter().map(field_label).collect();
                writeln!(f, "{}GroupBy: [{}]", pad, names.join(", "))?;
                input.fmt_indented(f, depth + 1)
            }
            LogicalPlan::OrderBy {
                fields,
                directions,
                input,
            } => {
                let entries: Vec<String> = fields
                    .iter()
                    .zip(directions.iter())
                    .map(|(fld, dir)| {
                        format!(
                            "{} {}",
                            field_label(fld),
                            match dir {
                                OrderDirection::Asc => "ASC",
                                OrderDirection::Desc => "DESC",
                            }
                        )
                    })
                    .collect();
                writeln!(f, "{}OrderBy: [{}]", pad, entries.join(", "))?;
                input.fmt_indented(f, depth + 1)
            }
            LogicalPlan::Aggregate {
                fields,
                having,
                input,
                ..
            } => {
                let names: Vec<String> = fields.iter().map(field_label).collect();
                if having.is_empty() {
                    writeln!(f, "{}Aggregate: [{}]", pad, names.join(", "))?;
                } else {
                    let preds: Vec<String> = having.iter().map(|h| h.to_string()).collect();
                    writeln!(
                        f,
                        "{}Aggregate: [{}] HAVING {}",
                        pad,
                        names.join(", "),
                        preds.join(" AND ")
                    )?;
                }
                input.fmt_indented(f, depth + 1)
            }
            LogicalPlan::Insert { table, rows } => {
                writeln!(f, "{}Insert: {} ({} rows)", pad, table.name(), rows.len())
            }
            LogicalPlan::Update { table, columns, input, .. } => {
                writeln!(f, "{}Update: {} SET [{}]", pad, table.name(), columns.join(", "))?;
                input.fmt_indented(f, depth + 1)
            }
            LogicalPlan::Delete { table, input } => {
                writeln!(f, "{}Delete: {}", pad, table.name())?;
                input.fmt_indented(f, depth + 1)
            }
            LogicalPlan::Explain { child } => {
                writeln!(f, "{}Explain", pad)?;
                child.fmt_indented(f, depth + 1)
            }
            LogicalPlan::Calc { expressions } => {
                let exprs: Vec<String> = expressions.iter().map(|e| e.to_string()).collect();
                writeln!(f, "{}Calc: [{}]", pad, exprs.join(", "))
            }
        }
    }
}

fn field_label(field: &Field) -> String {
    if let Some(alias) = field.alias() {
        return alias.to_string();
    }
    match (field.table_name(), field.column_name()) {
        (Some(table), Some(col)) => format!("{}.{}", table, col),
        (None, Some(col)) => col.to_string(),
        _ => {
            if field.is_aggregated() {
                format!("{}(*)", field.aggr_func())
            } else {
                "?".to_string()
            }
        }
    }
}

impl fmt::Display for LogicalPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}
