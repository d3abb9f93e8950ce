// Shared test fixtures: a catalog with in-memory table data and a small
// implementation of the physical boundary that interprets logical plans
// over materialized rows.
#![allow(dead_code)]

use std::cmp::Ordering;
use std::collections::HashMap;
use std::rc::Rc;

use rowandb::catalog::{Catalog, Column, Table};
use rowandb::common::{AttrType, QueryError, QueryResult, Value};
use rowandb::query::ast::{OrderDirection, SqlNode};
use rowandb::query::expr::{Tuple, TupleCellSpec, ValueListTuple};
use rowandb::query::planner::{LogicalPlan, LogicalPlanGenerator, PhysicalOperator, PhysicalPlanner};
use rowandb::query::stmt::{Field, Statement};

/// A catalog plus row data for each table
pub struct MemoryDb {
    pub catalog: Catalog,
    rows: Rc<HashMap<String, Vec<Vec<Value>>>>,
}

impl MemoryDb {
    pub fn new(catalog: Catalog, data: Vec<(&str, Vec<Vec<Value>>)>) -> Self {
        let rows = data
            .into_iter()
            .map(|(name, rows)| (name.to_string(), rows))
            .collect();
        MemoryDb {
            catalog,
            rows: Rc::new(rows),
        }
    }

    pub fn planner(&self) -> MemoryPlanner {
        MemoryPlanner {
            rows: self.rows.clone(),
        }
    }

    /// Resolve, plan and execute a statement, returning rows of values
    pub fn run(&self, node: SqlNode) -> QueryResult<Vec<Vec<Value>>> {
        let stmt = Statement::resolve(&self.catalog, &node)?;
        let plan = LogicalPlanGenerator::new().create(stmt)?;
        let planner = self.planner();
        let mut root = planner.create(plan)?;
        root.open()?;
        let mut out = Vec::new();
        loop {
            match root.next() {
                Ok(()) => {
                    let tuple = root
                        .current_tuple()
                        .ok_or_else(|| QueryError::Internal("no current tuple".to_string()))?;
                    let mut row = Vec::with_capacity(tuple.cell_count());
                    for i in 0..tuple.cell_count() {
                        row.push(tuple.cell_at(i)?);
                    }
                    out.push(row);
                }
                Err(QueryError::RecordEof) => break,
                Err(e) => {
                    let _ = root.close();
                    return Err(e);
                }
            }
        }
        root.close()?;
        Ok(out)
    }
}

/// The standard two-table fixture used across the integration suites:
/// `t(a INT, b CHARS)` and `u(b CHARS, c INT)`.
pub fn fixture_catalog() -> Catalog {
    let catalog = Catalog::new();
    catalog
        .create_table(Table::new(
            "t",
            vec![
                Column::new("a", AttrType::Ints, true),
                Column::new("b", AttrType::Chars, true),
            ],
        ))
        .unwrap();
    catalog
        .create_table(Table::new(
            "u",
            vec![
                Column::new("b", AttrType::Chars, true),
                Column::new("c", AttrType::Ints, true),
            ],
        ))
        .unwrap();
    catalog
}

pub fn chars(s: &str) -> Value {
    Value::Chars(s.to_string())
}

/// In-memory physical planner: interprets a logical plan eagerly at open
/// time and streams the materialized rows through the operator protocol.
#[derive(Clone)]
pub struct MemoryPlanner {
    rows: Rc<HashMap<String, Vec<Vec<Value>>>>,
}

impl PhysicalPlanner for MemoryPlanner {
    fn create(&self, plan: LogicalPlan) -> QueryResult<Box<dyn PhysicalOperator>> {
        Ok(Box::new(MemOperator {
            planner: self.clone(),
            plan,
            rows: Vec::new(),
            cursor: 0,
            current: None,
            is_open: false,
        }))
    }
}

/// Root operator handed back by `MemoryPlanner::create`
pub struct MemOperator {
    planner: MemoryPlanner,
    plan: LogicalPlan,
    rows: Vec<ValueListTuple>,
    cursor: usize,
    current: Option<usize>,
    is_open: bool,
}

impl PhysicalOperator for MemOperator {
    fn open(&mut self) -> QueryResult<()> {
        self.rows = eval(&self.plan, &self.planner)?;
        self.cursor = 0;
        self.current = None;
        self.is_open = true;
        Ok(())
    }

    fn next(&mut self) -> QueryResult<()> {
        if !self.is_open {
            return Err(QueryError::Internal("operator is not open".to_string()));
        }
        if self.cursor >= self.rows.len() {
            return Err(QueryError::RecordEof);
        }
        self.current = Some(self.cursor);
        self.cursor += 1;
        Ok(())
    }

    fn current_tuple(&self) -> Option<&dyn Tuple> {
        self.current.map(|i| &self.rows[i] as &dyn Tuple)
    }

    fn close(&mut self) -> QueryResult<()> {
        self.rows.clear();
        self.current = None;
        self.is_open = false;
        Ok(())
    }
}

/// Evaluate a logical plan to materialized tuples
fn eval(plan: &LogicalPlan, planner: &MemoryPlanner) -> QueryResult<Vec<ValueListTuple>> {
    match plan {
        LogicalPlan::TableGet { table, .. } => {
            let specs: Vec<TupleCellSpec> = table
                .user_columns()
                .map(|c| TupleCellSpec::new(Some(table.name()), c.name()))
                .collect();
            let rows = planner
                .rows
                .get(table.name())
                .cloned()
                .unwrap_or_default();
            Ok(rows
                .into_iter()
                .map(|cells| ValueListTuple::new(specs.clone(), cells))
                .collect())
        }
        LogicalPlan::Predicate { predicate, input } => {
            predicate.init_subqueries(planner)?;
            let rows = eval(input, planner)?;
            let mut out = Vec::new();
            for row in rows {
                if predicate.get_value(&row)?.get_boolean() {
                    out.push(row);
                }
            }
            Ok(out)
        }
        LogicalPlan::Project { fields, input } => {
            let rows = eval(input, planner)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(project_row(fields, &row)?);
            }
            Ok(out)
        }
        LogicalPlan::Join {
            left,
            right: Some(right),
            correlated_scan: None,
        } => {
            let left_rows = eval(left, planner)?;
            let right_rows = eval(right, planner)?;
            let mut out = Vec::new();
            for l in &left_rows {
                for r in &right_rows {
                    let mut merged = l.clone();
                    for (spec, i) in r.specs().iter().zip(0..r.cell_count()) {
                        merged.push(spec.clone(), r.cell_at(i)?);
                    }
                    out.push(merged);
                }
            }
            Ok(out)
        }
        LogicalPlan::Join { .. } => Err(QueryError::Unimplemented(
            "correlated join execution in the test harness".to_string(),
        )),
        // grouping is carried out by the Aggregate node above
        LogicalPlan::GroupBy { input, .. } => eval(input, planner),
        LogicalPlan::OrderBy {
            fields,
            directions,
            input,
        } => {
            let rows = eval(input, planner)?;
            sort_rows(rows, fields, directions)
        }
        LogicalPlan::Aggregate {
            fields,
            having,
            input,
            ..
        } => {
            // walk down to the raw row source, collecting group columns
            let mut group_fields: &[Field] = &[];
            let mut node: &LogicalPlan = input;
            loop {
                match node {
                    LogicalPlan::GroupBy { fields, input } => {
                        group_fields = fields.as_slice();
                        node = input.as_ref();
                    }
                    LogicalPlan::OrderBy { input, .. } | LogicalPlan::Project { input, .. } => {
                        node = input.as_ref();
                    }
                    other => break eval_aggregate(fields, group_fields, having, other, planner),
                }
            }
        }
        LogicalPlan::Calc { expressions } => {
            let mut tuple = ValueListTuple::default();
            for expr in expressions {
                tuple.push(TupleCellSpec::aliased(&expr.to_string()), expr.try_get_value()?);
            }
            Ok(vec![tuple])
        }
        LogicalPlan::Explain { child } => {
            let mut tuple = ValueListTuple::default();
            tuple.push(
                TupleCellSpec::aliased("Query Plan"),
                Value::Chars(child.to_string()),
            );
            Ok(vec![tuple])
        }
        LogicalPlan::Insert { .. } | LogicalPlan::Update { .. } | LogicalPlan::Delete { .. } => {
            Err(QueryError::Unimplemented(
                "write execution in the test harness".to_string(),
            ))
        }
    }
}

fn project_row(fields: &[Field], row: &ValueListTuple) -> QueryResult<ValueListTuple> {
    let mut tuple = ValueListTuple::default();
    for field in fields {
        let value = match field.constant_value() {
            Some(v) => v.clone(),
            None => row.find_cell(&field.cell_spec())?,
        };
        tuple.push(field.cell_spec(), value);
    }
    Ok(tuple)
}

fn sort_rows(
    rows: Vec<ValueListTuple>,
    fields: &[Field],
    directions: &[OrderDirection],
) -> QueryResult<Vec<ValueListTuple>> {
    let mut keyed = Vec::with_capacity(rows.len());
    for row in rows {
        let mut key = Vec::with_capacity(fields.len());
        for field in fields {
            key.push(row.find_cell(&field.cell_spec())?);
        }
        keyed.push((key, row));
    }
    keyed.sort_by(|(a, _), (b, _)| {
        for ((av, bv), direction) in a.iter().zip(b.iter()).zip(directions.iter()) {
            let ordering = cmp_with_nulls(av, bv);
            let ordering = match direction {
                OrderDirection::Asc => ordering,
                OrderDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
    Ok(keyed.into_iter().map(|(_, row)| row).collect())
}

/// NULLs sort first; incomparable pairs stay where they are
fn cmp_with_nulls(a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.compare(b).unwrap_or(Ordering::Equal),
    }
}

fn eval_aggregate(
    fields: &[Field],
    group_fields: &[Field],
    having: &[rowandb::query::expr::Expression],
    source: &LogicalPlan,
    planner: &MemoryPlanner,
) -> QueryResult<Vec<ValueListTuple>> {
    let rows = eval(source, planner)?;

    // group rows by the group-column values; NULL keys share a group
    let mut groups: Vec<(Vec<Value>, Vec<ValueListTuple>)> = Vec::new();
    for row in rows {
        let mut key = Vec::with_capacity(group_fields.len());
        for field in group_fields {
            key.push(row.find_cell(&field.cell_spec())?);
        }
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(row),
            None => groups.push((key, vec![row])),
        }
    }
    // an aggregate without GROUP BY always yields one row
    if group_fields.is_empty() && groups.is_empty() {
        groups.push((Vec::new(), Vec::new()));
    }

    let mut out = Vec::new();
    for (key, members) in &groups {
        let mut tuple = ValueListTuple::default();
        for field in fields {
            if field.is_aggregated() {
                tuple.push(field.cell_spec(), compute_aggregate(field, members)?);
            } else {
                let idx = group_fields
                    .iter()
                    .position(|g| {
                        g.table_name() == field.table_name()
                            && g.column_name() == field.column_name()
                    })
                    .ok_or_else(|| {
                        QueryError::Internal(format!(
                            "plain aggregate output {:?} is not a group column",
                            field.column_name()
                        ))
                    })?;
                tuple.push(field.cell_spec(), key[idx].clone());
            }
        }
        out.push(tuple);
    }

    for predicate in having {
        predicate.init_subqueries(planner)?;
    }
    let mut kept = Vec::new();
    'rows: for tuple in out {
        for predicate in having {
            if !predicate.get_value(&tuple)?.get_boolean() {
                continue 'rows;
            }
        }
        kept.push(tuple);
    }
    Ok(kept)
}

fn compute_aggregate(field: &Field, members: &[ValueListTuple]) -> QueryResult<Value> {
    use rowandb::query::ast::AggrFunc;

    // COUNT(*) has no source column
    let column_values = |members: &[ValueListTuple]| -> QueryResult<Vec<Value>> {
        let spec = TupleCellSpec::new(field.table_name(), field.column_name().unwrap_or_default());
        let mut values = Vec::new();
        for row in members {
            let v = row.find_cell(&spec)?;
            if !v.is_null() {
                values.push(v);
            }
        }
        Ok(values)
    };

    match field.aggr_func() {
        AggrFunc::Count => {
            if field.column_name().is_none() {
                Ok(Value::Int(members.len() as i64))
            } else {
                Ok(Value::Int(column_values(members)?.len() as i64))
            }
        }
        AggrFunc::Sum => {
            let values = column_values(members)?;
            if values.is_empty() {
                return Ok(Value::Null);
            }
            if values.iter().all(|v| v.attr_type() == AttrType::Ints) {
                Ok(Value::Int(values.iter().map(|v| v.get_int()).sum()))
            } else {
                Ok(Value::Float(values.iter().map(|v| v.get_float()).sum()))
            }
        }
        AggrFunc::Avg => {
            let values = column_values(members)?;
            if values.is_empty() {
                return Ok(Value::Null);
            }
            let total: f64 = values.iter().map(|v| v.get_float()).sum();
            Ok(Value::Float(total / values.len() as f64))
        }
        AggrFunc::Min => {
            let values = column_values(members)?;
            Ok(values
                .into_iter()
                .reduce(|a, b| {
                    if matches!(b.compare(&a), Some(Ordering::Less)) {
                        b
                    } else {
                        a
                    }
                })
                .unwrap_or(Value::Null))
        }
        AggrFunc::Max => {
            let values = column_values(members)?;
            Ok(values
                .into_iter()
                .reduce(|a, b| {
                    if matches!(b.compare(&a), Some(Ordering::Greater)) {
                        b
                    } else {
                        a
                    }
                })
                .unwrap_or(Value::Null))
        }
        AggrFunc::None => Err(QueryError::Internal(
            "compute_aggregate on a plain field".to_string(),
        )),
    }
}
