// Filter Statement Implementation
//
// A resolved WHERE or HAVING clause: a vector of filter units that compile
// into one AND conjunction of comparisons at planning time.

use std::sync::Arc;

use log::warn;

use crate::catalog::{Catalog, Table};
use crate::common::error::{QueryError, QueryResult};
use crate::common::value::Value;
use crate::query::ast::{AggrFunc, CompOp, CondOperand, ConditionSqlNode, ExprSqlNode, RelAttrSqlNode};
use crate::query::expr::expression::{
    ComparisonExpr, ConjunctionExpr, ConjunctionKind, Expression, FieldExpr, ListExpr, ValueExpr,
};
use crate::query::expr::subquery::SubqueryExpr;
use crate::query::planner::generator::ScanRegistry;

use super::field::{aggr_alias, Field};
use super::select::SelectStmt;
use super::Scope;

/// One resolved operand of a filter unit
#[derive(Debug)]
pub enum FilterOperand {
    Field(Field),
    Value(Value),
    SubQuery(Box<SelectStmt>),
    List(Vec<FilterOperand>),
}

impl FilterOperand {
    /// Compile this operand into an expression node. Sub-selects are
    /// lowered here; the registry lets them share scans with the outer
    /// statement.
    pub fn to_expression(&self, registry: &mut ScanRegistry) -> QueryResult<Expression> {
        match self {
            FilterOperand::Field(field) => Ok(Expression::Field(FieldExpr::new(field.clone()))),
            FilterOperand::Value(value) => Ok(Expression::Value(ValueExpr::new(value.clone()))),
            FilterOperand::SubQuery(stmt) => {
                Ok(Expression::Subquery(SubqueryExpr::new(stmt, registry)?))
            }
            FilterOperand::List(elements) => {
                let exprs = elements
                    .iter()
                    .map(|e| e.to_expression(registry))
                    .collect::<QueryResult<Vec<_>>>()?;
                Ok(Expression::List(ListExpr::new(exprs)))
            }
        }
    }
}

/// One resolved condition: `left comp right`
#[derive(Debug)]
pub struct FilterUnit {
    left: FilterOperand,
    comp: CompOp,
    right: FilterOperand,
}

impl FilterUnit {
    pub fn new(left: FilterOperand, comp: CompOp, right: FilterOperand) -> Self {
        FilterUnit { left, comp, right }
    }

    pub fn left(&self) -> &FilterOperand {
        &self.left
    }

    pub fn comp(&self) -> CompOp {
        self.comp
    }

    pub fn right(&self) -> &FilterOperand {
        &self.right
    }
}

/// A resolved WHERE or HAVING clause
#[derive(Debug, Default)]
pub struct FilterStmt {
    units: Vec<FilterUnit>,
}

impl FilterStmt {
    /// Resolve a condition list against the visible scope.
    ///
    /// `default_table` supplies the binding for unqualified columns and is
    /// only present when exactly one table is in the local FROM list.
    pub fn resolve(
        catalog: &Catalog,
        default_table: Option<&Arc<Table>>,
        scope: &mut Scope,
        conditions: &[ConditionSqlNode],
    ) -> QueryResult<FilterStmt> {
        let mut units = Vec::with_capacity(conditions.len());
        for condition in conditions {
            let left = Self::resolve_operand(catalog, default_table, scope, &condition.left)?;
            let right = Self::resolve_operand(catalog, default_table, scope, &condition.right)?;
            units.push(FilterUnit::new(left, condition.comp, right));
        }
        Ok(FilterStmt { units })
    }

    fn resolve_operand(
        catalog: &Catalog,
        default_table: Option<&Arc<Table>>,
        scope: &mut Scope,
        operand: &CondOperand,
    ) -> QueryResult<FilterOperand> {
        match operand {
            CondOperand::Value(value) => Ok(FilterOperand::Value(value.clone())),
            CondOperand::Attr(attr) => {
                Self::resolve_attr(default_table, scope, attr).map(FilterOperand::Field)
            }
            CondOperand::SubSelect(select) => {
                let stmt = SelectStmt::resolve_in_scope(catalog, select, true, scope)?;
                Ok(FilterOperand::SubQuery(Box::new(stmt)))
            }
            CondOperand::List(elements) => {
                let mut resolved = Vec::with_capacity(elements.len());
                for element in elements {
                    match element {
                        ExprSqlNode::Value(value) => {
                            resolved.push(FilterOperand::Value(value.clone()))
                        }
                        ExprSqlNode::Attr(attr) => resolved.push(FilterOperand::Field(
                            Self::resolve_attr(default_table, scope, attr)?,
                        )),
                        ExprSqlNode::Arith { .. } => {
                            return Err(QueryError::Unimplemented(
                                "arithmetic inside an IN list".to_string(),
                            ))
                        }
                    }
                }
                Ok(FilterOperand::List(resolved))
            }
        }
    }

    /// Bind a parsed column reference inside a condition.
    ///
    /// Aggregate-tagged references appear in HAVING and resolve to fields
    /// keyed by their canonical aggregate alias, matching the shape of
    /// post-aggregate tuples.
    fn resolve_attr(
        default_table: Option<&Arc<Table>>,
        scope: &Scope,
        attr: &RelAttrSqlNode,
    ) -> QueryResult<Field> {
        if let Some(value) = &attr.constant_value {
            return Ok(Field::constant(value.clone()));
        }

        if attr.is_wildcard() {
            if attr.aggr_func == AggrFunc::Count {
                return Ok(Field::count_star().with_alias(aggr_alias(AggrFunc::Count, None, None)));
            }
            warn!("wildcard is not a value in a condition");
            return Err(QueryError::InvalidArgument(
                "* cannot appear in a condition".to_string(),
            ));
        }

        let table = match &attr.relation_name {
            Some(name) => scope
                .table(name)
                .cloned()
                .ok_or_else(|| {
                    warn!("no such table in from list: {}", name);
                    QueryError::ColumnNotFound(format!("{}.{}", name, attr.attribute_name))
                })?,
            None => default_table.cloned().ok_or_else(|| {
                warn!("cannot bind unqualified column: {}", attr.attribute_name);
                QueryError::ColumnNotFound(attr.attribute_name.clone())
            })?,
        };

        let column = table.column(&attr.attribute_name).cloned().ok_or_else(|| {
            warn!(
                "no such field: {}.{}",
                table.name(),
                attr.attribute_name
            );
            QueryError::ColumnNotFound(format!("{}.{}", table.name(), attr.attribute_name))
        })?;

        let mut field = Field::new(table, column).with_aggr(attr.aggr_func);
        if attr.aggr_func != AggrFunc::None {
            let alias = aggr_alias(
                attr.aggr_func,
                attr.relation_name.as_deref(),
                Some(&attr.attribute_name),
            );
            field = field.with_alias(alias);
        }
        Ok(field)
    }

    pub fn units(&self) -> &[FilterUnit] {
        &self.units
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Compile the units into one comparison per unit
    pub fn to_comparisons(&self, registry: &mut ScanRegistry) -> QueryResult<Vec<Expression>> {
        let mut comparisons = Vec::with_capacity(self.units.len());
        for unit in &self.units {
            let left = unit.left().to_expression(registry)?;
            let right = unit.right().to_expression(registry)?;
            comparisons.push(Expression::Comparison(ComparisonExpr::new(
                unit.comp(),
                left,
                right,
            )));
        }
        Ok(comparisons)
    }

    /// Compile the whole filter into an AND conjunction, or `None` when
    /// there is nothing to filter on
    pub fn to_conjunction(&self, registry: &mut ScanRegistry) -> QueryResult<Option<Expression>> {
        if self.units.is_empty() {
            return Ok(None);
        }
        let comparisons = self.to_comparisons(registry)?;
        Ok(Some(Expression::Conjunction(ConjunctionExpr::new(
            ConjunctionKind::And,
            comparisons,
        ))))
    }
}
