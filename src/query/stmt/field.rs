// Resolved Field
//
// A field is a column reference bound against the catalog, together with
// the aggregate/scalar function tags and the canonical alias assigned by
// the resolver. Fields are immutable once resolution finishes.

use std::sync::Arc;

use crate::catalog::{Column, Table};
use crate::common::types::AttrType;
use crate::common::value::Value;
use crate::query::ast::{AggrFunc, ScalarFunc};
use crate::query::expr::tuple::TupleCellSpec;

/// A resolved column reference.
///
/// The table handle is absent only for pure constants and for `COUNT(*)`.
#[derive(Debug, Clone)]
pub struct Field {
    table: Option<Arc<Table>>,
    column: Option<Column>,
    alias: Option<String>,
    aggr_func: AggrFunc,
    scalar_func: ScalarFunc,
    constant: Option<Value>,
}

impl Field {
    /// A plain column of a table
    pub fn new(table: Arc<Table>, column: Column) -> Self {
        Field {
            table: Some(table),
            column: Some(column),
            alias: None,
            aggr_func: AggrFunc::None,
            scalar_func: ScalarFunc::None,
            constant: None,
        }
    }

    /// The `COUNT(*)` field: no table, no column
    pub fn count_star() -> Self {
        Field {
            table: None,
            column: None,
            alias: None,
            aggr_func: AggrFunc::Count,
            scalar_func: ScalarFunc::None,
            constant: None,
        }
    }

    /// A constant stand-in appearing in a select list
    pub fn constant(value: Value) -> Self {
        Field {
            table: None,
            column: None,
            alias: None,
            aggr_func: AggrFunc::None,
            scalar_func: ScalarFunc::None,
            constant: Some(value),
        }
    }

    pub fn with_aggr(mut self, aggr: AggrFunc) -> Self {
        self.aggr_func = aggr;
        self
    }

    pub fn with_func(mut self, func: ScalarFunc) -> Self {
        self.scalar_func = func;
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn table(&self) -> Option<&Arc<Table>> {
        self.table.as_ref()
    }

    pub fn table_name(&self) -> Option<&str> {
        self.table.as_deref().map(|t| t.name())
    }

    pub fn column(&self) -> Option<&Column> {
        self.column.as_ref()
    }

    pub fn column_name(&self) -> Option<&str> {
        self.column.as_ref().map(|c| c.name())
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn aggr_func(&self) -> AggrFunc {
        self.aggr_func
    }

    pub fn scalar_func(&self) -> ScalarFunc {
        self.scalar_func
    }

    pub fn constant_value(&self) -> Option<&Value> {
        self.constant.as_ref()
    }

    pub fn is_constant(&self) -> bool {
        self.constant.is_some()
    }

    pub fn is_aggregated(&self) -> bool {
        self.aggr_func != AggrFunc::None
    }

    /// Result type of this field after function application
    pub fn value_type(&self) -> AttrType {
        if let Some(v) = &self.constant {
            return v.attr_type();
        }
        let column_type = self
            .column
            .as_ref()
            .map(|c| c.attr_type())
            .unwrap_or(AttrType::Null);
        match self.aggr_func {
            AggrFunc::Count => AttrType::Ints,
            AggrFunc::Avg => AttrType::Floats,
            AggrFunc::Sum => {
                if column_type == AttrType::Ints {
                    AttrType::Ints
                } else {
                    AttrType::Floats
                }
            }
            AggrFunc::Min | AggrFunc::Max | AggrFunc::None => column_type,
        }
    }

    /// The lookup key this field resolves with against the current tuple.
    ///
    /// Aggregate-tagged fields live in post-aggregate tuples and are keyed
    /// by their canonical alias; plain fields are keyed by table and column.
    pub fn cell_spec(&self) -> TupleCellSpec {
        if self.is_aggregated() {
            let alias = self
                .alias
                .clone()
                .unwrap_or_else(|| match self.column_name() {
                    Some(col) => format!("{}({})", self.aggr_func, col),
                    None => format!("{}(*)", self.aggr_func),
                });
            return TupleCellSpec::aliased(&alias);
        }
        let mut spec = TupleCellSpec::new(
            self.table_name(),
            self.column_name().unwrap_or_default(),
        );
        if let Some(alias) = &self.alias {
            spec = spec.with_alias(alias);
        }
        spec
    }
}

/// Canonical alias of an aggregate-wrapped column: `COUNT(*)`,
/// `MAX(t.a)` or `MAX(a)` depending on the qualifier in use.
pub fn aggr_alias(aggr: AggrFunc, qualifier: Option<&str>, column: Option<&str>) -> String {
    match column {
        Some(col) => match qualifier {
            Some(q) => format!("{}({}.{})", aggr, q, col),
            None => format!("{}({})", aggr, col),
        },
        None => format!("{}(*)", aggr),
    }
}

/// Canonical alias of a scalar-function-wrapped column
pub fn func_alias(func: ScalarFunc, qualifier: Option<&str>, column: &str) -> String {
    match qualifier {
        Some(q) => format!("{}({}.{})", func, q, column),
        None => format!("{}({})", func, column),
    }
}
