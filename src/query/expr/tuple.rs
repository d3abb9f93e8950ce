// Tuple Protocol
//
// One row presented by a physical operator. Expressions resolve fields
// against the current tuple through `TupleCellSpec` keys.

use crate::common::error::{QueryError, QueryResult};
use crate::common::value::Value;

/// Key used to resolve a field against the current tuple.
///
/// A cell matches when the spec's alias equals the cell's alias, or when
/// table and field names line up. Post-aggregate tuples are keyed by alias
/// only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TupleCellSpec {
    table_name: Option<String>,
    field_name: String,
    alias: Option<String>,
}

impl TupleCellSpec {
    pub fn new(table_name: Option<&str>, field_name: &str) -> Self {
        TupleCellSpec {
            table_name: table_name.map(|s| s.to_string()),
            field_name: field_name.to_string(),
            alias: None,
        }
    }

    /// Key a cell by alias alone, the shape produced by aggregation
    pub fn aliased(alias: &str) -> Self {
        TupleCellSpec {
            table_name: None,
            field_name: alias.to_string(),
            alias: Some(alias.to_string()),
        }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }

    pub fn table_name(&self) -> Option<&str> {
        self.table_name.as_deref()
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Whether a cell labelled with `other` satisfies this lookup
    pub fn matches(&self, other: &TupleCellSpec) -> bool {
        if let (Some(want), Some(have)) = (self.alias(), other.alias()) {
            if want == have {
                return true;
            }
        }
        if self.field_name != other.field_name {
            return false;
        }
        match (self.table_name(), other.table_name()) {
            (Some(want), Some(have)) => want == have,
            // An unqualified lookup accepts any table
            (None, _) => true,
            (Some(_), None) => false,
        }
    }
}

/// One row presented by a physical operator
pub trait Tuple {
    /// Number of cells in this tuple
    fn cell_count(&self) -> usize;

    /// Cell by position
    fn cell_at(&self, index: usize) -> QueryResult<Value>;

    /// Cell by field lookup
    fn find_cell(&self, spec: &TupleCellSpec) -> QueryResult<Value>;
}

/// A materialized tuple: parallel lists of cell labels and values
#[derive(Debug, Clone, Default)]
pub struct ValueListTuple {
    specs: Vec<TupleCellSpec>,
    cells: Vec<Value>,
}

impl ValueListTuple {
    pub fn new(specs: Vec<TupleCellSpec>, cells: Vec<Value>) -> Self {
        debug_assert_eq!(specs.len(), cells.len());
        ValueListTuple { specs, cells }
    }

    pub fn push(&mut self, spec: TupleCellSpec, cell: Value) {
        self.specs.push(spec);
        self.cells.push(cell);
    }

    pub fn specs(&self) -> &[TupleCellSpec] {
        &self.specs
    }
}

impl Tuple for ValueListTuple {
    fn cell_count(&self) -> usize {
        self.cells.len()
    }

    fn cell_at(&self, index: usize) -> QueryResult<Value> {
        self.cells
            .get(index)
            .cloned()
            .ok_or_else(|| QueryError::Internal(format!("cell index {} out of range", index)))
    }

    fn find_cell(&self, spec: &TupleCellSpec) -> QueryResult<Value> {
        for (i, have) in self.specs.iter().enumerate() {
            if spec.matches(have) {
                return Ok(self.cells[i].clone());
            }
        }
        Err(QueryError::ColumnNotFound(format!(
            "{}{}",
            spec.table_name().map(|t| format!("{}.", t)).unwrap_or_default(),
            spec.field_name()
        )))
    }
}
