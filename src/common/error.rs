// Error Types
//
// This module defines the result codes shared by the resolver, the planner
// and expression evaluation.

use thiserror::Error;

/// Errors produced while resolving, planning or evaluating a statement.
///
/// Validation errors (`SqlSyntax`, `TableNotFound`, `ColumnNotFound`,
/// `InvalidAggregate`, `ScalarSubquery`) are reported to the client verbatim.
/// `RecordEof` is a control signal that terminates fetch loops and must never
/// surface to user SQL.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    /// Malformed statement that passed the parser but not resolution
    #[error("SQL syntax error: {0}")]
    SqlSyntax(String),
    /// Table not found in the catalog
    #[error("table not found: {0}")]
    TableNotFound(String),
    /// Column not found in any table in scope
    #[error("column not found: {0}")]
    ColumnNotFound(String),
    /// Illegal aggregate usage (non-COUNT over *, aggregate/plain mixing)
    #[error("invalid aggregate usage: {0}")]
    InvalidAggregate(String),
    /// A scalar sub-query produced something other than a single column/row
    #[error("scalar sub-query error: {0}")]
    ScalarSubquery(String),
    /// An expression list was used where at least one element is required
    #[error("expression list is empty")]
    EmptyExpressionList,
    /// Invalid input to evaluation or resolution
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// End of a tuple stream; control flow only
    #[error("end of records")]
    RecordEof,
    /// Feature outside the supported statement surface
    #[error("not implemented: {0}")]
    Unimplemented(String),
    /// Invariant violation; indicates a bug
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;
