// Query Processing Module
//
// This module contains the statement resolver, the expression tree and the
// logical plan generator. Parsing and physical execution live outside the
// crate; the AST comes in through `ast` and executable plans leave through
// the `planner::physical` boundary traits.

pub mod ast;
pub mod expr;
pub mod planner;
pub mod stmt;

pub use planner::{LogicalPlan, LogicalPlanGenerator};
pub use stmt::Statement;
