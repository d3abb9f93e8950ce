// Physical Plan Boundary
//
// The physical planner and its operators live outside this crate. The core
// drives them through these traits: a plan is created from a logical root,
// then pumped with the open / next / current_tuple / close protocol.
// Exhaustion is signalled by `QueryError::RecordEof` from `next`.

use crate::common::error::QueryResult;
use crate::query::expr::tuple::Tuple;
use crate::query::planner::logical::LogicalPlan;

/// An executable operator: a lazy, restartable, finite sequence of tuples.
///
/// Cancellation is an operator concern: closing the root makes subsequent
/// `next` calls fail, and that error propagates up through expression
/// evaluation.
pub trait PhysicalOperator {
    /// Prepare the operator for iteration
    fn open(&mut self) -> QueryResult<()>;

    /// Advance to the next tuple; `RecordEof` when the stream is exhausted
    fn next(&mut self) -> QueryResult<()>;

    /// The tuple produced by the last successful `next`
    fn current_tuple(&self) -> Option<&dyn Tuple>;

    /// Release resources; every `open` is paired with exactly one `close`
    fn close(&mut self) -> QueryResult<()>;
}

/// Factory turning a logical tree into an executable operator tree.
///
/// The logical plan is consumed: expressions move out of logical nodes
/// into the operators that evaluate them. Scan descriptors are embedded in
/// `TableGet` nodes; a correlated sub-link refers to its shared scan by
/// `ScanId`, so an implementation that supports correlation keeps its own
/// scan-id map across `create` calls.
pub trait PhysicalPlanner {
    fn create(&self, plan: LogicalPlan) -> QueryResult<Box<dyn PhysicalOperator>>;
}
