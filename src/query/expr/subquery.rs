// Sub-query Expression
//
// Wraps a resolved nested SELECT as an expression whose evaluation pumps a
// child physical plan. Construction lowers the statement into a logical
// root through the plan generator; `gen_physical` materializes the
// executable tree through the external planner boundary.
//
// The expression tree is immutable after resolution except for this node,
// which transitions through unplanned -> planned -> open -> exhausted ->
// closed as it is driven. An IN probe runs one full open/close cycle per
// outer row.

use std::cell::{Cell, RefCell};
use std::fmt;

use log::warn;

use crate::common::error::{QueryError, QueryResult};
use crate::common::types::AttrType;
use crate::common::value::Value;
use crate::query::planner::generator::{LogicalPlanGenerator, ScanRegistry};
use crate::query::planner::logical::LogicalPlan;
use crate::query::planner::physical::{PhysicalOperator, PhysicalPlanner};
use crate::query::stmt::select::SelectStmt;

/// Runtime state of a sub-query expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubqueryState {
    Unplanned,
    Planned,
    Open,
    Exhausted,
    Closed,
}

/// A nested SELECT usable as a scalar operand or an IN source
pub struct SubqueryExpr {
    /// Present until `gen_physical` hands the plan to the planner
    logical: RefCell<Option<Box<LogicalPlan>>>,
    output_type: AttrType,
    state: Cell<SubqueryState>,
    physical: RefCell<Option<Box<dyn PhysicalOperator>>>,
}

impl SubqueryExpr {
    /// Lower a resolved sub-select into its logical plan. The registry is
    /// shared with the enclosing statement so scans can be shared with the
    /// outer query.
    pub fn new(stmt: &SelectStmt, registry: &mut ScanRegistry) -> QueryResult<Self> {
        let generator = LogicalPlanGenerator::new();
        let logical = generator.create_select(stmt, registry)?;
        let output_type = stmt
            .query_fields()
            .first()
            .map(|f| f.value_type())
            .unwrap_or(AttrType::Null);
        Ok(SubqueryExpr {
            logical: RefCell::new(Some(Box::new(logical))),
            output_type,
            state: Cell::new(SubqueryState::Unplanned),
            physical: RefCell::new(None),
        })
    }

    /// Render the logical plan; `None` once planning consumed it
    pub fn describe_logical_plan(&self) -> Option<String> {
        self.logical.borrow().as_ref().map(|plan| plan.to_string())
    }

    pub fn state(&self) -> SubqueryState {
        self.state.get()
    }

    /// Type of the single column this sub-query produces
    pub fn value_type(&self) -> AttrType {
        self.output_type
    }

    /// Materialize the physical plan through the external planner
    pub fn gen_physical(&self, planner: &dyn PhysicalPlanner) -> QueryResult<()> {
        if self.state.get() != SubqueryState::Unplanned {
            return Err(QueryError::Internal(
                "sub-query physical plan already generated".to_string(),
            ));
        }
        let plan = self.logical.borrow_mut().take().ok_or_else(|| {
            QueryError::Internal("sub-query logical plan already consumed".to_string())
        })?;
        let operator = planner.create(*plan)?;
        *self.physical.borrow_mut() = Some(operator);
        self.state.set(SubqueryState::Planned);
        Ok(())
    }

    pub fn open(&self) -> QueryResult<()> {
        match self.state.get() {
            SubqueryState::Planned | SubqueryState::Closed => {}
            other => {
                return Err(QueryError::Internal(format!(
                    "sub-query open in state {:?}",
                    other
                )))
            }
        }
        let mut guard = self.physical.borrow_mut();
        let operator = guard
            .as_mut()
            .ok_or_else(|| QueryError::Internal("sub-query has no physical plan".to_string()))?;
        operator.open()?;
        self.state.set(SubqueryState::Open);
        Ok(())
    }

    /// Fetch the next scalar value. `RecordEof` marks exhaustion and is a
    /// control signal for the caller, never a user-visible error.
    pub fn fetch(&self) -> QueryResult<Value> {
        match self.state.get() {
            SubqueryState::Open => {}
            SubqueryState::Exhausted => return Err(QueryError::RecordEof),
            other => {
                return Err(QueryError::Internal(format!(
                    "sub-query fetch in state {:?}",
                    other
                )))
            }
        }
        let mut guard = self.physical.borrow_mut();
        let operator = guard
            .as_mut()
            .ok_or_else(|| QueryError::Internal("sub-query has no physical plan".to_string()))?;
        match operator.next() {
            Ok(()) => {}
            Err(QueryError::RecordEof) => {
                self.state.set(SubqueryState::Exhausted);
                return Err(QueryError::RecordEof);
            }
            Err(e) => return Err(e),
        }
        let tuple = operator
            .current_tuple()
            .ok_or_else(|| QueryError::Internal("operator produced no tuple".to_string()))?;
        if tuple.cell_count() != 1 {
            warn!("sub-query produced {} columns", tuple.cell_count());
            return Err(QueryError::ScalarSubquery(format!(
                "expected exactly one column, got {}",
                tuple.cell_count()
            )));
        }
        tuple.cell_at(0)
    }

    pub fn close(&self) -> QueryResult<()> {
        match self.state.get() {
            SubqueryState::Open | SubqueryState::Exhausted => {}
            other => {
                return Err(QueryError::Internal(format!(
                    "sub-query close in state {:?}",
                    other
                )))
            }
        }
        let mut guard = self.physical.borrow_mut();
        let operator = guard
            .as_mut()
            .ok_or_else(|| QueryError::Internal("sub-query has no physical plan".to_string()))?;
        operator.close()?;
        self.state.set(SubqueryState::Closed);
        Ok(())
    }

    /// Drain the sub-query into a vector: open, fetch until exhaustion,
    /// close. The close runs on the error path as well.
    pub fn get_value_list(&self) -> QueryResult<Vec<Value>> {
        self.open()?;
        let mut values = Vec::new();
        loop {
            match self.fetch() {
                Ok(v) => values.push(v),
                Err(QueryError::RecordEof) => break,
                Err(e) => {
                    let _ = self.close();
                    return Err(e);
                }
            }
        }
        self.close()?;
        Ok(values)
    }
}

impl fmt::Debug for SubqueryExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubqueryExpr")
            .field("state", &self.state.get())
            .field("output_type", &self.output_type)
            .finish_non_exhaustive()
    }
}
