// Expression Module
//
// The tuple protocol, the scalar expression tree and the sub-query driver.

pub mod expression;
pub mod subquery;
pub mod tuple;

pub use self::expression::{
    ArithmeticExpr, CastExpr, ComparisonExpr, ConjunctionExpr, ConjunctionKind, Expression,
    FieldExpr, ListExpr, ValueExpr,
};
pub use self::subquery::{SubqueryExpr, SubqueryState};
pub use self::tuple::{Tuple, TupleCellSpec, ValueListTuple};
