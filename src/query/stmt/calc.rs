// Calc Statement Implementation
//
// CALC evaluates constant expressions with no table source; the resolver
// only has to lower the parsed arithmetic into expression trees.

use crate::common::error::{QueryError, QueryResult};
use crate::query::ast::{CalcSqlNode, ExprSqlNode};
use crate::query::expr::expression::{ArithmeticExpr, Expression, ValueExpr};

/// A resolved CALC statement
#[derive(Debug)]
pub struct CalcStmt {
    expressions: Vec<Expression>,
}

impl CalcStmt {
    pub fn resolve(node: &CalcSqlNode) -> QueryResult<CalcStmt> {
        let expressions = node
            .expressions
            .iter()
            .map(Self::lower)
            .collect::<QueryResult<Vec<_>>>()?;
        Ok(CalcStmt { expressions })
    }

    fn lower(node: &ExprSqlNode) -> QueryResult<Expression> {
        match node {
            ExprSqlNode::Value(value) => Ok(Expression::Value(ValueExpr::new(value.clone()))),
            ExprSqlNode::Arith { op, left, right } => {
                let left = Self::lower(left)?;
                let right = right.as_deref().map(Self::lower).transpose()?;
                Ok(Expression::Arithmetic(ArithmeticExpr::new(*op, left, right)))
            }
            ExprSqlNode::Attr(attr) => match &attr.constant_value {
                Some(value) => Ok(Expression::Value(ValueExpr::new(value.clone()))),
                None => Err(QueryError::InvalidArgument(
                    "CALC cannot reference columns".to_string(),
                )),
            },
        }
    }

    pub fn expressions(&self) -> &[Expression] {
        &self.expressions
    }

    pub fn into_expressions(self) -> Vec<Expression> {
        self.expressions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::value::Value;
    use crate::query::ast::ArithOp;

    #[test]
    fn test_constant_arithmetic() {
        let node = CalcSqlNode {
            expressions: vec![ExprSqlNode::Arith {
                op: ArithOp::Add,
                left: Box::new(ExprSqlNode::Value(Value::Int(1))),
                right: Some(Box::new(ExprSqlNode::Value(Value::Int(2)))),
            }],
        };
        let stmt = CalcStmt::resolve(&node).unwrap();
        assert_eq!(stmt.expressions().len(), 1);
        assert_eq!(
            stmt.expressions()[0].try_get_value().unwrap(),
            Value::Int(3)
        );
    }

    #[test]
    fn test_column_reference_rejected() {
        use crate::query::ast::RelAttrSqlNode;
        let node = CalcSqlNode {
            expressions: vec![ExprSqlNode::Attr(RelAttrSqlNode::column("a"))],
        };
        assert!(matches!(
            CalcStmt::resolve(&node),
            Err(QueryError::InvalidArgument(_))
        ));
    }
}
