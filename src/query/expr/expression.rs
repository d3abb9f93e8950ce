// Expression Tree Implementation
//
// Scalar expressions evaluated per tuple during execution. The variant set
// is closed: a single evaluator dispatches over the enum instead of the
// virtual-call hierarchy a storage engine would grow over time.
//
// Comparison semantics collapse SQL's three-valued logic to two values:
// any NULL participant (and any incomparable pair) makes an ordinary
// comparison FALSE. Only IS / IS NOT can see NULL as equal to NULL.

use std::cmp::Ordering;
use std::fmt;

use log::warn;

use crate::common::error::{QueryError, QueryResult};
use crate::common::types::AttrType;
use crate::common::value::Value;
use crate::query::ast::{ArithOp, CompOp};
use crate::query::planner::physical::PhysicalPlanner;
use crate::query::stmt::field::Field;

use super::subquery::{SubqueryExpr, SubqueryState};
use super::tuple::Tuple;

/// AND/OR connective of a conjunction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConjunctionKind {
    And,
    Or,
}

/// A scalar expression over the current tuple
#[derive(Debug)]
pub enum Expression {
    Field(FieldExpr),
    Value(ValueExpr),
    Cast(CastExpr),
    Arithmetic(ArithmeticExpr),
    Comparison(ComparisonExpr),
    Conjunction(ConjunctionExpr),
    List(ListExpr),
    Subquery(SubqueryExpr),
}

impl Expression {
    /// Result type of this expression, computed without evaluation
    pub fn value_type(&self) -> AttrType {
        match self {
            Expression::Field(e) => e.field.value_type(),
            Expression::Value(e) => e.value.attr_type(),
            Expression::Cast(e) => e.target,
            Expression::Arithmetic(e) => e.value_type(),
            Expression::Comparison(_) | Expression::Conjunction(_) => AttrType::Booleans,
            Expression::List(e) => e.value_type(),
            Expression::Subquery(e) => e.value_type(),
        }
    }

    /// Evaluate against the current tuple
    pub fn get_value(&self, tuple: &dyn Tuple) -> QueryResult<Value> {
        match self {
            Expression::Field(e) => e.get_value(tuple),
            Expression::Value(e) => Ok(e.value.clone()),
            Expression::Cast(e) => e.get_value(tuple),
            Expression::Arithmetic(e) => e.get_value(tuple),
            Expression::Comparison(e) => e.get_value(tuple),
            Expression::Conjunction(e) => e.get_value(tuple),
            Expression::List(e) => e.get_value(tuple),
            Expression::Subquery(e) => e.fetch(),
        }
    }

    /// Evaluate without a tuple; succeeds only on a purely constant sub-tree
    pub fn try_get_value(&self) -> QueryResult<Value> {
        match self {
            Expression::Field(e) => e.try_get_value(),
            Expression::Value(e) => Ok(e.value.clone()),
            Expression::Cast(e) => e.try_get_value(),
            Expression::Arithmetic(e) => e.try_get_value(),
            Expression::Comparison(e) => e.try_get_value(),
            Expression::Conjunction(e) => e.try_get_value(),
            Expression::List(_) | Expression::Subquery(_) => Err(QueryError::InvalidArgument(
                "expression is not constant".to_string(),
            )),
        }
    }

    /// Materialize physical plans for every sub-query in this tree that
    /// has not been planned yet
    pub fn init_subqueries(&self, planner: &dyn PhysicalPlanner) -> QueryResult<()> {
        match self {
            Expression::Field(_) | Expression::Value(_) => Ok(()),
            Expression::Cast(e) => e.child.init_subqueries(planner),
            Expression::Arithmetic(e) => {
                e.left.init_subqueries(planner)?;
                if let Some(right) = &e.right {
                    right.init_subqueries(planner)?;
                }
                Ok(())
            }
            Expression::Comparison(e) => {
                e.left.init_subqueries(planner)?;
                e.right.init_subqueries(planner)
            }
            Expression::Conjunction(e) => {
                for child in &e.children {
                    child.init_subqueries(planner)?;
                }
                Ok(())
            }
            Expression::List(e) => {
                for element in &e.elements {
                    element.init_subqueries(planner)?;
                }
                Ok(())
            }
            Expression::Subquery(e) => {
                if e.state() == SubqueryState::Unplanned {
                    e.gen_physical(planner)?;
                }
                Ok(())
            }
        }
    }
}

/// Leaf: a resolved column reference, evaluated by tuple lookup
#[derive(Debug)]
pub struct FieldExpr {
    field: Field,
}

impl FieldExpr {
    pub fn new(field: Field) -> Self {
        FieldExpr { field }
    }

    pub fn field(&self) -> &Field {
        &self.field
    }

    fn get_value(&self, tuple: &dyn Tuple) -> QueryResult<Value> {
        if let Some(v) = self.field.constant_value() {
            return Ok(v.clone());
        }
        tuple.find_cell(&self.field.cell_spec())
    }

    fn try_get_value(&self) -> QueryResult<Value> {
        match self.field.constant_value() {
            Some(v) => Ok(v.clone()),
            None => Err(QueryError::InvalidArgument(
                "field is not constant".to_string(),
            )),
        }
    }
}

/// Leaf: a constant
#[derive(Debug)]
pub struct ValueExpr {
    value: Value,
}

impl ValueExpr {
    pub fn new(value: Value) -> Self {
        ValueExpr { value }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

/// Narrow/widen a child expression to a target type; only BOOLEAN today
#[derive(Debug)]
pub struct CastExpr {
    child: Box<Expression>,
    target: AttrType,
}

impl CastExpr {
    pub fn new(child: Expression, target: AttrType) -> Self {
        CastExpr {
            child: Box::new(child),
            target,
        }
    }

    fn cast(&self, value: Value) -> QueryResult<Value> {
        if value.attr_type() == self.target {
            return Ok(value);
        }
        match self.target {
            AttrType::Booleans => Ok(Value::Bool(value.get_boolean())),
            other => {
                warn!("unsupported cast from {} to {}", value.attr_type(), other);
                Err(QueryError::Internal(format!(
                    "unsupported cast to {}",
                    other
                )))
            }
        }
    }

    fn get_value(&self, tuple: &dyn Tuple) -> QueryResult<Value> {
        let value = self.child.get_value(tuple)?;
        self.cast(value)
    }

    fn try_get_value(&self) -> QueryResult<Value> {
        let value = self.child.try_get_value()?;
        self.cast(value)
    }
}

/// Binary arithmetic or unary negation
#[derive(Debug)]
pub struct ArithmeticExpr {
    op: ArithOp,
    left: Box<Expression>,
    /// Absent for unary negation
    right: Option<Box<Expression>>,
}

impl ArithmeticExpr {
    pub fn new(op: ArithOp, left: Expression, right: Option<Expression>) -> Self {
        ArithmeticExpr {
            op,
            left: Box::new(left),
            right: right.map(Box::new),
        }
    }

    pub fn negative(operand: Expression) -> Self {
        ArithmeticExpr::new(ArithOp::Negative, operand, None)
    }

    /// INT only when both operands are INT and the operation is not a
    /// division; NULL if either side is statically NULL.
    fn value_type(&self) -> AttrType {
        let left = self.left.value_type();
        let right = match &self.right {
            Some(r) => r.value_type(),
            None => return left,
        };
        if left == AttrType::Null || right == AttrType::Null {
            return AttrType::Null;
        }
        if left == AttrType::Ints && right == AttrType::Ints && self.op != ArithOp::Div {
            AttrType::Ints
        } else {
            AttrType::Floats
        }
    }

    fn calc_value(&self, left: &Value, right: Option<&Value>) -> QueryResult<Value> {
        if self.op == ArithOp::Negative {
            return Ok(match left {
                Value::Null => Value::Null,
                Value::Int(i) => Value::Int(-i),
                other => Value::Float(-other.get_float()),
            });
        }

        let right = right.ok_or_else(|| {
            QueryError::Internal("binary arithmetic without right operand".to_string())
        })?;
        if left.is_null() || right.is_null() {
            return Ok(Value::Null);
        }

        let int_result = left.attr_type() == AttrType::Ints
            && right.attr_type() == AttrType::Ints
            && self.op != ArithOp::Div;

        let value = match self.op {
            ArithOp::Add => {
                if int_result {
                    Value::Int(left.get_int() + right.get_int())
                } else {
                    Value::Float(left.get_float() + right.get_float())
                }
            }
            ArithOp::Sub => {
                if int_result {
                    Value::Int(left.get_int() - right.get_int())
                } else {
                    Value::Float(left.get_float() - right.get_float())
                }
            }
            ArithOp::Mul => {
                if int_result {
                    Value::Int(left.get_int() * right.get_int())
                } else {
                    Value::Float(left.get_float() * right.get_float())
                }
            }
            ArithOp::Div => {
                let divisor = right.get_float();
                if divisor.abs() < crate::common::value::EPSILON {
                    Value::Null
                } else {
                    Value::Float(left.get_float() / divisor)
                }
            }
            ArithOp::Mod => {
                if int_result {
                    if right.get_int() == 0 {
                        Value::Null
                    } else {
                        Value::Int(left.get_int() % right.get_int())
                    }
                } else {
                    let divisor = right.get_float();
                    if divisor.abs() < crate::common::value::EPSILON {
                        Value::Null
                    } else {
                        Value::Float(left.get_float() % divisor)
                    }
                }
            }
            ArithOp::Negative => unreachable!("handled above"),
        };
        Ok(value)
    }

    fn get_value(&self, tuple: &dyn Tuple) -> QueryResult<Value> {
        let left = self.left.get_value(tuple)?;
        let right = match &self.right {
            Some(r) => Some(r.get_value(tuple)?),
            None => None,
        };
        self.calc_value(&left, right.as_ref())
    }

    fn try_get_value(&self) -> QueryResult<Value> {
        let left = self.left.try_get_value()?;
        let right = match &self.right {
            Some(r) => Some(r.try_get_value()?),
            None => None,
        };
        self.calc_value(&left, right.as_ref())
    }
}

/// A comparison between two operands; either side may be a sub-query
#[derive(Debug)]
pub struct ComparisonExpr {
    comp: CompOp,
    left: Box<Expression>,
    right: Box<Expression>,
}

/// SQL `=` semantics between two values: NULLs and incomparable pairs
/// never match.
fn value_eq(left: &Value, right: &Value) -> bool {
    matches!(left.compare(right), Some(Ordering::Equal))
}

/// `%` matches zero or more characters, `_` exactly one; case-sensitive.
fn like_match(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();

    // (ti, pi) pairs with backtracking over the last %
    let (mut ti, mut pi) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;
    while ti < text.len() {
        if pi < pattern.len() && (pattern[pi] == '_' || pattern[pi] == text[ti]) {
            ti += 1;
            pi += 1;
        } else if pi < pattern.len() && pattern[pi] == '%' {
            star = Some((ti, pi));
            pi += 1;
        } else if let Some((star_ti, star_pi)) = star {
            ti = star_ti + 1;
            pi = star_pi + 1;
            star = Some((ti, star_pi));
        } else {
            return false;
        }
    }
    while pi < pattern.len() && pattern[pi] == '%' {
        pi += 1;
    }
    pi == pattern.len()
}

impl ComparisonExpr {
    pub fn new(comp: CompOp, left: Expression, right: Expression) -> Self {
        ComparisonExpr {
            comp,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn comp(&self) -> CompOp {
        self.comp
    }

    pub fn left(&self) -> &Expression {
        &self.left
    }

    pub fn right(&self) -> &Expression {
        &self.right
    }

    /// Decide the comparison for two concrete values
    fn compare_values(&self, left: &Value, right: &Value) -> bool {
        match self.comp {
            CompOp::Is => left.is_null() && right.is_null(),
            CompOp::IsNot => !(left.is_null() && right.is_null()),
            CompOp::Like | CompOp::NotLike => {
                let matched = match (left, right) {
                    (Value::Chars(text), Value::Chars(pattern)) => like_match(text, pattern),
                    _ => return false,
                };
                if self.comp == CompOp::Like {
                    matched
                } else {
                    !matched
                }
            }
            // membership probes compare element-wise through eval_membership
            CompOp::In | CompOp::NotIn => unreachable!("handled by eval_membership"),
            CompOp::Eq | CompOp::Ne | CompOp::Lt | CompOp::Le | CompOp::Gt | CompOp::Ge => {
                let Some(ordering) = left.compare(right) else {
                    // NULL participant or incomparable types
                    return false;
                };
                match self.comp {
                    CompOp::Eq => ordering == Ordering::Equal,
                    CompOp::Ne => ordering != Ordering::Equal,
                    CompOp::Lt => ordering == Ordering::Less,
                    CompOp::Le => ordering != Ordering::Greater,
                    CompOp::Gt => ordering == Ordering::Greater,
                    CompOp::Ge => ordering != Ordering::Less,
                    _ => unreachable!(),
                }
            }
        }
    }

    /// A scalar sub-query operand must produce exactly one row
    fn operand_value(expr: &Expression, tuple: &dyn Tuple) -> QueryResult<Value> {
        match expr {
            Expression::Subquery(sub) => {
                let mut values = sub.get_value_list()?;
                if values.len() != 1 {
                    warn!("scalar sub-query produced {} rows", values.len());
                    return Err(QueryError::ScalarSubquery(format!(
                        "expected exactly one row, got {}",
                        values.len()
                    )));
                }
                Ok(values.remove(0))
            }
            other => other.get_value(tuple),
        }
    }

    fn eval_membership(&self, tuple: &dyn Tuple, negated: bool) -> QueryResult<Value> {
        let probe = Self::operand_value(&self.left, tuple)?;
        match self.right.as_ref() {
            Expression::List(list) => {
                for element in list.elements() {
                    let candidate = element.get_value(tuple)?;
                    if value_eq(&probe, &candidate) {
                        return Ok(Value::Bool(!negated));
                    }
                }
                Ok(Value::Bool(negated))
            }
            Expression::Subquery(sub) => {
                sub.open()?;
                loop {
                    match sub.fetch() {
                        Ok(candidate) => {
                            if value_eq(&probe, &candidate) {
                                sub.close()?;
                                return Ok(Value::Bool(!negated));
                            }
                        }
                        Err(QueryError::RecordEof) => break,
                        Err(e) => {
                            let _ = sub.close();
                            return Err(e);
                        }
                    }
                }
                sub.close()?;
                Ok(Value::Bool(negated))
            }
            _ => Err(QueryError::InvalidArgument(
                "IN requires an expression list or sub-query on the right".to_string(),
            )),
        }
    }

    fn get_value(&self, tuple: &dyn Tuple) -> QueryResult<Value> {
        match self.comp {
            CompOp::In => self.eval_membership(tuple, false),
            CompOp::NotIn => self.eval_membership(tuple, true),
            _ => {
                let left = Self::operand_value(&self.left, tuple)?;
                let right = Self::operand_value(&self.right, tuple)?;
                Ok(Value::Bool(self.compare_values(&left, &right)))
            }
        }
    }

    fn try_get_value(&self) -> QueryResult<Value> {
        match self.comp {
            CompOp::In | CompOp::NotIn => {
                let Expression::List(list) = self.right.as_ref() else {
                    return Err(QueryError::InvalidArgument(
                        "expression is not constant".to_string(),
                    ));
                };
                let probe = self.left.try_get_value()?;
                let negated = self.comp == CompOp::NotIn;
                for element in list.elements() {
                    let candidate = element.try_get_value()?;
                    if value_eq(&probe, &candidate) {
                        return Ok(Value::Bool(!negated));
                    }
                }
                Ok(Value::Bool(negated))
            }
            _ => {
                let left = self.left.try_get_value()?;
                let right = self.right.try_get_value()?;
                Ok(Value::Bool(self.compare_values(&left, &right)))
            }
        }
    }
}

/// AND/OR over any number of children, evaluated left to right with
/// short-circuiting.
#[derive(Debug)]
pub struct ConjunctionExpr {
    kind: ConjunctionKind,
    children: Vec<Expression>,
}

impl ConjunctionExpr {
    pub fn new(kind: ConjunctionKind, children: Vec<Expression>) -> Self {
        ConjunctionExpr { kind, children }
    }

    pub fn kind(&self) -> ConjunctionKind {
        self.kind
    }

    pub fn children(&self) -> &[Expression] {
        &self.children
    }

    fn evaluate<F>(&self, mut child_value: F) -> QueryResult<Value>
    where
        F: FnMut(&Expression) -> QueryResult<Value>,
    {
        if self.children.is_empty() {
            return Ok(Value::Bool(self.kind == ConjunctionKind::And));
        }
        for child in &self.children {
            let truth = child_value(child)?.get_boolean();
            match self.kind {
                ConjunctionKind::And if !truth => return Ok(Value::Bool(false)),
                ConjunctionKind::Or if truth => return Ok(Value::Bool(true)),
                _ => {}
            }
        }
        Ok(Value::Bool(self.kind == ConjunctionKind::And))
    }

    fn get_value(&self, tuple: &dyn Tuple) -> QueryResult<Value> {
        self.evaluate(|child| child.get_value(tuple))
    }

    fn try_get_value(&self) -> QueryResult<Value> {
        self.evaluate(|child| child.try_get_value())
    }
}

/// An ordered list of scalar expressions, the right-hand side of IN
#[derive(Debug)]
pub struct ListExpr {
    elements: Vec<Expression>,
}

impl ListExpr {
    pub fn new(elements: Vec<Expression>) -> Self {
        ListExpr { elements }
    }

    pub fn elements(&self) -> &[Expression] {
        &self.elements
    }

    fn value_type(&self) -> AttrType {
        self.elements
            .first()
            .map(|e| e.value_type())
            .unwrap_or(AttrType::Null)
    }

    /// A list used as a scalar stands for its first element
    fn get_value(&self, tuple: &dyn Tuple) -> QueryResult<Value> {
        match self.elements.first() {
            Some(first) => first.get_value(tuple),
            None => Err(QueryError::EmptyExpressionList),
        }
    }

    /// All element values, in list order
    pub fn get_value_list(&self, tuple: &dyn Tuple) -> QueryResult<Vec<Value>> {
        if self.elements.is_empty() {
            return Err(QueryError::EmptyExpressionList);
        }
        self.elements.iter().map(|e| e.get_value(tuple)).collect()
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Field(e) => {
                if let Some(alias) = e.field.alias() {
                    return write!(f, "{}", alias);
                }
                match (e.field.table_name(), e.field.column_name()) {
                    (Some(table), Some(col)) => write!(f, "{}.{}", table, col),
                    (None, Some(col)) => write!(f, "{}", col),
                    _ => write!(f, "<field>"),
                }
            }
            Expression::Value(e) => write!(f, "{}", e.value),
            Expression::Cast(e) => write!(f, "CAST({} AS {})", e.child, e.target),
            Expression::Arithmetic(e) => match &e.right {
                Some(right) => write!(f, "({} {} {})", e.left, e.op, right),
                None => write!(f, "(-{})", e.left),
            },
            Expression::Comparison(e) => write!(f, "({} {} {})", e.left, e.comp, e.right),
            Expression::Conjunction(e) => {
                let sep = match e.kind {
                    ConjunctionKind::And => " AND ",
                    ConjunctionKind::Or => " OR ",
                };
                let parts: Vec<String> = e.children.iter().map(|c| c.to_string()).collect();
                write!(f, "({})", parts.join(sep))
            }
            Expression::List(e) => {
                let parts: Vec<String> = e.elements.iter().map(|c| c.to_string()).collect();
                write!(f, "({})", parts.join(", "))
            }
            Expression::Subquery(_) => write!(f, "(subquery)"),
        }
    }
}
