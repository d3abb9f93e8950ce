// SQL Abstract Syntax Tree (AST) Implementation
//
// This module defines the node shapes handed over by the external parser.
// The resolver consumes these and produces typed statements; nothing in
// here has been checked against the catalog yet.

use std::fmt;

use crate::common::value::Value;

/// Aggregate function tag on a column reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggrFunc {
    None,
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl fmt::Display for AggrFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggrFunc::None => "NONE",
            AggrFunc::Count => "COUNT",
            AggrFunc::Sum => "SUM",
            AggrFunc::Avg => "AVG",
            AggrFunc::Min => "MIN",
            AggrFunc::Max => "MAX",
        };
        write!(f, "{}", name)
    }
}

/// Scalar function tag; the function library itself is external, the tag
/// only drives canonical alias rewriting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarFunc {
    None,
    Length,
    Round,
    DateFormat,
}

impl fmt::Display for ScalarFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarFunc::None => "NONE",
            ScalarFunc::Length => "LENGTH",
            ScalarFunc::Round => "ROUND",
            ScalarFunc::DateFormat => "DATE_FORMAT",
        };
        write!(f, "{}", name)
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Is,
    IsNot,
    Like,
    NotLike,
    In,
    NotIn,
}

impl fmt::Display for CompOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompOp::Eq => "=",
            CompOp::Ne => "<>",
            CompOp::Lt => "<",
            CompOp::Le => "<=",
            CompOp::Gt => ">",
            CompOp::Ge => ">=",
            CompOp::Is => "IS",
            CompOp::IsNot => "IS NOT",
            CompOp::Like => "LIKE",
            CompOp::NotLike => "NOT LIKE",
            CompOp::In => "IN",
            CompOp::NotIn => "NOT IN",
        };
        write!(f, "{}", name)
    }
}

/// Arithmetic operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    /// Unary minus; only the left operand is present
    Negative,
}

impl fmt::Display for ArithOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Mod => "%",
            ArithOp::Negative => "-",
        };
        write!(f, "{}", name)
    }
}

/// Sort direction in ORDER BY
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

/// Column reference as parsed, possibly wrapped in an aggregate or scalar
/// function and possibly a constant stand-in.
#[derive(Debug, Clone, PartialEq)]
pub struct RelAttrSqlNode {
    /// Qualifying table name or alias; `None` for a bare column
    pub relation_name: Option<String>,
    /// Column name; `*` marks a wildcard
    pub attribute_name: String,
    pub aggr_func: AggrFunc,
    pub scalar_func: ScalarFunc,
    /// Set when the "column" is really a literal in the select list
    pub constant_value: Option<Value>,
    /// Explicit AS alias
    pub alias: Option<String>,
}

impl RelAttrSqlNode {
    /// A bare column reference without a table qualifier
    pub fn column(name: impl Into<String>) -> Self {
        RelAttrSqlNode {
            relation_name: None,
            attribute_name: name.into(),
            aggr_func: AggrFunc::None,
            scalar_func: ScalarFunc::None,
            constant_value: None,
            alias: None,
        }
    }

    /// A table-qualified column reference
    pub fn qualified(table: impl Into<String>, name: impl Into<String>) -> Self {
        RelAttrSqlNode {
            relation_name: Some(table.into()),
            ..RelAttrSqlNode::column(name)
        }
    }

    /// The `*` wildcard
    pub fn wildcard() -> Self {
        RelAttrSqlNode::column("*")
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

    pub fn is_wildcard(&self) -> bool {
        self.attribute_name == "*"
    }
}

/// Scalar expression node: select-list items, CALC expressions and IN-list
/// elements share this shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprSqlNode {
    Attr(RelAttrSqlNode),
    Value(Value),
    Arith {
        op: ArithOp,
        left: Box<ExprSqlNode>,
        /// Absent for unary minus
        right: Option<Box<ExprSqlNode>>,
    },
}

/// One operand of a parsed condition
#[derive(Debug, Clone, PartialEq)]
pub enum CondOperand {
    Attr(RelAttrSqlNode),
    Value(Value),
    SubSelect(Box<SelectSqlNode>),
    List(Vec<ExprSqlNode>),
}

/// One parsed condition: `left comp right`
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionSqlNode {
    pub left: CondOperand,
    pub comp: CompOp,
    pub right: CondOperand,
}

/// An INNER JOIN entry folded into the FROM list
#[derive(Debug, Clone, PartialEq)]
pub struct InnerJoinSqlNode {
    /// Joined tables in textual order
    pub relations: Vec<String>,
    /// ON predicates, merged into WHERE in textual order
    pub join_on_conditions: Vec<ConditionSqlNode>,
}

/// One FROM-clause entry: a base table or an INNER JOIN group
#[derive(Debug, Clone, PartialEq)]
pub struct RelationSqlNode {
    pub relation: String,
    pub alias: Option<String>,
    pub inner_join: Option<InnerJoinSqlNode>,
}

impl RelationSqlNode {
    pub fn table(name: impl Into<String>) -> Self {
        RelationSqlNode {
            relation: name.into(),
            alias: None,
            inner_join: None,
        }
    }

    pub fn aliased(name: impl Into<String>, alias: impl Into<String>) -> Self {
        RelationSqlNode {
            relation: name.into(),
            alias: Some(alias.into()),
            inner_join: None,
        }
    }
}

/// One ORDER BY entry
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBySqlNode {
    pub rel_attr: RelAttrSqlNode,
    pub direction: OrderDirection,
}

/// Parsed SELECT statement
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectSqlNode {
    pub relations: Vec<RelationSqlNode>,
    /// Select-list items in textual order
    pub attributes: Vec<ExprSqlNode>,
    /// WHERE predicates, implicitly AND-ed
    pub conditions: Vec<ConditionSqlNode>,
    pub group_by_attributes: Vec<RelAttrSqlNode>,
    pub having_conditions: Vec<ConditionSqlNode>,
    pub order_by: Vec<OrderBySqlNode>,
}

/// Parsed INSERT statement; multi-row form
#[derive(Debug, Clone, PartialEq)]
pub struct InsertSqlNode {
    pub relation_name: String,
    pub rows: Vec<Vec<Value>>,
}

/// Right-hand side of one SET clause
#[derive(Debug, Clone, PartialEq)]
pub enum SetValueSqlNode {
    Value(Value),
    SubSelect(Box<SelectSqlNode>),
}

/// One `SET column = ...` clause
#[derive(Debug, Clone, PartialEq)]
pub struct SetClauseSqlNode {
    pub attribute_name: String,
    pub value: SetValueSqlNode,
}

/// Parsed UPDATE statement
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateSqlNode {
    pub relation_name: String,
    pub sets: Vec<SetClauseSqlNode>,
    pub conditions: Vec<ConditionSqlNode>,
}

/// Parsed DELETE statement
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteSqlNode {
    pub relation_name: String,
    pub conditions: Vec<ConditionSqlNode>,
}

/// Parsed CALC statement: constant expressions with no table source
#[derive(Debug, Clone, PartialEq)]
pub struct CalcSqlNode {
    pub expressions: Vec<ExprSqlNode>,
}

/// A parsed statement of any kind
#[derive(Debug, Clone, PartialEq)]
pub enum SqlNode {
    Select(SelectSqlNode),
    Insert(InsertSqlNode),
    Update(UpdateSqlNode),
    Delete(DeleteSqlNode),
    Explain(Box<SqlNode>),
    Calc(CalcSqlNode),
}
