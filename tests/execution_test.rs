// End-to-end execution tests: resolved statements planned and pumped
// through the in-memory physical boundary.

mod common;

use anyhow::Result;

use common::{chars, fixture_catalog, MemoryDb};
use rowandb::query::ast::{
    AggrFunc, CompOp, CondOperand, ConditionSqlNode, ExprSqlNode, OrderBySqlNode, OrderDirection,
    RelAttrSqlNode, RelationSqlNode, SelectSqlNode, SqlNode,
};
use rowandb::Value;

fn db() -> MemoryDb {
    MemoryDb::new(
        fixture_catalog(),
        vec![
            (
                "t",
                vec![
                    vec![Value::Int(1), chars("x")],
                    vec![Value::Int(2), chars("y")],
                ],
            ),
            ("u", vec![vec![chars("x"), Value::Int(10)]]),
        ],
    )
}

#[test]
fn test_scan_yields_rows_in_order() -> Result<()> {
    // S1: SELECT * FROM t over {(1,"x"), (2,"y")}
    let rows = db().run(SqlNode::Select(SelectSqlNode {
        relations: vec![RelationSqlNode::table("t")],
        attributes: vec![ExprSqlNode::Attr(RelAttrSqlNode::wildcard())],
        ..SelectSqlNode::default()
    }))?;
    assert_eq!(
        rows,
        vec![
            vec![Value::Int(1), chars("x")],
            vec![Value::Int(2), chars("y")],
        ]
    );
    Ok(())
}

#[test]
fn test_filtered_scan() -> Result<()> {
    let rows = db().run(SqlNode::Select(SelectSqlNode {
        relations: vec![RelationSqlNode::table("t")],
        attributes: vec![ExprSqlNode::Attr(RelAttrSqlNode::column("a"))],
        conditions: vec![ConditionSqlNode {
            left: CondOperand::Attr(RelAttrSqlNode::column("a")),
            comp: CompOp::Gt,
            right: CondOperand::Value(Value::Int(1)),
        }],
        ..SelectSqlNode::default()
    }))?;
    assert_eq!(rows, vec![vec![Value::Int(2)]]);
    Ok(())
}

#[test]
fn test_count_group_by() -> Result<()> {
    // S2: SELECT COUNT(*), a FROM t GROUP BY a over a = {1, 1, 2}
    let db = MemoryDb::new(
        fixture_catalog(),
        vec![(
            "t",
            vec![
                vec![Value::Int(1), chars("p")],
                vec![Value::Int(1), chars("q")],
                vec![Value::Int(2), chars("r")],
            ],
        )],
    );
    let rows = db.run(SqlNode::Select(SelectSqlNode {
        relations: vec![RelationSqlNode::table("t")],
        attributes: vec![
            ExprSqlNode::Attr(RelAttrSqlNode::wildcard().with_aggr(AggrFunc::Count)),
            ExprSqlNode::Attr(RelAttrSqlNode::column("a")),
        ],
        group_by_attributes: vec![RelAttrSqlNode::column("a")],
        ..SelectSqlNode::default()
    }))?;
    assert_eq!(
        rows,
        vec![
            vec![Value::Int(2), Value::Int(1)],
            vec![Value::Int(1), Value::Int(2)],
        ]
    );
    Ok(())
}

#[test]
fn test_aggregates_skip_nulls() -> Result<()> {
    let db = MemoryDb::new(
        fixture_catalog(),
        vec![(
            "t",
            vec![
                vec![Value::Int(4), chars("p")],
                vec![Value::Null, chars("q")],
                vec![Value::Int(6), chars("r")],
            ],
        )],
    );
    let rows = db.run(SqlNode::Select(SelectSqlNode {
        relations: vec![RelationSqlNode::table("t")],
        attributes: vec![
            ExprSqlNode::Attr(RelAttrSqlNode::column("a").with_aggr(AggrFunc::Count)),
            ExprSqlNode::Attr(RelAttrSqlNode::column("a").with_aggr(AggrFunc::Sum)),
            ExprSqlNode::Attr(RelAttrSqlNode::column("a").with_aggr(AggrFunc::Avg)),
            ExprSqlNode::Attr(RelAttrSqlNode::column("a").with_aggr(AggrFunc::Min)),
            ExprSqlNode::Attr(RelAttrSqlNode::column("a").with_aggr(AggrFunc::Max)),
        ],
        ..SelectSqlNode::default()
    }))?;
    assert_eq!(
        rows,
        vec![vec![
            Value::Int(2),
            Value::Int(10),
            Value::Float(5.0),
            Value::Int(4),
            Value::Int(6),
        ]]
    );
    Ok(())
}

#[test]
fn test_having_filters_groups() -> Result<()> {
    let db = MemoryDb::new(
        fixture_catalog(),
        vec![(
            "t",
            vec![
                vec![Value::Int(1), chars("p")],
                vec![Value::Int(1), chars("q")],
                vec![Value::Int(2), chars("r")],
            ],
        )],
    );
    let rows = db.run(SqlNode::Select(SelectSqlNode {
        relations: vec![RelationSqlNode::table("t")],
        attributes: vec![
            ExprSqlNode::Attr(RelAttrSqlNode::wildcard().with_aggr(AggrFunc::Count)),
            ExprSqlNode::Attr(RelAttrSqlNode::column("a")),
        ],
        group_by_attributes: vec![RelAttrSqlNode::column("a")],
        having_conditions: vec![ConditionSqlNode {
            left: CondOperand::Attr(RelAttrSqlNode::wildcard().with_aggr(AggrFunc::Count)),
            comp: CompOp::Gt,
            right: CondOperand::Value(Value::Int(1)),
        }],
        ..SelectSqlNode::default()
    }))?;
    assert_eq!(rows, vec![vec![Value::Int(2), Value::Int(1)]]);
    Ok(())
}

#[test]
fn test_order_by_desc() -> Result<()> {
    let rows = db().run(SqlNode::Select(SelectSqlNode {
        relations: vec![RelationSqlNode::table("t")],
        attributes: vec![ExprSqlNode::Attr(RelAttrSqlNode::column("a"))],
        order_by: vec![OrderBySqlNode {
            rel_attr: RelAttrSqlNode::column("a"),
            direction: OrderDirection::Desc,
        }],
        ..SelectSqlNode::default()
    }))?;
    assert_eq!(rows, vec![vec![Value::Int(2)], vec![Value::Int(1)]]);
    Ok(())
}

#[test]
fn test_null_conjunction_short_circuit() -> Result<()> {
    // S6: SELECT a FROM t WHERE a IS NULL AND a = NULL matches nothing:
    // for a NULL row the second term is FALSE, for a non-NULL row the
    // first term is FALSE and the second is never evaluated
    let db = MemoryDb::new(
        fixture_catalog(),
        vec![(
            "t",
            vec![
                vec![Value::Null, chars("p")],
                vec![Value::Int(1), chars("q")],
            ],
        )],
    );
    let rows = db.run(SqlNode::Select(SelectSqlNode {
        relations: vec![RelationSqlNode::table("t")],
        attributes: vec![ExprSqlNode::Attr(RelAttrSqlNode::column("a"))],
        conditions: vec![
            ConditionSqlNode {
                left: CondOperand::Attr(RelAttrSqlNode::column("a")),
                comp: CompOp::Is,
                right: CondOperand::Value(Value::Null),
            },
            ConditionSqlNode {
                left: CondOperand::Attr(RelAttrSqlNode::column("a")),
                comp: CompOp::Eq,
                right: CondOperand::Value(Value::Null),
            },
        ],
        ..SelectSqlNode::default()
    }))?;
    assert!(rows.is_empty());
    Ok(())
}

#[test]
fn test_is_null_alone_matches_null_rows() -> Result<()> {
    let db = MemoryDb::new(
        fixture_catalog(),
        vec![(
            "t",
            vec![
                vec![Value::Null, chars("p")],
                vec![Value::Int(1), chars("q")],
            ],
        )],
    );
    let rows = db.run(SqlNode::Select(SelectSqlNode {
        relations: vec![RelationSqlNode::table("t")],
        attributes: vec![ExprSqlNode::Attr(RelAttrSqlNode::column("b"))],
        conditions: vec![ConditionSqlNode {
            left: CondOperand::Attr(RelAttrSqlNode::column("a")),
            comp: CompOp::Is,
            right: CondOperand::Value(Value::Null),
        }],
        ..SelectSqlNode::default()
    }))?;
    assert_eq!(rows, vec![vec![chars("p")]]);
    Ok(())
}

#[test]
fn test_like_filter() -> Result<()> {
    let rows = db().run(SqlNode::Select(SelectSqlNode {
        relations: vec![RelationSqlNode::table("t")],
        attributes: vec![ExprSqlNode::Attr(RelAttrSqlNode::column("a"))],
        conditions: vec![ConditionSqlNode {
            left: CondOperand::Attr(RelAttrSqlNode::column("b")),
            comp: CompOp::Like,
            right: CondOperand::Value(chars("x%")),
        }],
        ..SelectSqlNode::default()
    }))?;
    assert_eq!(rows, vec![vec![Value::Int(1)]]);
    Ok(())
}

#[test]
fn test_in_literal_list() -> Result<()> {
    let rows = db().run(SqlNode::Select(SelectSqlNode {
        relations: vec![RelationSqlNode::table("t")],
        attributes: vec![ExprSqlNode::Attr(RelAttrSqlNode::column("b"))],
        conditions: vec![ConditionSqlNode {
            left: CondOperand::Attr(RelAttrSqlNode::column("a")),
            comp: CompOp::In,
            right: CondOperand::List(vec![
                ExprSqlNode::Value(Value::Int(2)),
                ExprSqlNode::Value(Value::Int(5)),
            ]),
        }],
        ..SelectSqlNode::default()
    }))?;
    assert_eq!(rows, vec![vec![chars("y")]]);
    Ok(())
}

#[test]
fn test_cross_join_execution() -> Result<()> {
    let rows = db().run(SqlNode::Select(SelectSqlNode {
        relations: vec![RelationSqlNode::table("t"), RelationSqlNode::table("u")],
        attributes: vec![
            ExprSqlNode::Attr(RelAttrSqlNode::qualified("t", "a")),
            ExprSqlNode::Attr(RelAttrSqlNode::qualified("u", "c")),
        ],
        conditions: vec![ConditionSqlNode {
            left: CondOperand::Attr(RelAttrSqlNode::qualified("t", "b")),
            comp: CompOp::Eq,
            right: CondOperand::Attr(RelAttrSqlNode::qualified("u", "b")),
        }],
        ..SelectSqlNode::default()
    }))?;
    assert_eq!(rows, vec![vec![Value::Int(1), Value::Int(10)]]);
    Ok(())
}

#[test]
fn test_explain_renders_child_plan() -> Result<()> {
    let rows = db().run(SqlNode::Explain(Box::new(SqlNode::Select(SelectSqlNode {
        relations: vec![RelationSqlNode::table("t")],
        attributes: vec![ExprSqlNode::Attr(RelAttrSqlNode::wildcard())],
        ..SelectSqlNode::default()
    }))))?;
    assert_eq!(rows.len(), 1);
    let Value::Chars(text) = &rows[0][0] else {
        panic!("expected a rendered plan");
    };
    assert!(text.contains("Project"));
    assert!(text.contains("TableGet: t"));
    Ok(())
}

#[test]
fn test_calc_execution() -> Result<()> {
    use rowandb::query::ast::{ArithOp, CalcSqlNode};
    // S5's division semantics surface here as well: 1/0 is NULL
    let rows = db().run(SqlNode::Calc(CalcSqlNode {
        expressions: vec![
            ExprSqlNode::Arith {
                op: ArithOp::Div,
                left: Box::new(ExprSqlNode::Value(Value::Int(1))),
                right: Some(Box::new(ExprSqlNode::Value(Value::Int(0)))),
            },
            ExprSqlNode::Arith {
                op: ArithOp::Add,
                left: Box::new(ExprSqlNode::Value(Value::Int(1))),
                right: Some(Box::new(ExprSqlNode::Value(Value::Int(2)))),
            },
        ],
    }))?;
    assert_eq!(rows, vec![vec![Value::Null, Value::Int(3)]]);
    Ok(())
}
