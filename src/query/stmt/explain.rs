// Explain Statement Implementation

use crate::catalog::Catalog;
use crate::common::error::QueryResult;
use crate::query::ast::SqlNode;

use super::Statement;

/// EXPLAIN wraps the resolved statement it describes
#[derive(Debug)]
pub struct ExplainStmt {
    child: Box<Statement>,
}

impl ExplainStmt {
    pub fn resolve(catalog: &Catalog, child: &SqlNode) -> QueryResult<ExplainStmt> {
        let child = Statement::resolve(catalog, child)?;
        Ok(ExplainStmt {
            child: Box::new(child),
        })
    }

    pub fn child(&self) -> &Statement {
        &self.child
    }

    pub fn into_child(self) -> Statement {
        *self.child
    }
}
