// Statement Resolution Module
//
// This module lowers parsed AST nodes into typed statements bound against
// the catalog. Resolution aborts at the first validation error.

pub mod calc;
pub mod delete;
pub mod explain;
pub mod field;
pub mod filter;
pub mod insert;
pub mod select;
pub mod update;

pub use self::calc::CalcStmt;
pub use self::delete::DeleteStmt;
pub use self::explain::ExplainStmt;
pub use self::field::Field;
pub use self::filter::{FilterOperand, FilterStmt, FilterUnit};
pub use self::insert::InsertStmt;
pub use self::select::SelectStmt;
pub use self::update::UpdateStmt;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::catalog::{Catalog, Table};
use crate::common::error::QueryResult;
use crate::query::ast::SqlNode;

/// Tables and aliases visible at a point during resolution.
///
/// Sub-selects extend the parent scope: local names are inserted as the
/// nested FROM list is collected, so inner references resolve local names
/// first and outer names as a fallback.
#[derive(Default)]
pub struct Scope {
    tables: HashMap<String, Arc<Table>>,
    select_aliases: HashSet<String>,
}

impl Scope {
    pub fn new() -> Self {
        Scope::default()
    }

    /// Make a table visible under the given name or alias
    pub fn add_table(&mut self, name: impl Into<String>, table: Arc<Table>) {
        self.tables.insert(name.into(), table);
    }

    /// Look up a table by name or alias
    pub fn table(&self, name: &str) -> Option<&Arc<Table>> {
        self.tables.get(name)
    }

    /// Record a projection alias defined by an enclosing select list
    pub fn add_select_alias(&mut self, alias: impl Into<String>) {
        self.select_aliases.insert(alias.into());
    }

    pub fn is_select_alias(&self, name: &str) -> bool {
        self.select_aliases.contains(name)
    }
}

/// A resolved statement of any kind
#[derive(Debug)]
pub enum Statement {
    Calc(CalcStmt),
    Select(Box<SelectStmt>),
    Insert(InsertStmt),
    Update(UpdateStmt),
    Delete(DeleteStmt),
    Explain(ExplainStmt),
}

impl Statement {
    /// Resolve a parsed statement against the catalog
    pub fn resolve(catalog: &Catalog, node: &SqlNode) -> QueryResult<Statement> {
        match node {
            SqlNode::Select(select) => Ok(Statement::Select(Box::new(SelectStmt::resolve(
                catalog, select,
            )?))),
            SqlNode::Insert(insert) => Ok(Statement::Insert(InsertStmt::resolve(catalog, insert)?)),
            SqlNode::Update(update) => Ok(Statement::Update(UpdateStmt::resolve(catalog, update)?)),
            SqlNode::Delete(delete) => Ok(Statement::Delete(DeleteStmt::resolve(catalog, delete)?)),
            SqlNode::Explain(child) => Ok(Statement::Explain(ExplainStmt::resolve(catalog, child)?)),
            SqlNode::Calc(calc) => Ok(Statement::Calc(CalcStmt::resolve(calc)?)),
        }
    }
}
