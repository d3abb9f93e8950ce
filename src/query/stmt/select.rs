// Select Statement Implementation
//
// Resolves a parsed SELECT against the catalog: collects FROM tables,
// flattens INNER JOINs into the WHERE list, expands wildcards, validates
// aggregate usage, assigns canonical aliases and binds WHERE / GROUP BY /
// ORDER BY / HAVING references.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use log::warn;

use crate::catalog::{Catalog, Table};
use crate::common::error::{QueryError, QueryResult};
use crate::query::ast::{
    AggrFunc, CondOperand, ConditionSqlNode, ExprSqlNode, OrderDirection, RelAttrSqlNode,
    ScalarFunc, SelectSqlNode,
};

use super::field::{aggr_alias, func_alias, Field};
use super::filter::FilterStmt;
use super::Scope;

/// A resolved SELECT statement
#[derive(Debug)]
pub struct SelectStmt {
    /// Local FROM tables, followed by outer tables a correlated sub-select
    /// pulls in
    tables: Vec<Arc<Table>>,
    /// Projection fields in select-list order, wildcards expanded
    query_fields: Vec<Field>,
    /// Aggregate-wrapped projections only
    aggr_fields: Vec<Field>,
    /// Aggregate index to projection index
    aggr_to_query: BTreeMap<usize, usize>,
    group_by_fields: Vec<Field>,
    order_by_fields: Vec<Field>,
    order_by_directions: Vec<OrderDirection>,
    filter: FilterStmt,
    having_filter: FilterStmt,
    is_sub_select: bool,
}

/// A projection before the naming pass: the bare field plus everything the
/// pass needs to compute its canonical alias.
struct RawProjection {
    field: Field,
    explicit_alias: Option<String>,
    /// Label used to qualify canonical names: the user-written relation
    /// name, or the table's query alias
    qualifier: Option<String>,
    /// The source table carries a query alias
    table_aliased: bool,
}

impl SelectStmt {
    /// Resolve a top-level SELECT
    pub fn resolve(catalog: &Catalog, node: &SelectSqlNode) -> QueryResult<SelectStmt> {
        let mut scope = Scope::new();
        Self::resolve_in_scope(catalog, node, false, &mut scope)
    }

    /// Resolve a SELECT inside an existing scope. With `is_sub_select`
    /// set, WHERE references to tables absent from the local FROM list
    /// resolve against the outer scope and append the outer table handle,
    /// so the plan generator can inject a correlated join.
    pub fn resolve_in_scope(
        catalog: &Catalog,
        node: &SelectSqlNode,
        is_sub_select: bool,
        scope: &mut Scope,
    ) -> QueryResult<SelectStmt> {
        // collect tables in the `from` statement; INNER JOIN entries merge
        // their tables and ON predicates in textual order
        let mut tables: Vec<Arc<Table>> = Vec::new();
        let mut local_tables: HashMap<String, Arc<Table>> = HashMap::new();
        let mut table_aliases: HashMap<String, String> = HashMap::new();
        let mut conditions = node.conditions.clone();

        for relation in &node.relations {
            match &relation.inner_join {
                None => {
                    Self::collect_table(
                        catalog,
                        &relation.relation,
                        relation.alias.as_deref(),
                        &mut tables,
                        &mut local_tables,
                        &mut table_aliases,
                        scope,
                    )?;
                }
                Some(join) => {
                    for name in &join.relations {
                        Self::collect_table(
                            catalog,
                            name,
                            None,
                            &mut tables,
                            &mut local_tables,
                            &mut table_aliases,
                            scope,
                        )?;
                    }
                    conditions.extend(join.join_on_conditions.iter().cloned());
                }
            }
        }

        // group by comes before projections: the aggregate mixing rule
        // needs the group column count
        let mut group_by_fields = Vec::new();
        for attr in &node.group_by_attributes {
            group_by_fields.push(Self::resolve_plain_attr(scope, &tables, attr, "GROUP BY")?);
        }

        let (query_fields, aggr_fields, aggr_to_query) = Self::resolve_projections(
            node,
            &tables,
            &table_aliases,
            &group_by_fields,
            scope,
        )?;

        let default_table = if tables.len() == 1 {
            Some(tables[0].clone())
        } else {
            None
        };

        // a sub-select may reference tables bound in the enclosing query;
        // pull their handles into this statement so the plan generator can
        // attach the correlated join
        if is_sub_select {
            Self::absorb_outer_tables(&conditions, &local_tables, scope, &mut tables)?;
        }

        let filter = FilterStmt::resolve(catalog, default_table.as_ref(), scope, &conditions)?;

        let mut order_by_fields = Vec::new();
        let mut order_by_directions = Vec::new();
        for entry in &node.order_by {
            order_by_fields.push(Self::resolve_plain_attr(
                scope,
                &tables,
                &entry.rel_attr,
                "ORDER BY",
            )?);
            order_by_directions.push(entry.direction);
        }

        let having_filter =
            FilterStmt::resolve(catalog, default_table.as_ref(), scope, &node.having_conditions)?;

        Ok(SelectStmt {
            tables,
            query_fields,
            aggr_fields,
            aggr_to_query,
            group_by_fields,
            order_by_fields,
            order_by_directions,
            filter,
            having_filter,
            is_sub_select,
        })
    }

    fn collect_table(
        catalog: &Catalog,
        name: &str,
        alias: Option<&str>,
        tables: &mut Vec<Arc<Table>>,
        local_tables: &mut HashMap<String, Arc<Table>>,
        table_aliases: &mut HashMap<String, String>,
        scope: &mut Scope,
    ) -> QueryResult<()> {
        let table = catalog.table(name).ok_or_else(|| {
            warn!("no such table: {}", name);
            QueryError::TableNotFound(name.to_string())
        })?;

        if let Some(alias) = alias {
            if local_tables.contains_key(alias) {
                warn!("two relations share the alias {}", alias);
                return Err(QueryError::SqlSyntax(format!(
                    "duplicate table alias {}",
                    alias
                )));
            }
            local_tables.insert(alias.to_string(), table.clone());
            scope.add_table(alias, table.clone());
            table_aliases.insert(name.to_string(), alias.to_string());
        }

        tables.push(table.clone());
        local_tables.insert(name.to_string(), table.clone());
        scope.add_table(name, table);
        Ok(())
    }

    /// Resolve the select list. Returns the projection fields, the
    /// aggregate fields and the aggregate-to-projection index map.
    fn resolve_projections(
        node: &SelectSqlNode,
        tables: &[Arc<Table>],
        table_aliases: &HashMap<String, String>,
        group_by_fields: &[Field],
        scope: &mut Scope,
    ) -> QueryResult<(Vec<Field>, Vec<Field>, BTreeMap<usize, usize>)> {
        // aggregate/plain mixing rule: with any aggregate present, every
        // plain projection must be a group column
        let aggr_count = node
            .attributes
            .iter()
            .filter(|item| {
                matches!(item, ExprSqlNode::Attr(attr) if attr.aggr_func != AggrFunc::None)
            })
            .count();
        if aggr_count != 0 && aggr_count + group_by_fields.len() != node.attributes.len() {
            warn!(
                "{} aggregates and {} group columns cannot cover {} projections",
                aggr_count,
                group_by_fields.len(),
                node.attributes.len()
            );
            return Err(QueryError::InvalidAggregate(
                "aggregated and plain columns must be covered by GROUP BY".to_string(),
            ));
        }

        let mut raw = Vec::new();
        for item in &node.attributes {
            match item {
                ExprSqlNode::Attr(attr) => {
                    Self::resolve_projection_attr(attr, tables, table_aliases, scope, &mut raw)?
                }
                ExprSqlNode::Value(value) => raw.push(RawProjection {
                    field: Field::constant(value.clone()),
                    explicit_alias: None,
                    qualifier: None,
                    table_aliased: false,
                }),
                ExprSqlNode::Arith { .. } => {
                    return Err(QueryError::Unimplemented(
                        "expressions in the select list".to_string(),
                    ))
                }
            }
        }

        let query_fields = Self::name_projections(raw, scope)?;

        let mut aggr_fields = Vec::new();
        let mut aggr_to_query = BTreeMap::new();
        for (query_idx, field) in query_fields.iter().enumerate() {
            if field.is_aggregated() {
                aggr_to_query.insert(aggr_fields.len(), query_idx);
                aggr_fields.push(field.clone());
            }
        }

        Ok((query_fields, aggr_fields, aggr_to_query))
    }

    fn resolve_projection_attr(
        attr: &RelAttrSqlNode,
        tables: &[Arc<Table>],
        table_aliases: &HashMap<String, String>,
        scope: &Scope,
        raw: &mut Vec<RawProjection>,
    ) -> QueryResult<()> {
        let explicit = attr.alias.clone();

        match (&attr.relation_name, attr.is_wildcard()) {
            // bare `*`
            (None, true) => {
                if attr.aggr_func == AggrFunc::Count {
                    raw.push(RawProjection {
                        field: Field::count_star(),
                        explicit_alias: explicit,
                        qualifier: None,
                        table_aliased: false,
                    });
                    return Ok(());
                }
                if attr.aggr_func != AggrFunc::None {
                    warn!("{} does not accept *", attr.aggr_func);
                    return Err(QueryError::InvalidAggregate(format!(
                        "{} does not accept *",
                        attr.aggr_func
                    )));
                }
                for table in tables {
                    Self::expand_wildcard(table, table_aliases, raw);
                }
                Ok(())
            }
            // `tbl.*` or `*.*`
            (Some(rel), true) | (Some(rel), false) if rel == "*" => {
                if attr.attribute_name != "*" {
                    warn!("invalid field {} under table *", attr.attribute_name);
                    return Err(QueryError::ColumnNotFound(format!(
                        "*.{}",
                        attr.attribute_name
                    )));
                }
                if attr.aggr_func != AggrFunc::None {
                    return Err(QueryError::InvalidAggregate(
                        "aggregate over *.* is not valid".to_string(),
                    ));
                }
                for table in tables {
                    Self::expand_wildcard(table, table_aliases, raw);
                }
                Ok(())
            }
            (Some(rel), true) => {
                let table = scope.table(rel).cloned().ok_or_else(|| {
                    warn!("no such table in from list: {}", rel);
                    QueryError::ColumnNotFound(format!("{}.*", rel))
                })?;
                if attr.aggr_func != AggrFunc::None {
                    warn!("aggregate over {}.* is not valid", rel);
                    return Err(QueryError::InvalidAggregate(format!(
                        "aggregate over {}.* is not valid",
                        rel
                    )));
                }
                Self::expand_wildcard(&table, table_aliases, raw);
                Ok(())
            }
            // `tbl.col`
            (Some(rel), false) => {
                let table = scope.table(rel).cloned().ok_or_else(|| {
                    warn!("no such table in from list: {}", rel);
                    QueryError::ColumnNotFound(format!("{}.{}", rel, attr.attribute_name))
                })?;
                let column = table.column(&attr.attribute_name).cloned().ok_or_else(|| {
                    warn!("no such field: {}.{}", table.name(), attr.attribute_name);
                    QueryError::ColumnNotFound(format!(
                        "{}.{}",
                        table.name(),
                        attr.attribute_name
                    ))
                })?;
                let table_aliased = table_aliases.contains_key(table.name());
                raw.push(RawProjection {
                    field: Field::new(table, column)
                        .with_aggr(attr.aggr_func)
                        .with_func(attr.scalar_func),
                    explicit_alias: explicit,
                    qualifier: Some(rel.clone()),
                    table_aliased,
                });
                Ok(())
            }
            // bare `col`
            (None, false) => {
                if let Some(value) = &attr.constant_value {
                    raw.push(RawProjection {
                        field: Field::constant(value.clone())
                            .with_aggr(attr.aggr_func)
                            .with_func(attr.scalar_func),
                        explicit_alias: explicit,
                        qualifier: None,
                        table_aliased: false,
                    });
                    return Ok(());
                }
                if tables.len() != 1 {
                    warn!("cannot bind unqualified column: {}", attr.attribute_name);
                    return Err(QueryError::ColumnNotFound(attr.attribute_name.clone()));
                }
                let table = tables[0].clone();
                let column = table.column(&attr.attribute_name).cloned().ok_or_else(|| {
                    warn!("no such field: {}.{}", table.name(), attr.attribute_name);
                    QueryError::ColumnNotFound(format!(
                        "{}.{}",
                        table.name(),
                        attr.attribute_name
                    ))
                })?;
                let qualifier = table_aliases.get(table.name()).cloned();
                let table_aliased = qualifier.is_some();
                raw.push(RawProjection {
                    field: Field::new(table, column)
                        .with_aggr(attr.aggr_func)
                        .with_func(attr.scalar_func),
                    explicit_alias: explicit,
                    qualifier,
                    table_aliased,
                });
                Ok(())
            }
        }
    }

    fn expand_wildcard(
        table: &Arc<Table>,
        table_aliases: &HashMap<String, String>,
        raw: &mut Vec<RawProjection>,
    ) {
        let qualifier = table_aliases.get(table.name()).cloned();
        for column in table.user_columns() {
            raw.push(RawProjection {
                field: Field::new(table.clone(), column.clone()),
                explicit_alias: None,
                qualifier: qualifier.clone(),
                table_aliased: qualifier.is_some(),
            });
        }
    }

    /// The naming pass: compute each projection's canonical alias.
    /// Explicit AS wins; a function wrapper yields `FUNC(qualifier.col)`;
    /// a table alias yields `alias.col`; plain columns keep no alias.
    fn name_projections(raw: Vec<RawProjection>, scope: &mut Scope) -> QueryResult<Vec<Field>> {
        let mut taken: HashSet<String> = HashSet::new();
        let mut fields = Vec::with_capacity(raw.len());
        for projection in raw {
            let RawProjection {
                field,
                explicit_alias,
                qualifier,
                table_aliased,
            } = projection;

            let alias = if let Some(explicit) = explicit_alias {
                if !taken.insert(explicit.clone()) {
                    warn!("two projections share the alias {}", explicit);
                    return Err(QueryError::SqlSyntax(format!(
                        "duplicate projection alias {}",
                        explicit
                    )));
                }
                scope.add_select_alias(explicit.clone());
                Some(explicit)
            } else if field.is_aggregated() {
                Some(aggr_alias(
                    field.aggr_func(),
                    qualifier.as_deref(),
                    field.column_name(),
                ))
            } else if field.scalar_func() != ScalarFunc::None {
                field
                    .column_name()
                    .map(|col| func_alias(field.scalar_func(), qualifier.as_deref(), col))
            } else if table_aliased {
                match (qualifier.as_deref(), field.column_name()) {
                    (Some(q), Some(col)) => Some(format!("{}.{}", q, col)),
                    _ => None,
                }
            } else {
                None
            };

            fields.push(match alias {
                Some(alias) => field.with_alias(alias),
                None => field,
            });
        }
        Ok(fields)
    }

    /// GROUP BY / ORDER BY column resolution: `*` is illegal, everything
    /// else binds like a plain column reference.
    fn resolve_plain_attr(
        scope: &Scope,
        tables: &[Arc<Table>],
        attr: &RelAttrSqlNode,
        clause: &str,
    ) -> QueryResult<Field> {
        if attr.is_wildcard() || attr.relation_name.as_deref() == Some("*") {
            warn!("{} cannot process * columns", clause);
            return Err(QueryError::InvalidArgument(format!(
                "{} cannot process * columns",
                clause
            )));
        }

        let table = match &attr.relation_name {
            Some(rel) => scope.table(rel).cloned().ok_or_else(|| {
                warn!("no such table in from list: {}", rel);
                QueryError::ColumnNotFound(format!("{}.{}", rel, attr.attribute_name))
            })?,
            None => {
                if tables.len() != 1 {
                    warn!("cannot bind unqualified column: {}", attr.attribute_name);
                    return Err(QueryError::ColumnNotFound(attr.attribute_name.clone()));
                }
                tables[0].clone()
            }
        };

        let column = table.column(&attr.attribute_name).cloned().ok_or_else(|| {
            warn!("no such field: {}.{}", table.name(), attr.attribute_name);
            QueryError::ColumnNotFound(format!("{}.{}", table.name(), attr.attribute_name))
        })?;
        Ok(Field::new(table, column))
    }

    /// Pull outer tables referenced by a sub-select's conditions into this
    /// statement's table list. Outer projection aliases are illegal here.
    fn absorb_outer_tables(
        conditions: &[ConditionSqlNode],
        local_tables: &HashMap<String, Arc<Table>>,
        scope: &Scope,
        tables: &mut Vec<Arc<Table>>,
    ) -> QueryResult<()> {
        let mut absorbed: HashSet<String> = HashSet::new();
        for condition in conditions {
            for operand in [&condition.left, &condition.right] {
                let CondOperand::Attr(attr) = operand else {
                    continue;
                };
                if attr.relation_name.is_none() && scope.is_select_alias(&attr.attribute_name) {
                    warn!(
                        "cannot use outer projection alias {} in a sub-select",
                        attr.attribute_name
                    );
                    return Err(QueryError::SqlSyntax(format!(
                        "outer projection alias {} is not visible here",
                        attr.attribute_name
                    )));
                }
                if let Some(rel) = &attr.relation_name {
                    if !local_tables.contains_key(rel) {
                        if let Some(outer) = scope.table(rel) {
                            if absorbed.insert(outer.name().to_string()) {
                                tables.push(outer.clone());
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    pub fn tables(&self) -> &[Arc<Table>] {
        &self.tables
    }

    pub fn query_fields(&self) -> &[Field] {
        &self.query_fields
    }

    pub fn aggr_fields(&self) -> &[Field] {
        &self.aggr_fields
    }

    pub fn aggr_to_query(&self) -> &BTreeMap<usize, usize> {
        &self.aggr_to_query
    }

    pub fn group_by_fields(&self) -> &[Field] {
        &self.group_by_fields
    }

    pub fn order_by_fields(&self) -> &[Field] {
        &self.order_by_fields
    }

    pub fn order_by_directions(&self) -> &[OrderDirection] {
        &self.order_by_directions
    }

    pub fn filter(&self) -> &FilterStmt {
        &self.filter
    }

    pub fn having_filter(&self) -> &FilterStmt {
        &self.having_filter
    }

    pub fn is_sub_select(&self) -> bool {
        self.is_sub_select
    }

    pub fn has_aggregates(&self) -> bool {
        !self.aggr_fields.is_empty()
    }
}
