//! AST utilities shared by the enforcement passes.
//!
//! The passes need three structural views of a statement: the set of CTE
//! aliases it defines (never real tables), the set of real tables it
//! references anywhere, and — per `SELECT` — the tables that sit directly
//! in its `FROM`/`JOIN` clauses without crossing a subquery boundary.

use crate::error::{GatewayError, Result};
use sqlparser::ast::{
    visit_relations, Expr, FunctionArg, FunctionArgExpr, FunctionArguments, ObjectName,
    ObjectNamePart, Query, Select, SetExpr, Statement, TableFactor, Visit, VisitMut, Visitor,
    VisitorMut, WindowType,
};
use std::collections::BTreeSet;
use std::ops::ControlFlow;

/// Unqualified name of a table reference (the last path segment).
pub fn table_name(name: &ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.clone()),
        _ => None,
    })
}

/// The `(qualifier, column)` parts of a column reference, if `expr` is one.
///
/// For references deeper than two parts (`schema.table.column`) the
/// qualifier is the segment immediately before the column name.
pub fn column_ref(expr: &Expr) -> Option<(Option<&str>, &str)> {
    match expr {
        Expr::Identifier(ident) => Some((None, ident.value.as_str())),
        Expr::CompoundIdentifier(parts) if parts.len() >= 2 => {
            let column = parts.last()?;
            let qualifier = &parts[parts.len() - 2];
            Some((Some(qualifier.value.as_str()), column.value.as_str()))
        }
        _ => None,
    }
}

struct CteCollector {
    aliases: BTreeSet<String>,
}

impl Visitor for CteCollector {
    type Break = ();

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<()> {
        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                self.aliases.insert(cte.alias.name.value.clone());
            }
        }
        ControlFlow::Continue(())
    }
}

/// CTE alias names defined anywhere in the statement, including inside
/// nested subqueries.
pub fn collect_cte_aliases(statement: &Statement) -> BTreeSet<String> {
    let mut collector = CteCollector {
        aliases: BTreeSet::new(),
    };
    let _ = statement.visit(&mut collector);
    collector.aliases
}

/// Every real table referenced anywhere in the statement (CTE bodies
/// included), excluding the CTE aliases themselves.
pub fn collect_real_tables(
    statement: &Statement,
    cte_aliases: &BTreeSet<String>,
) -> BTreeSet<String> {
    let mut tables = BTreeSet::new();
    let _ = visit_relations(statement, |name: &ObjectName| {
        if let Some(table) = table_name(name) {
            // A CTE can only be referenced by its bare alias.
            if name.0.len() > 1 || !cte_aliases.contains(&table) {
                tables.insert(table);
            }
        }
        ControlFlow::<()>::Continue(())
    });
    tables
}

/// The tables sitting directly in one `SELECT`'s `FROM`/`JOIN` clauses,
/// in clause order, each with its qualifier (alias if present, otherwise
/// the table name itself).
#[derive(Debug, Default, Clone)]
pub struct DirectTables {
    entries: Vec<(String, String)>,
}

impl DirectTables {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.entries.iter().map(|(t, q)| (t.as_str(), q.as_str()))
    }

    /// Qualifier to use when referencing `table` in this `SELECT`.
    pub fn qualifier_of(&self, table: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(t, _)| t == table)
            .map(|(_, q)| q.as_str())
    }

    /// Real table behind `qualifier`, for alias resolution.
    pub fn resolve_qualifier(&self, qualifier: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(_, q)| q == qualifier)
            .map(|(t, _)| t.as_str())
    }

    fn insert(&mut self, table: String, qualifier: String) {
        match self.entries.iter_mut().find(|(t, _)| *t == table) {
            Some(entry) => entry.1 = qualifier,
            None => self.entries.push((table, qualifier)),
        }
    }
}

/// Collect the direct tables of `select`. The walk descends nested joins
/// but stops at derived tables and subqueries, so correlated or derived
/// scopes never leak into the enclosing `SELECT`.
pub fn direct_tables(select: &Select, cte_aliases: &BTreeSet<String>) -> DirectTables {
    let mut out = DirectTables::default();
    for table_with_joins in &select.from {
        collect_factor(&table_with_joins.relation, cte_aliases, &mut out);
        for join in &table_with_joins.joins {
            collect_factor(&join.relation, cte_aliases, &mut out);
        }
    }
    out
}

fn collect_factor(factor: &TableFactor, cte_aliases: &BTreeSet<String>, out: &mut DirectTables) {
    match factor {
        TableFactor::Table { name, alias, .. } => {
            let Some(table) = table_name(name) else { return };
            if name.0.len() == 1 && cte_aliases.contains(&table) {
                return;
            }
            let qualifier = alias
                .as_ref()
                .map(|a| a.name.value.clone())
                .unwrap_or_else(|| table.clone());
            out.insert(table, qualifier);
        }
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => {
            collect_factor(&table_with_joins.relation, cte_aliases, out);
            for join in &table_with_joins.joins {
                collect_factor(&join.relation, cte_aliases, out);
            }
        }
        _ => {}
    }
}

struct SelectWalker<F> {
    callback: F,
}

impl<F> SelectWalker<F>
where
    F: FnMut(&Select) -> Result<()>,
{
    fn walk_body(&mut self, body: &SetExpr) -> ControlFlow<GatewayError> {
        match body {
            SetExpr::Select(select) => match (self.callback)(select) {
                Ok(()) => ControlFlow::Continue(()),
                Err(err) => ControlFlow::Break(err),
            },
            SetExpr::SetOperation { left, right, .. } => {
                self.walk_body(left)?;
                self.walk_body(right)
            }
            // SetExpr::Query and everything else either gets its own
            // pre_visit_query call or holds no SELECT.
            _ => ControlFlow::Continue(()),
        }
    }
}

impl<F> Visitor for SelectWalker<F>
where
    F: FnMut(&Select) -> Result<()>,
{
    type Break = GatewayError;

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<GatewayError> {
        self.walk_body(&query.body)
    }
}

/// Run `callback` on every `SELECT` node in the statement: top level, set
/// operation arms, CTE bodies, derived tables and subquery expressions.
/// Stops at the first error.
pub fn for_each_select<F>(statement: &Statement, callback: F) -> Result<()>
where
    F: FnMut(&Select) -> Result<()>,
{
    let mut walker = SelectWalker { callback };
    match statement.visit(&mut walker) {
        ControlFlow::Break(err) => Err(err),
        ControlFlow::Continue(()) => Ok(()),
    }
}

struct SelectWalkerMut<F> {
    callback: F,
}

fn walk_body_mut<F>(body: &mut SetExpr, callback: &mut F)
where
    F: FnMut(&mut Select),
{
    match body {
        SetExpr::Select(select) => callback(select),
        SetExpr::SetOperation { left, right, .. } => {
            walk_body_mut(left, callback);
            walk_body_mut(right, callback);
        }
        _ => {}
    }
}

impl<F> VisitorMut for SelectWalkerMut<F>
where
    F: FnMut(&mut Select),
{
    type Break = ();

    fn pre_visit_query(&mut self, query: &mut Query) -> ControlFlow<()> {
        walk_body_mut(&mut query.body, &mut self.callback);
        ControlFlow::Continue(())
    }
}

/// Mutating counterpart of [`for_each_select`].
pub fn for_each_select_mut<F>(statement: &mut Statement, callback: F)
where
    F: FnMut(&mut Select),
{
    let mut walker = SelectWalkerMut { callback };
    let _ = statement.visit(&mut walker);
}

/// Walk `expr` and its descendants, calling `f` on every expression node,
/// without descending into subqueries. Nested queries are separate scopes
/// and are handled through their own `SELECT` nodes.
pub fn walk_expr_shallow<'a, F>(expr: &'a Expr, f: &mut F)
where
    F: FnMut(&'a Expr),
{
    f(expr);
    match expr {
        Expr::BinaryOp { left, right, .. } => {
            walk_expr_shallow(left, f);
            walk_expr_shallow(right, f);
        }
        Expr::UnaryOp { expr: inner, .. } => walk_expr_shallow(inner, f),
        Expr::Nested(inner) => walk_expr_shallow(inner, f),
        Expr::IsNull(inner)
        | Expr::IsNotNull(inner)
        | Expr::IsTrue(inner)
        | Expr::IsNotTrue(inner)
        | Expr::IsFalse(inner)
        | Expr::IsNotFalse(inner)
        | Expr::IsUnknown(inner)
        | Expr::IsNotUnknown(inner) => walk_expr_shallow(inner, f),
        Expr::IsDistinctFrom(left, right) | Expr::IsNotDistinctFrom(left, right) => {
            walk_expr_shallow(left, f);
            walk_expr_shallow(right, f);
        }
        Expr::InList { expr: inner, list, .. } => {
            walk_expr_shallow(inner, f);
            for item in list {
                walk_expr_shallow(item, f);
            }
        }
        // The tested expression is part of this scope; the subquery is not.
        Expr::InSubquery { expr: inner, .. } => walk_expr_shallow(inner, f),
        Expr::Between {
            expr: inner,
            low,
            high,
            ..
        } => {
            walk_expr_shallow(inner, f);
            walk_expr_shallow(low, f);
            walk_expr_shallow(high, f);
        }
        Expr::Like {
            expr: inner,
            pattern,
            ..
        }
        | Expr::ILike {
            expr: inner,
            pattern,
            ..
        }
        | Expr::SimilarTo {
            expr: inner,
            pattern,
            ..
        } => {
            walk_expr_shallow(inner, f);
            walk_expr_shallow(pattern, f);
        }
        Expr::AnyOp { left, right, .. } | Expr::AllOp { left, right, .. } => {
            walk_expr_shallow(left, f);
            walk_expr_shallow(right, f);
        }
        Expr::Case {
            operand,
            conditions,
            else_result,
            ..
        } => {
            if let Some(op) = operand {
                walk_expr_shallow(op, f);
            }
            for when in conditions {
                walk_expr_shallow(&when.condition, f);
                walk_expr_shallow(&when.result, f);
            }
            if let Some(else_result) = else_result {
                walk_expr_shallow(else_result, f);
            }
        }
        Expr::Cast { expr: inner, .. } => walk_expr_shallow(inner, f),
        Expr::Extract { expr: inner, .. } => walk_expr_shallow(inner, f),
        Expr::Substring {
            expr: inner,
            substring_from,
            substring_for,
            ..
        } => {
            walk_expr_shallow(inner, f);
            if let Some(from) = substring_from {
                walk_expr_shallow(from, f);
            }
            if let Some(length) = substring_for {
                walk_expr_shallow(length, f);
            }
        }
        Expr::Trim {
            expr: inner,
            trim_what,
            ..
        } => {
            walk_expr_shallow(inner, f);
            if let Some(what) = trim_what {
                walk_expr_shallow(what, f);
            }
        }
        Expr::Position { expr: inner, r#in } => {
            walk_expr_shallow(inner, f);
            walk_expr_shallow(r#in, f);
        }
        Expr::Collate { expr: inner, .. } => walk_expr_shallow(inner, f),
        Expr::Tuple(items) => {
            for item in items {
                walk_expr_shallow(item, f);
            }
        }
        Expr::Function(func) => {
            if let FunctionArguments::List(list) = &func.args {
                for arg in &list.args {
                    match arg {
                        FunctionArg::Unnamed(arg_expr) => walk_arg_expr(arg_expr, f),
                        FunctionArg::Named { arg, .. } => walk_arg_expr(arg, f),
                        FunctionArg::ExprNamed { name, arg, .. } => {
                            walk_expr_shallow(name, f);
                            walk_arg_expr(arg, f);
                        }
                    }
                }
            }
            if let Some(filter) = &func.filter {
                walk_expr_shallow(filter, f);
            }
            if let Some(WindowType::WindowSpec(spec)) = &func.over {
                for partition in &spec.partition_by {
                    walk_expr_shallow(partition, f);
                }
                for order in &spec.order_by {
                    walk_expr_shallow(&order.expr, f);
                }
            }
        }
        // Exists / Subquery and any remaining exotic variants: either a
        // separate scope or no column references worth chasing.
        _ => {}
    }
}

fn walk_arg_expr<'a, F>(arg_expr: &'a FunctionArgExpr, f: &mut F)
where
    F: FnMut(&'a Expr),
{
    if let FunctionArgExpr::Expr(expr) = arg_expr {
        walk_expr_shallow(expr, f);
    }
}
