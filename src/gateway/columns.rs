use crate::ast::{column_ref, direct_tables, for_each_select, walk_expr_shallow, DirectTables};
use crate::error::{GatewayError, Result};
use crate::manifest::Manifest;
use sqlparser::ast::{
    Expr, GroupByExpr, JoinConstraint, JoinOperator, Select, SelectItem, Statement, TableFactor,
    TableWithJoins,
};
use std::collections::{BTreeMap, BTreeSet};

/// Where a column reference sits inside its `SELECT`.
///
/// Unqualified names are only dangerous in filtering positions (`WHERE`,
/// `HAVING`, join `ON`), where an ambiguous reference could silently evade
/// the injected user filter. Projections and grouping are left to the
/// database to resolve.
#[derive(Clone, Copy, PartialEq)]
enum Context {
    Projection,
    Filter,
}

/// Alias-aware column whitelist.
///
/// Qualified references are resolved to a real table (directly by name or
/// through the enclosing `SELECT`'s alias map) and checked against that
/// table's `allowed_columns`. References qualified by a CTE alias are
/// skipped: the CTE body was validated on its own. Unqualified references
/// in filtering positions that could name a column of a user-scoped table
/// referenced by the statement are rejected outright.
pub(crate) fn enforce_column_access(
    statement: &Statement,
    manifest: &Manifest,
    cte_aliases: &BTreeSet<String>,
) -> Result<()> {
    let referenced = crate::ast::collect_real_tables(statement, cte_aliases);

    // column name -> user-scoped tables that expose it
    let mut user_scoped_columns: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for (table, policy) in manifest.user_scoped_tables() {
        for column in &policy.allowed_columns {
            user_scoped_columns
                .entry(column.as_str())
                .or_default()
                .insert(table.as_str());
        }
        if let Some(key) = &policy.user_key {
            user_scoped_columns
                .entry(key.as_str())
                .or_default()
                .insert(table.as_str());
        }
    }

    let check = ColumnCheck {
        manifest,
        cte_aliases,
        referenced: &referenced,
        user_scoped_columns,
    };

    for_each_select(statement, |select| check.check_select(select))
}

struct ColumnCheck<'a> {
    manifest: &'a Manifest,
    cte_aliases: &'a BTreeSet<String>,
    referenced: &'a BTreeSet<String>,
    user_scoped_columns: BTreeMap<&'a str, BTreeSet<&'a str>>,
}

impl ColumnCheck<'_> {
    fn check_select(&self, select: &Select) -> Result<()> {
        let direct = direct_tables(select, self.cte_aliases);

        for item in &select.projection {
            match item {
                SelectItem::UnnamedExpr(expr) | SelectItem::ExprWithAlias { expr, .. } => {
                    self.check_expr(expr, Context::Projection, &direct)?;
                }
                _ => {}
            }
        }
        if let GroupByExpr::Expressions(exprs, _) = &select.group_by {
            for expr in exprs {
                self.check_expr(expr, Context::Projection, &direct)?;
            }
        }
        if let Some(selection) = &select.selection {
            self.check_expr(selection, Context::Filter, &direct)?;
        }
        if let Some(having) = &select.having {
            self.check_expr(having, Context::Filter, &direct)?;
        }
        for table_with_joins in &select.from {
            self.check_joins(table_with_joins, &direct)?;
        }
        Ok(())
    }

    fn check_joins(&self, table_with_joins: &TableWithJoins, direct: &DirectTables) -> Result<()> {
        if let TableFactor::NestedJoin {
            table_with_joins: inner,
            ..
        } = &table_with_joins.relation
        {
            self.check_joins(inner, direct)?;
        }
        for join in &table_with_joins.joins {
            if let TableFactor::NestedJoin {
                table_with_joins: inner,
                ..
            } = &join.relation
            {
                self.check_joins(inner, direct)?;
            }
            if let Some(constraint) = join_constraint(&join.join_operator) {
                if let JoinConstraint::On(expr) = constraint {
                    self.check_expr(expr, Context::Filter, direct)?;
                }
            }
        }
        Ok(())
    }

    fn check_expr(&self, expr: &Expr, context: Context, direct: &DirectTables) -> Result<()> {
        let mut verdict = Ok(());
        walk_expr_shallow(expr, &mut |node| {
            if verdict.is_err() {
                return;
            }
            if let Some((qualifier, column)) = column_ref(node) {
                verdict = self.check_column(qualifier, column, context, direct);
            }
        });
        verdict
    }

    fn check_column(
        &self,
        qualifier: Option<&str>,
        column: &str,
        context: Context,
        direct: &DirectTables,
    ) -> Result<()> {
        match qualifier {
            Some(q) if self.cte_aliases.contains(q) => Ok(()),
            Some(q) => {
                // Direct policy lookup covers un-aliased references; the
                // alias map of the enclosing SELECT covers the rest.
                let real_table = if self.manifest.policy.contains_key(q) {
                    Some(q)
                } else {
                    direct.resolve_qualifier(q)
                };
                let Some(real_table) = real_table else {
                    // Unresolved qualifier: nothing meaningful to enforce,
                    // the database will reject it if it is nonsense.
                    return Ok(());
                };
                let Some(policy) = self.manifest.policy.get(real_table) else {
                    return Ok(());
                };
                if !policy.allowed_columns.contains(column) {
                    return Err(GatewayError::ColumnNotAllowed {
                        column: column.to_string(),
                        table: real_table.to_string(),
                        via_alias: (real_table != q).then(|| q.to_string()),
                    });
                }
                Ok(())
            }
            None => {
                if context != Context::Filter {
                    return Ok(());
                }
                let Some(owners) = self.user_scoped_columns.get(column) else {
                    return Ok(());
                };
                let candidates: Vec<String> = owners
                    .iter()
                    .filter(|t| self.referenced.contains(**t))
                    .map(|t| t.to_string())
                    .collect();
                if candidates.is_empty() {
                    return Ok(());
                }
                Err(GatewayError::AmbiguousColumn {
                    column: column.to_string(),
                    candidates,
                })
            }
        }
    }
}

fn join_constraint(operator: &JoinOperator) -> Option<&JoinConstraint> {
    match operator {
        JoinOperator::Join(c)
        | JoinOperator::Inner(c)
        | JoinOperator::Left(c)
        | JoinOperator::LeftOuter(c)
        | JoinOperator::Right(c)
        | JoinOperator::RightOuter(c)
        | JoinOperator::FullOuter(c) => Some(c),
        _ => None,
    }
}
