//! User-filter stripping, injection and the post-injection audit.
//!
//! For every `SELECT` that directly reads a user-scoped table, the emitted
//! query must carry `qualifier.user_key = user_id` as a top-level AND
//! conjunct of its `WHERE` clause, and no caller-supplied condition on that
//! column may survive — whatever its operator or position in the boolean
//! tree. The injector rewrites every `SELECT` in the statement (CTE bodies
//! are the classic bypass vector); the audit then re-verifies the result
//! structurally, so a future bug in the rewrite cannot ship unsafe SQL.

use crate::ast::{
    collect_real_tables, direct_tables, for_each_select, for_each_select_mut,
};
use crate::error::{GatewayError, Result};
use crate::manifest::{Manifest, Scope, TablePolicy};
use crate::gateway::ValidateOptions;
use sqlparser::ast::{
    visit_expressions, BinaryOperator, Expr, Ident, Select, Statement, Value,
};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::ControlFlow;

/// Tables whose filter must be present, in deterministic order.
fn filter_targets<'a>(
    statement: &Statement,
    manifest: &'a Manifest,
    options: &ValidateOptions,
    cte_aliases: &BTreeSet<String>,
) -> BTreeMap<&'a str, &'a TablePolicy> {
    let referenced = collect_real_tables(statement, cte_aliases);
    manifest
        .policy
        .iter()
        .filter(|(table, policy)| {
            let wanted = match policy.scope {
                Scope::User => true,
                Scope::Global => {
                    options.enforce_user_filter_on_global_tables && policy.user_key.is_some()
                }
            };
            wanted
                && referenced.contains(*table)
                && !options.skip_user_filter_tables.contains(*table)
        })
        .map(|(table, policy)| (table.as_str(), policy))
        .collect()
}

/// Strip caller conditions on each target's user key and inject the
/// authoritative `qualifier.user_key = user_id` predicate into every
/// `SELECT` that directly references that target.
pub(crate) fn inject_user_filters(
    statement: &mut Statement,
    manifest: &Manifest,
    user_id: i64,
    options: &ValidateOptions,
    cte_aliases: &BTreeSet<String>,
) {
    let targets = filter_targets(statement, manifest, options, cte_aliases);
    if targets.is_empty() {
        return;
    }

    for_each_select_mut(statement, |select| {
        let direct = direct_tables(select, cte_aliases);
        for (&table, policy) in &targets {
            let Some(user_key) = policy.user_key.as_deref() else {
                continue;
            };
            let Some(qualifier) = direct.qualifier_of(table) else {
                continue;
            };
            let qualifier = qualifier.to_string();
            strip_user_key_conditions(select, &qualifier, user_key);
            inject_predicate(select, &qualifier, user_key, user_id);
        }
    });
}

/// Remove every existing condition on `qualifier.user_key` from the
/// `WHERE` clause, whatever the operator.
///
/// The caller (or the LLM) must not be able to pre-seed any predicate on
/// the user key: equality with a foreign id, inequalities, `IN`/`BETWEEN`
/// ranges, `OR`-wrapped alternatives. The rewrite has three cases: `AND`
/// recurses into both branches and collapses emptied sides; an `OR` either
/// of whose branches touches the key is deleted whole — keeping the other
/// branch would widen the result set past the intended scope; every other
/// node (parenthesized groups included) is an opaque unit, deleted if its
/// subtree touches the key and kept unchanged otherwise.
fn strip_user_key_conditions(select: &mut Select, qualifier: &str, user_key: &str) {
    if let Some(existing) = select.selection.take() {
        select.selection = strip_expr(existing, qualifier, user_key);
    }
}

fn strip_expr(expr: Expr, qualifier: &str, user_key: &str) -> Option<Expr> {
    match expr {
        Expr::BinaryOp {
            left,
            op: BinaryOperator::And,
            right,
        } => {
            let left = strip_expr(*left, qualifier, user_key);
            let right = strip_expr(*right, qualifier, user_key);
            match (left, right) {
                (Some(l), Some(r)) => Some(Expr::BinaryOp {
                    left: Box::new(l),
                    op: BinaryOperator::And,
                    right: Box::new(r),
                }),
                (Some(survivor), None) | (None, Some(survivor)) => Some(survivor),
                (None, None) => None,
            }
        }
        Expr::BinaryOp {
            left,
            op: BinaryOperator::Or,
            right,
        } => {
            if mentions_user_key(&left, qualifier, user_key)
                || mentions_user_key(&right, qualifier, user_key)
            {
                None
            } else {
                Some(Expr::BinaryOp {
                    left,
                    op: BinaryOperator::Or,
                    right,
                })
            }
        }
        other => {
            if mentions_user_key(&other, qualifier, user_key) {
                None
            } else {
                Some(other)
            }
        }
    }
}

/// Whether any descendant column (subqueries included) is exactly
/// `qualifier.user_key`.
fn mentions_user_key(expr: &Expr, qualifier: &str, user_key: &str) -> bool {
    visit_expressions(expr, |node: &Expr| {
        if is_user_key_column(node, qualifier, user_key) {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    })
    .is_break()
}

fn is_user_key_column(expr: &Expr, qualifier: &str, user_key: &str) -> bool {
    match expr {
        Expr::CompoundIdentifier(parts) if parts.len() >= 2 => {
            parts[parts.len() - 1].value == user_key && parts[parts.len() - 2].value == qualifier
        }
        _ => false,
    }
}

/// Append the authoritative predicate as a top-level AND conjunct.
///
/// The surviving condition is always wrapped in parentheses first: an `OR`
/// anywhere near its top would otherwise bind looser than the appended
/// `AND` and re-widen the filtered rows.
fn inject_predicate(select: &mut Select, qualifier: &str, user_key: &str, user_id: i64) {
    let predicate = Expr::BinaryOp {
        left: Box::new(Expr::CompoundIdentifier(vec![
            Ident::new(qualifier),
            Ident::new(user_key),
        ])),
        op: BinaryOperator::Eq,
        right: Box::new(Expr::Value(
            Value::Number(user_id.to_string(), false).with_empty_span(),
        )),
    };

    select.selection = Some(match select.selection.take() {
        None => predicate,
        Some(existing) => Expr::BinaryOp {
            left: Box::new(Expr::Nested(Box::new(existing))),
            op: BinaryOperator::And,
            right: Box::new(predicate),
        },
    });
}

/// Verify, structurally, that every `SELECT` directly reading a target
/// table carries the expected predicate as a top-level AND conjunct.
///
/// The search descends only `AND` and parenthesis nodes: a predicate buried
/// inside an `OR` does not satisfy the audit, because the other branch
/// could still widen the result set.
pub(crate) fn audit_user_filters(
    statement: &Statement,
    manifest: &Manifest,
    user_id: i64,
    options: &ValidateOptions,
    cte_aliases: &BTreeSet<String>,
) -> Result<()> {
    let targets = filter_targets(statement, manifest, options, cte_aliases);
    if targets.is_empty() {
        return Ok(());
    }

    for_each_select(statement, |select| {
        let direct = direct_tables(select, cte_aliases);
        for (&table, policy) in &targets {
            let Some(user_key) = policy.user_key.as_deref() else {
                continue;
            };
            let Some(qualifier) = direct.qualifier_of(table) else {
                continue;
            };
            let satisfied = select
                .selection
                .as_ref()
                .is_some_and(|w| has_conjunct(w, qualifier, user_key, user_id));
            if !satisfied {
                return Err(GatewayError::MissingUserFilter {
                    table: table.to_string(),
                    expected: format!("{qualifier}.{user_key} = {user_id}"),
                });
            }
        }
        Ok(())
    })
}

fn has_conjunct(expr: &Expr, qualifier: &str, user_key: &str, user_id: i64) -> bool {
    match expr {
        Expr::BinaryOp {
            left,
            op: BinaryOperator::And,
            right,
        } => {
            has_conjunct(left, qualifier, user_key, user_id)
                || has_conjunct(right, qualifier, user_key, user_id)
        }
        Expr::Nested(inner) => has_conjunct(inner, qualifier, user_key, user_id),
        Expr::BinaryOp {
            left,
            op: BinaryOperator::Eq,
            right,
        } => {
            is_user_key_column(left, qualifier, user_key)
                && matches!(
                    right.as_ref(),
                    Expr::Value(value)
                        if matches!(&value.value, Value::Number(n, _) if n.parse() == Ok(user_id))
                )
        }
        _ => false,
    }
}
