use crate::ast::{direct_tables, for_each_select_mut, table_name};
use crate::manifest::Manifest;
use sqlparser::ast::{
    Expr, Ident, Select, SelectItem, SelectItemQualifiedWildcardKind, Statement,
};
use std::collections::BTreeSet;

/// Rewrite `SELECT *` and `SELECT q.*` into explicit column lists drawn
/// from the table policies, before column enforcement runs.
///
/// Expanding instead of rejecting keeps naturally-written queries working
/// while guaranteeing the projection can only ever contain allowed columns.
/// Stars over CTE output (`SELECT * FROM some_cte`, `cte.*`) are left
/// untouched: the CTE body is validated on its own and its projection is
/// not described by the policies.
pub(crate) fn expand_select_star(
    statement: &mut Statement,
    manifest: &Manifest,
    cte_aliases: &BTreeSet<String>,
) {
    for_each_select_mut(statement, |select| expand_in_select(select, manifest, cte_aliases));
}

fn expand_in_select(select: &mut Select, manifest: &Manifest, cte_aliases: &BTreeSet<String>) {
    let has_wildcard = select.projection.iter().any(|item| {
        matches!(
            item,
            SelectItem::Wildcard(_) | SelectItem::QualifiedWildcard(_, _)
        )
    });
    if !has_wildcard {
        return;
    }

    let direct = direct_tables(select, cte_aliases);
    let mut expanded = Vec::with_capacity(select.projection.len());

    for item in select.projection.drain(..) {
        match item {
            SelectItem::Wildcard(_) if !direct.is_empty() => {
                for (table, qualifier) in direct.iter() {
                    if let Some(policy) = manifest.policy.get(table) {
                        push_columns(&mut expanded, qualifier, &policy.allowed_columns);
                    }
                }
            }
            SelectItem::QualifiedWildcard(
                SelectItemQualifiedWildcardKind::ObjectName(ref name),
                _,
            ) => {
                let qualifier = table_name(name);
                match qualifier {
                    Some(q) if !cte_aliases.contains(&q) => {
                        let real_table = direct.resolve_qualifier(&q).unwrap_or(q.as_str());
                        match manifest.policy.get(real_table) {
                            Some(policy) => {
                                push_columns(&mut expanded, &q, &policy.allowed_columns)
                            }
                            // Unknown qualifier: keep as-is and let column
                            // enforcement or the database reject it.
                            None => expanded.push(item),
                        }
                    }
                    _ => expanded.push(item),
                }
            }
            other => expanded.push(other),
        }
    }

    select.projection = expanded;
}

fn push_columns(items: &mut Vec<SelectItem>, qualifier: &str, columns: &BTreeSet<String>) {
    for column in columns {
        items.push(SelectItem::UnnamedExpr(Expr::CompoundIdentifier(vec![
            Ident::new(qualifier),
            Ident::new(column.clone()),
        ])));
    }
}
