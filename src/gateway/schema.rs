use crate::manifest::Manifest;
use sqlparser::ast::{visit_relations_mut, Ident, ObjectName, ObjectNamePart, Statement};
use std::collections::BTreeSet;
use std::ops::ControlFlow;

/// Prefix unqualified policy-table references with the manifest's default
/// schema (e.g. for T-SQL databases where tables live under a named schema
/// such as `employees.employee`).
///
/// CTE references stay bare, tables that already carry a schema or catalog
/// qualifier are untouched, and unknown tables are left alone — the table
/// whitelist has already rejected them before this pass runs.
pub(crate) fn qualify_tables_with_schema(
    statement: &mut Statement,
    manifest: &Manifest,
    cte_aliases: &BTreeSet<String>,
) {
    let Some(schema) = manifest.default_schema.as_deref() else {
        return;
    };

    let _ = visit_relations_mut(statement, |name: &mut ObjectName| {
        if name.0.len() == 1 {
            if let ObjectNamePart::Identifier(ident) = &name.0[0] {
                let table = ident.value.clone();
                if !cte_aliases.contains(&table) && manifest.policy.contains_key(&table) {
                    name.0
                        .insert(0, ObjectNamePart::Identifier(Ident::new(schema)));
                }
            }
        }
        ControlFlow::<()>::Continue(())
    });
}
