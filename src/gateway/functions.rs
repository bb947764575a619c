use crate::ast::{for_each_select, table_name};
use crate::error::{GatewayError, Result};
use sqlparser::ast::{visit_expressions, Expr, ObjectName, Statement, TableFactor};
use std::collections::BTreeSet;
use std::ops::ControlFlow;

/// Reject any application of a blocklisted function.
///
/// Function names are case-folded and compared by their unqualified name,
/// so `PG_SLEEP(1)` and `pg_catalog.pg_sleep(1)` are both caught. Besides
/// ordinary expression calls, table-valued calls in `FROM` (for example
/// `FROM dblink(...)`) are checked by name as well.
pub(crate) fn enforce_safe_functions(
    statement: &Statement,
    blocked_functions: &BTreeSet<String>,
) -> Result<()> {
    if blocked_functions.is_empty() {
        return Ok(());
    }

    let flow = visit_expressions(statement, |expr: &Expr| {
        if let Expr::Function(func) = expr {
            if let Some(name) = blocked_name(&func.name, blocked_functions) {
                return ControlFlow::Break(name);
            }
        }
        ControlFlow::Continue(())
    });
    if let ControlFlow::Break(name) = flow {
        return Err(GatewayError::blocked_function(name));
    }

    for_each_select(statement, |select| {
        for table_with_joins in &select.from {
            check_factor(&table_with_joins.relation, blocked_functions)?;
            for join in &table_with_joins.joins {
                check_factor(&join.relation, blocked_functions)?;
            }
        }
        Ok(())
    })
}

fn check_factor(factor: &TableFactor, blocked_functions: &BTreeSet<String>) -> Result<()> {
    match factor {
        TableFactor::Table {
            name,
            args: Some(_),
            ..
        } => {
            if let Some(blocked) = blocked_name(name, blocked_functions) {
                return Err(GatewayError::blocked_function(blocked));
            }
            Ok(())
        }
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => {
            check_factor(&table_with_joins.relation, blocked_functions)?;
            for join in &table_with_joins.joins {
                check_factor(&join.relation, blocked_functions)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn blocked_name(name: &ObjectName, blocked_functions: &BTreeSet<String>) -> Option<String> {
    let name = table_name(name)?.to_lowercase();
    blocked_functions.contains(&name).then_some(name)
}
