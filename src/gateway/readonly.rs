use crate::error::{GatewayError, Result};
use sqlparser::ast::{visit_statements, SetExpr, Statement};
use std::ops::ControlFlow;

/// Allowlist read-only gate.
///
/// The top-level statement must be a query whose body resolves to `SELECT`
/// nodes, possibly combined through set operations (`UNION` etc.).
/// Everything else — writes, DDL, `EXPLAIN`, `COPY`, `GRANT`, `TRUNCATE`,
/// `SET`, transaction control, procedural blocks, bare `VALUES` — is
/// rejected. A second, full-tree walk then rejects any write or DDL node
/// embedded deeper in the statement (some dialects accept data-modifying
/// CTEs).
pub(crate) fn enforce_read_only(statement: &Statement) -> Result<()> {
    match statement {
        Statement::Query(query) if body_is_read_only(&query.body) => {}
        other => return Err(GatewayError::not_read_only(leading_keyword(other))),
    }

    let flow = visit_statements(statement, |nested: &Statement| {
        if is_write_or_ddl(nested) {
            ControlFlow::Break(())
        } else {
            ControlFlow::<()>::Continue(())
        }
    });
    if flow.is_break() {
        return Err(GatewayError::not_read_only("write or DDL operation"));
    }
    Ok(())
}

fn body_is_read_only(body: &SetExpr) -> bool {
    match body {
        SetExpr::Select(_) => true,
        SetExpr::Query(inner) => body_is_read_only(&inner.body),
        SetExpr::SetOperation { left, right, .. } => {
            body_is_read_only(left) && body_is_read_only(right)
        }
        _ => false,
    }
}

fn is_write_or_ddl(statement: &Statement) -> bool {
    matches!(
        statement,
        Statement::Insert { .. }
            | Statement::Update { .. }
            | Statement::Delete { .. }
            | Statement::Merge { .. }
            | Statement::CreateTable { .. }
            | Statement::CreateView { .. }
            | Statement::CreateIndex { .. }
            | Statement::CreateSchema { .. }
            | Statement::CreateDatabase { .. }
            | Statement::CreateFunction { .. }
            | Statement::CreateTrigger { .. }
            | Statement::CreateRole { .. }
            | Statement::Drop { .. }
            | Statement::DropFunction { .. }
            | Statement::DropTrigger { .. }
            | Statement::Truncate { .. }
            | Statement::AlterTable { .. }
            | Statement::AlterIndex { .. }
            | Statement::AlterView { .. }
            | Statement::AlterRole { .. }
    )
}

/// First keyword of the statement's rendering, for the rejection message.
fn leading_keyword(statement: &Statement) -> String {
    statement
        .to_string()
        .split_whitespace()
        .next()
        .unwrap_or("statement")
        .to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlparser::dialect::PostgreSqlDialect;
    use sqlparser::parser::Parser;

    fn parse(sql: &str) -> Statement {
        Parser::parse_sql(&PostgreSqlDialect {}, sql)
            .unwrap()
            .remove(0)
    }

    #[test]
    fn select_and_union_pass() {
        assert!(enforce_read_only(&parse("SELECT 1")).is_ok());
        assert!(enforce_read_only(&parse("SELECT 1 UNION SELECT 2")).is_ok());
        assert!(enforce_read_only(&parse("(SELECT 1)")).is_ok());
    }

    #[test]
    fn writes_rejected() {
        for sql in [
            "INSERT INTO employee (first_name) VALUES ('hack')",
            "UPDATE employee SET first_name = 'hack'",
            "DELETE FROM employee",
            "DROP TABLE employee",
            "TRUNCATE TABLE employee",
        ] {
            let err = enforce_read_only(&parse(sql)).unwrap_err();
            assert!(
                matches!(err, GatewayError::NotReadOnly { .. }),
                "expected NotReadOnly for {sql}, got {err}"
            );
        }
    }

    #[test]
    fn explain_rejected() {
        let err = enforce_read_only(&parse("EXPLAIN ANALYZE SELECT employee.id FROM employee"))
            .unwrap_err();
        assert!(err.to_string().contains("EXPLAIN"));
    }

    #[test]
    fn administrative_statements_rejected() {
        for sql in ["GRANT SELECT ON employee TO joe", "SET search_path = hr"] {
            assert!(enforce_read_only(&parse(sql)).is_err(), "{sql}");
        }
    }

    #[test]
    fn values_body_rejected() {
        assert!(enforce_read_only(&parse("VALUES (1), (2)")).is_err());
    }
}
