use crate::error::{GatewayError, Result};
use sqlparser::ast::Statement;
use sqlparser::dialect::dialect_from_str;
use sqlparser::parser::Parser;

/// Parse exactly one statement in the manifest's dialect.
///
/// Stacked queries are the primary SQL-injection escalation vector, so any
/// second statement is a hard reject here rather than something every
/// downstream pass has to defend against. A trailing semicolon that yields
/// no extra statement is tolerated by the parser itself.
pub(crate) fn parse_single_statement(sql: &str, dialect: &str) -> Result<Statement> {
    let dialect = dialect_from_str(dialect).ok_or_else(|| GatewayError::UnknownDialect {
        dialect: dialect.to_string(),
    })?;

    let statements = Parser::parse_sql(&*dialect, sql)
        .map_err(|e| GatewayError::invalid_sql(e.to_string()))?;

    let mut statements = statements.into_iter();
    let first = statements
        .next()
        .ok_or_else(|| GatewayError::invalid_sql("empty SQL statement"))?;
    if statements.next().is_some() {
        return Err(GatewayError::invalid_sql(
            "multi-statement (stacked) queries are not allowed",
        ));
    }
    Ok(first)
}
