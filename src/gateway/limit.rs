use sqlparser::ast::{Expr, LimitClause, Statement, Value};

/// Cap the top-level `LIMIT` at `max_rows`.
///
/// A missing limit is injected, a numeric limit above the cap is lowered,
/// and a limit whose value cannot be read as an integer (a parameter, an
/// expression) is replaced outright. `OFFSET` and `LIMIT BY` parts are
/// preserved.
pub(crate) fn enforce_limit(statement: &mut Statement, max_rows: u64) {
    let Statement::Query(query) = statement else {
        return;
    };

    match &mut query.limit_clause {
        Some(LimitClause::LimitOffset { limit, .. }) => {
            let needs_cap = match limit.as_ref() {
                Some(expr) => numeric_limit(expr).map_or(true, |value| value > max_rows),
                None => true,
            };
            if needs_cap {
                *limit = Some(limit_expr(max_rows));
            }
        }
        Some(LimitClause::OffsetCommaLimit { limit, .. }) => {
            if numeric_limit(limit).map_or(true, |value| value > max_rows) {
                *limit = limit_expr(max_rows);
            }
        }
        None => {
            query.limit_clause = Some(LimitClause::LimitOffset {
                limit: Some(limit_expr(max_rows)),
                offset: None,
                limit_by: Vec::new(),
            });
        }
    }
}

fn numeric_limit(expr: &Expr) -> Option<u64> {
    match expr {
        Expr::Value(value) => match &value.value {
            Value::Number(text, _) => text.parse().ok(),
            _ => None,
        },
        _ => None,
    }
}

fn limit_expr(max_rows: u64) -> Expr {
    Expr::Value(Value::Number(max_rows.to_string(), false).with_empty_span())
}
