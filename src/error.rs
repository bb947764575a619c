use thiserror::Error;

/// Structured error type for gateway validation verdicts.
///
/// Every rejection carries the offending name(s) so the embedding
/// application can log precisely; the `Display` messages are safe to relay
/// to an LLM tool loop but are not meant for end users.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Invalid SQL: {message}")]
    InvalidSql { message: String },

    #[error("Only SELECT queries are allowed (got {statement})")]
    NotReadOnly { statement: String },

    #[error("Blocked function: {function}")]
    BlockedFunction { function: String },

    #[error("Table not allowed: {table}")]
    TableNotAllowed { table: String },

    #[error("Column '{column}' not allowed on table '{table}'{}", .via_alias.as_ref().map(|a| format!(" (via alias '{a}')")).unwrap_or_default())]
    ColumnNotAllowed {
        column: String,
        table: String,
        via_alias: Option<String>,
    },

    #[error("Unqualified column '{column}' is ambiguous: it could resolve to user-scoped table(s) {candidates:?}. Always qualify columns with their table name.")]
    AmbiguousColumn {
        column: String,
        candidates: Vec<String>,
    },

    #[error("Security violation: SELECT on user-scoped table '{table}' is missing the required user filter ({expected}). Access denied.")]
    MissingUserFilter { table: String, expected: String },

    #[error("Unsupported SQL dialect: {dialect}")]
    UnknownDialect { dialect: String },

    #[error("Invalid manifest: {message}")]
    InvalidManifest { message: String },
}

impl GatewayError {
    pub fn invalid_sql(message: impl Into<String>) -> Self {
        Self::InvalidSql {
            message: message.into(),
        }
    }

    pub fn not_read_only(statement: impl Into<String>) -> Self {
        Self::NotReadOnly {
            statement: statement.into(),
        }
    }

    pub fn blocked_function(function: impl Into<String>) -> Self {
        Self::BlockedFunction {
            function: function.into(),
        }
    }

    pub fn table_not_allowed(table: impl Into<String>) -> Self {
        Self::TableNotAllowed {
            table: table.into(),
        }
    }

    pub fn invalid_manifest(message: impl Into<String>) -> Self {
        Self::InvalidManifest {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
