//! The validation pipeline.
//!
//! [`Gateway::validate_query`] runs a fixed sequence of passes over a fresh
//! AST: parse, read-only gate, blocked-function gate, table whitelist, star
//! expansion, column whitelist, user-filter injection plus audit, limit cap
//! and schema qualification, then serializes the rewritten statement. The
//! ordering is load-bearing: stars must be expanded before columns are
//! checked, the audit must follow injection, and unknown tables must be
//! rejected before anything would qualify them with a schema.

mod columns;
mod filters;
mod functions;
mod limit;
mod parse;
mod readonly;
mod schema;
mod star;

use crate::ast::collect_cte_aliases;
use crate::error::{GatewayError, Result};
use crate::manifest::Manifest;
use std::collections::BTreeSet;
use tracing::debug;

/// Per-call validation flags.
///
/// The defaults are what the LLM tool loop uses; the escape hatches exist
/// for out-of-band filter pipelines and administrative callers.
#[derive(Debug, Clone, Default)]
pub struct ValidateOptions {
    /// Disable user-filter injection (and its audit) entirely.
    pub skip_user_filter: bool,
    /// Real table names exempted from user-filter injection.
    pub skip_user_filter_tables: BTreeSet<String>,
    /// Also inject filters for `global` tables that declare a `user_key`.
    pub enforce_user_filter_on_global_tables: bool,
    /// Substitute this id for the calling user's in injected filters.
    pub override_user_id: Option<i64>,
    /// Row cap to apply instead of [`Gateway::MAX_LIMIT`].
    pub custom_limit: Option<u64>,
}

impl ValidateOptions {
    pub fn new() -> Self {
        Self::default()
    }
}

/// The SQL safety gateway.
///
/// Holds the immutable manifest for the process lifetime; each call is a
/// pure, self-contained CPU transformation, so a single `Gateway` may be
/// shared freely across threads.
#[derive(Debug, Clone)]
pub struct Gateway {
    manifest: Manifest,
    blocked_functions: BTreeSet<String>,
}

impl Gateway {
    /// Default cap applied to the top-level `LIMIT`.
    pub const MAX_LIMIT: u64 = 50;

    /// Build a gateway from a validated manifest.
    pub fn new(manifest: Manifest) -> Result<Self> {
        manifest.validate()?;
        let blocked_functions = manifest
            .blocked_functions
            .iter()
            .map(|f| f.to_lowercase())
            .collect();
        Ok(Self {
            manifest,
            blocked_functions,
        })
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Validate and rewrite `sql` for `current_user_id` with default options.
    pub fn validate_query(&self, sql: &str, current_user_id: i64) -> Result<String> {
        self.validate_query_with(sql, current_user_id, &ValidateOptions::default())
    }

    /// Validate and rewrite `sql`, returning the provably-safe equivalent.
    ///
    /// Returns the rewritten statement in the manifest's dialect, or the
    /// first policy violation encountered. Never returns on partial
    /// success: an error means no SQL should be executed.
    pub fn validate_query_with(
        &self,
        sql: &str,
        current_user_id: i64,
        options: &ValidateOptions,
    ) -> Result<String> {
        debug!(user_id = current_user_id, sql, "validating query");

        let mut statement = parse::parse_single_statement(sql, &self.manifest.dialect)?;

        readonly::enforce_read_only(&statement)?;
        functions::enforce_safe_functions(&statement, &self.blocked_functions)?;

        let cte_aliases = collect_cte_aliases(&statement);
        self.enforce_table_access(&statement, &cte_aliases)?;

        star::expand_select_star(&mut statement, &self.manifest, &cte_aliases);
        columns::enforce_column_access(&statement, &self.manifest, &cte_aliases)?;

        if !options.skip_user_filter {
            let user_id = options.override_user_id.unwrap_or(current_user_id);
            filters::inject_user_filters(
                &mut statement,
                &self.manifest,
                user_id,
                options,
                &cte_aliases,
            );
            // Last line of defence: a bug in stripping or injection must
            // surface here, before any SQL is emitted.
            filters::audit_user_filters(
                &statement,
                &self.manifest,
                user_id,
                options,
                &cte_aliases,
            )?;
        }

        limit::enforce_limit(&mut statement, options.custom_limit.unwrap_or(Self::MAX_LIMIT));
        schema::qualify_tables_with_schema(&mut statement, &self.manifest, &cte_aliases);

        let rewritten = statement.to_string();
        debug!(%rewritten, "query accepted");
        Ok(rewritten)
    }

    fn enforce_table_access(
        &self,
        statement: &sqlparser::ast::Statement,
        cte_aliases: &BTreeSet<String>,
    ) -> Result<()> {
        let tables = crate::ast::collect_real_tables(statement, cte_aliases);
        for table in tables {
            if !self.manifest.policy.contains_key(&table) {
                return Err(GatewayError::table_not_allowed(table));
            }
        }
        Ok(())
    }
}
