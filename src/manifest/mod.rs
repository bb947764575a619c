//! Gateway configuration: per-table access policies and the database
//! manifest loaded from a trusted JSON file at process start.

use crate::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use sqlparser::dialect::dialect_from_str;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// Visibility scope of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// All rows are visible to every caller.
    Global,
    /// Only rows owned by the calling user are visible; `user_key` names
    /// the owning-user column.
    User,
}

/// Access policy for a single real table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TablePolicy {
    pub scope: Scope,
    /// Columns the caller may read. Kept sorted so star expansion and
    /// error reporting are deterministic.
    pub allowed_columns: BTreeSet<String>,
    /// Column holding the owning user's id. Required when `scope` is
    /// [`Scope::User`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_key: Option<String>,
}

/// The configuration handed to the gateway at construction time.
///
/// Created once from a trusted file and held immutable for the process
/// lifetime; `connection_params` is opaque to the gateway and carried only
/// so embedding applications can share a single manifest file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Logical database identifier.
    pub database: String,
    /// Parser dialect tag (e.g. "postgres", "mssql").
    pub dialect: String,
    /// Optional schema used to qualify unqualified table references at
    /// emission time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_schema: Option<String>,
    /// Real table name -> access policy.
    pub policy: BTreeMap<String, TablePolicy>,
    /// Function names that must not appear anywhere in a query.
    pub blocked_functions: BTreeSet<String>,
    /// Opaque connection settings for the executing layer.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub connection_params: serde_json::Value,
}

impl Manifest {
    /// Load and validate a manifest from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            GatewayError::invalid_manifest(format!("failed to read {}: {e}", path.display()))
        })?;
        let manifest: Manifest = serde_json::from_str(&content)
            .map_err(|e| GatewayError::invalid_manifest(format!("{}: {e}", path.display())))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Check the structural constraints the validation passes rely on.
    ///
    /// Every user-scoped policy must name a `user_key` that is itself an
    /// allowed column, so the injected predicate never trips the column
    /// whitelist of a re-validated query.
    pub fn validate(&self) -> Result<()> {
        if dialect_from_str(&self.dialect).is_none() {
            return Err(GatewayError::UnknownDialect {
                dialect: self.dialect.clone(),
            });
        }

        for (table, policy) in &self.policy {
            match (&policy.scope, &policy.user_key) {
                (Scope::User, None) => {
                    return Err(GatewayError::invalid_manifest(format!(
                        "user-scoped table '{table}' has no user_key"
                    )));
                }
                (Scope::User, Some(key)) if !policy.allowed_columns.contains(key) => {
                    return Err(GatewayError::invalid_manifest(format!(
                        "user_key '{key}' of table '{table}' is not in its allowed_columns"
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Tables whose rows are filtered to the calling user.
    pub fn user_scoped_tables(&self) -> impl Iterator<Item = (&String, &TablePolicy)> + '_ {
        self.policy.iter().filter(|(_, p)| p.scope == Scope::User)
    }

    /// Render a human-readable summary of table access scopes, suitable for
    /// embedding in an agent system prompt.
    pub fn scope_summary(&self) -> String {
        let mut user_tables = Vec::new();
        let mut global_tables = Vec::new();
        for (name, policy) in &self.policy {
            match policy.scope {
                Scope::User => {
                    let key = policy.user_key.as_deref().unwrap_or("?");
                    user_tables.push(format!("{name} (scoped by `{key}`)"));
                }
                Scope::Global => global_tables.push(name.clone()),
            }
        }

        let mut out = String::from("### Table Access Scopes\n\n");
        if !user_tables.is_empty() {
            out.push_str("**USER-scoped tables** (you can only see the current user's rows):\n");
            for t in &user_tables {
                let _ = writeln!(out, "  - {t}");
            }
            out.push('\n');
        }
        if !global_tables.is_empty() {
            out.push_str("**GLOBAL tables** (all rows are visible):\n");
            for t in &global_tables {
                let _ = writeln!(out, "  - {t}");
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_policy(key: &str, columns: &[&str]) -> TablePolicy {
        TablePolicy {
            scope: Scope::User,
            allowed_columns: columns.iter().map(|c| c.to_string()).collect(),
            user_key: Some(key.to_string()),
        }
    }

    fn manifest_with(policy: BTreeMap<String, TablePolicy>) -> Manifest {
        Manifest {
            database: "employees".into(),
            dialect: "postgres".into(),
            default_schema: None,
            policy,
            blocked_functions: BTreeSet::new(),
            connection_params: serde_json::Value::Null,
        }
    }

    #[test]
    fn user_scoped_table_requires_user_key() {
        let mut policy = BTreeMap::new();
        policy.insert(
            "employee".to_string(),
            TablePolicy {
                scope: Scope::User,
                allowed_columns: ["id".to_string()].into(),
                user_key: None,
            },
        );
        let err = manifest_with(policy).validate().unwrap_err();
        assert!(err.to_string().contains("no user_key"));
    }

    #[test]
    fn user_key_must_be_an_allowed_column() {
        let mut policy = BTreeMap::new();
        policy.insert("employee".to_string(), user_policy("owner_id", &["id"]));
        let err = manifest_with(policy).validate().unwrap_err();
        assert!(err.to_string().contains("owner_id"));
    }

    #[test]
    fn unknown_dialect_rejected() {
        let mut manifest = manifest_with(BTreeMap::new());
        manifest.dialect = "oracle9i".into();
        assert!(matches!(
            manifest.validate(),
            Err(GatewayError::UnknownDialect { .. })
        ));
    }

    #[test]
    fn scope_summary_lists_both_scopes() {
        let mut policy = BTreeMap::new();
        policy.insert("employee".to_string(), user_policy("id", &["id"]));
        policy.insert(
            "department".to_string(),
            TablePolicy {
                scope: Scope::Global,
                allowed_columns: ["id".to_string(), "dept_name".to_string()].into(),
                user_key: None,
            },
        );
        let summary = manifest_with(policy).scope_summary();
        assert!(summary.contains("employee (scoped by `id`)"));
        assert!(summary.contains("- department"));
    }
}
