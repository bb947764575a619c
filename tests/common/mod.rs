//! Shared fixture: the employees-domain manifest used across the
//! integration suites.

#![allow(dead_code)]

use sqlgate::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

pub const USER_ID: i64 = 456;

pub fn table_policy(scope: Scope, user_key: Option<&str>, columns: &[&str]) -> TablePolicy {
    TablePolicy {
        scope,
        allowed_columns: columns.iter().map(|c| c.to_string()).collect(),
        user_key: user_key.map(str::to_string),
    }
}

pub fn blocked_functions() -> BTreeSet<String> {
    [
        "pg_sleep",
        "pg_cancel_backend",
        "pg_terminate_backend",
        "pg_read_file",
        "pg_read_binary_file",
        "pg_ls_dir",
        "pg_ls_logdir",
        "pg_ls_waldir",
        "pg_stat_file",
        "lo_import",
        "lo_export",
        "pg_advisory_lock",
        "pg_advisory_xact_lock",
        "dblink",
        "dblink_exec",
        "dblink_connect",
        "query_to_xml",
        "query_to_xml_and_xmlschema",
        "cursor_to_xml",
        "table_to_xml",
        "set_config",
        "pg_reload_conf",
        "pg_rotate_logfile",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

pub fn manifest() -> Manifest {
    let mut policy = BTreeMap::new();
    policy.insert(
        "employee".to_string(),
        table_policy(
            Scope::User,
            Some("id"),
            &["id", "first_name", "last_name", "birth_date", "gender", "hire_date"],
        ),
    );
    policy.insert(
        "department".to_string(),
        table_policy(Scope::Global, None, &["id", "dept_name"]),
    );
    policy.insert(
        "department_employee".to_string(),
        table_policy(
            Scope::Global,
            Some("employee_id"),
            &["department_id", "employee_id", "from_date", "to_date"],
        ),
    );
    policy.insert(
        "department_manager".to_string(),
        table_policy(
            Scope::Global,
            None,
            &["department_id", "employee_id", "from_date", "to_date"],
        ),
    );
    policy.insert(
        "title".to_string(),
        table_policy(
            Scope::Global,
            None,
            &["employee_id", "title", "from_date", "to_date"],
        ),
    );
    policy.insert(
        "salary".to_string(),
        table_policy(
            Scope::User,
            Some("employee_id"),
            &["employee_id", "amount", "from_date", "to_date"],
        ),
    );

    Manifest {
        database: "employees".to_string(),
        dialect: "postgres".to_string(),
        default_schema: None,
        policy,
        blocked_functions: blocked_functions(),
        connection_params: serde_json::Value::Null,
    }
}

pub fn gateway() -> Gateway {
    Gateway::new(manifest()).unwrap()
}

pub fn gateway_with_schema(schema: &str) -> Gateway {
    let mut manifest = manifest();
    manifest.default_schema = Some(schema.to_string());
    Gateway::new(manifest).unwrap()
}
