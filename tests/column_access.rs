mod common;
use common::*;

use sqlgate::prelude::*;

#[test]
fn disallowed_column_rejected() {
    let err = gateway()
        .validate_query("SELECT employee.salary FROM employee", USER_ID)
        .unwrap_err();
    assert!(matches!(
        err,
        GatewayError::ColumnNotAllowed { column, table, .. }
            if column == "salary" && table == "employee"
    ));
}

#[test]
fn disallowed_column_via_alias_rejected() {
    let err = gateway()
        .validate_query("SELECT e.salary FROM employee AS e", USER_ID)
        .unwrap_err();
    match err {
        GatewayError::ColumnNotAllowed {
            column,
            table,
            via_alias,
        } => {
            assert_eq!(column, "salary");
            assert_eq!(table, "employee");
            assert_eq!(via_alias.as_deref(), Some("e"));
        }
        other => panic!("expected ColumnNotAllowed, got {other}"),
    }
}

#[test]
fn allowed_columns_via_alias_pass() {
    let result = gateway()
        .validate_query("SELECT e.first_name, e.last_name FROM employee AS e", USER_ID)
        .unwrap();
    assert!(result.contains("e.id = 456"));
}

#[test]
fn disallowed_column_inside_cte_rejected() {
    let err = gateway()
        .validate_query(
            "WITH emp AS (SELECT e.id, e.salary FROM employee AS e) SELECT emp.id FROM emp",
            USER_ID,
        )
        .unwrap_err();
    assert!(matches!(err, GatewayError::ColumnNotAllowed { column, .. } if column == "salary"));
}

#[test]
fn cte_qualified_columns_skip_policy_check() {
    // `t.id` names the CTE projection, which was validated inside the body.
    let result = gateway()
        .validate_query(
            "WITH t AS (SELECT e.id FROM employee AS e) SELECT t.id FROM t",
            USER_ID,
        )
        .unwrap();
    assert!(result.contains("t.id"));
}

#[test]
fn unqualified_column_in_where_rejected_as_ambiguous() {
    let err = gateway()
        .validate_query(
            "SELECT employee.first_name FROM employee WHERE id = 999",
            USER_ID,
        )
        .unwrap_err();
    match err {
        GatewayError::AmbiguousColumn { column, candidates } => {
            assert_eq!(column, "id");
            assert_eq!(candidates, vec!["employee".to_string()]);
        }
        other => panic!("expected AmbiguousColumn, got {other}"),
    }
}

#[test]
fn unqualified_projection_allowed() {
    // Unqualified names are only dangerous in filtering positions.
    let result = gateway()
        .validate_query("SELECT first_name FROM employee", USER_ID)
        .unwrap();
    assert!(result.contains("first_name"));
}

#[test]
fn unqualified_column_in_join_on_rejected() {
    let err = gateway()
        .validate_query(
            "SELECT e.first_name FROM employee AS e \
             JOIN salary AS s ON employee_id = e.id",
            USER_ID,
        )
        .unwrap_err();
    assert!(matches!(err, GatewayError::AmbiguousColumn { column, .. } if column == "employee_id"));
}

#[test]
fn unqualified_column_unrelated_to_user_scope_allowed() {
    // dept_name belongs only to a global table; the database can resolve it.
    let result = gateway()
        .validate_query(
            "SELECT d.id FROM department AS d WHERE dept_name = 'Research'",
            USER_ID,
        )
        .unwrap();
    assert!(result.contains("dept_name = 'Research'"));
}

#[test]
fn qualified_columns_in_join_pass() {
    let result = gateway()
        .validate_query(
            "SELECT e.first_name, d.dept_name \
             FROM employee AS e \
             JOIN department_employee AS de ON de.employee_id = e.id \
             JOIN department AS d ON d.id = de.department_id",
            USER_ID,
        )
        .unwrap();
    assert!(result.contains("e.id = 456"));
}

#[test]
fn unresolvable_qualifier_left_to_database() {
    // `x` resolves to nothing here; the gateway cannot check it and the
    // database will reject it instead.
    let err = gateway().validate_query("SELECT x.mystery FROM employee", USER_ID);
    assert!(err.is_ok());
}
