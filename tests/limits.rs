mod common;
use common::*;

use sqlgate::prelude::*;

#[test]
fn limit_injected_when_absent() {
    let rewritten = gateway()
        .validate_query("SELECT employee.first_name FROM employee", USER_ID)
        .unwrap();
    assert!(rewritten.ends_with("LIMIT 50"));
}

#[test]
fn oversized_limit_lowered_to_cap() {
    // The cap applies even when the LIMIT sits on a CTE consumer.
    let rewritten = gateway()
        .validate_query(
            "WITH t AS (SELECT e.id FROM employee AS e WHERE e.first_name = 'X') \
             SELECT t.id FROM t LIMIT 999999",
            USER_ID,
        )
        .unwrap();
    assert!(rewritten.contains("e.id = 456"));
    assert!(rewritten.ends_with("LIMIT 50"));
    assert!(!rewritten.contains("999999"));
}

#[test]
fn small_limit_kept() {
    let rewritten = gateway()
        .validate_query("SELECT d.dept_name FROM department AS d LIMIT 5", USER_ID)
        .unwrap();
    assert!(rewritten.ends_with("LIMIT 5"));
}

#[test]
fn custom_limit_respected() {
    let options = ValidateOptions {
        custom_limit: Some(10),
        ..Default::default()
    };
    let rewritten = gateway()
        .validate_query_with(
            "SELECT d.dept_name FROM department AS d LIMIT 200",
            USER_ID,
            &options,
        )
        .unwrap();
    assert!(rewritten.ends_with("LIMIT 10"));
}

#[test]
fn custom_limit_applies_when_absent_too() {
    let options = ValidateOptions {
        custom_limit: Some(75),
        ..Default::default()
    };
    let rewritten = gateway()
        .validate_query_with("SELECT d.dept_name FROM department AS d", USER_ID, &options)
        .unwrap();
    assert!(rewritten.ends_with("LIMIT 75"));
}
