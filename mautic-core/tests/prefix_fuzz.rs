#![cfg(feature = "sqlite")]

use mautic_core::catalog::{self, PREFIX_TOKEN, QueryContext, QueryTemplate};
use mautic_core::config::validate_table_prefix;
use mautic_core::dialect::SqlDialect;
use proptest::prelude::*;
use proptest::strategy::ValueTree;
use proptest::test_runner::{Config, TestRunner};

fn safe_prefix_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_$]{0,16}".prop_map(|s| s)
}

fn hostile_prefix_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_]{0,8}[ ;'`\"\\-()*/.]{1,4}[A-Za-z0-9_ ]{0,8}".prop_map(|s| s)
}

#[test]
fn safe_prefixes_are_accepted_and_rendered_verbatim() {
    let mut runner = TestRunner::new(Config {
        cases: 128,
        failure_persistence: None,
        ..Config::default()
    });

    let prefix = safe_prefix_strategy();
    for _ in 0..128 {
        let prefix = prefix.new_tree(&mut runner).unwrap().current();
        assert!(validate_table_prefix(&prefix).is_ok(), "{:?}", prefix);

        let ctx = QueryContext {
            schema: "mautic",
            table_prefix: &prefix,
        };
        for entry in catalog::catalog() {
            if let QueryTemplate::Sql(template) = entry.query {
                let sql = entry.query.render::<sqlx::Sqlite>(&ctx);
                assert!(!sql.contains(PREFIX_TOKEN));
                assert_eq!(sql, template.replace(PREFIX_TOKEN, &prefix));
            }
        }
    }
}

#[test]
fn prefixes_with_sql_punctuation_are_rejected() {
    let mut runner = TestRunner::new(Config {
        cases: 128,
        failure_persistence: None,
        ..Config::default()
    });

    let prefix = hostile_prefix_strategy();
    for _ in 0..128 {
        let prefix = prefix.new_tree(&mut runner).unwrap().current();
        assert!(validate_table_prefix(&prefix).is_err(), "{:?}", prefix);
    }
}

proptest! {
    #[test]
    fn quoted_literals_never_end_early(value in "\\PC{0,24}") {
        let quoted = <sqlx::Sqlite as SqlDialect>::quote_literal(&value);
        let inner = &quoted[1..quoted.len() - 1];
        // Every quote inside the literal is doubled.
        prop_assert_eq!(inner.matches('\'').count() % 2, 0);
        prop_assert_eq!(inner.replace("''", "'"), value);
    }
}
