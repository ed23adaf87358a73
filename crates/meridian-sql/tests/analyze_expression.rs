//! End-to-end tests for non-SELECT expression analysis
//! (column defaults, TTL and index expressions).

use std::sync::Arc;

use meridian_sql::builder::*;
use meridian_sql::{
    Analyzer, Column, DataType, Error, Expression, ScalarExecutor, SelectQuery, Settings,
    TableStorage, Value,
};

fn columns() -> Vec<Column> {
    vec![
        Column::new("x", DataType::UInt64),
        Column::new("y", DataType::UInt64),
    ]
}

#[test]
fn expression_analysis_collects_required_columns() {
    let mut expr = func("plus", vec![col("x"), func("negate", vec![col("y")])]);
    let result = Analyzer::new(Settings::default())
        .analyze(&mut expr, columns(), None)
        .unwrap();
    let names: Vec<&str> = result
        .required_source_columns
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(names, vec!["x", "y"]);
    assert!(!result.maybe_optimize_trivial_count);
}

#[test]
fn expression_aliases_are_substituted() {
    let mut expr = func(
        "plus",
        vec![aliased(func("negate", vec![col("x")]), "n"), col("n")],
    );
    Analyzer::new(Settings::default())
        .analyze(&mut expr, columns(), None)
        .unwrap();
    assert_eq!(expr.column_name(), "plus(negate(x), negate(x))");
}

#[test]
fn scalar_subquery_in_default_expression_folds() {
    struct FortyTwo;
    impl ScalarExecutor for FortyTwo {
        fn execute_scalar(
            &self,
            _query: &SelectQuery,
            _depth: u32,
        ) -> meridian_sql::Result<Value> {
            Ok(Value::UInt64(42))
        }
    }
    let scalar = select(vec![lit(42u64)]).build();
    let mut expr = func("plus", vec![col("x"), subquery(scalar)]);
    let result = Analyzer::new(Settings::default())
        .with_scalar_executor(Box::new(FortyTwo))
        .analyze(&mut expr, columns(), None)
        .unwrap();
    assert_eq!(expr.column_name(), "plus(x, 42)");
    assert_eq!(result.scalars.len(), 1);
}

#[test]
fn aggregates_are_rejected_anywhere() {
    let mut expr = func("plus", vec![func("sum", vec![col("x")]), lit(1u64)]);
    let err = Analyzer::new(Settings::default())
        .analyze(&mut expr, columns(), None)
        .unwrap_err();
    assert!(matches!(err, Error::IllegalAggregation { .. }));
    assert!(err.to_string().contains("in wrong place"));
}

#[test]
fn unknown_column_in_expression_fails() {
    let mut expr = func("negate", vec![col("ghost")]);
    let err = Analyzer::new(Settings::default())
        .analyze(&mut expr, columns(), None)
        .unwrap_err();
    assert!(matches!(err, Error::UnknownIdentifier { .. }));
}

#[test]
fn storage_columns_seed_the_expression_scope() {
    let storage = TableStorage::new(vec![Column::new("stored", DataType::UInt64)]);
    let mut expr = func("negate", vec![col("stored")]);
    let result = Analyzer::new(Settings::default())
        .analyze(&mut expr, vec![], Some(Arc::new(storage)))
        .unwrap();
    let names: Vec<&str> = result
        .required_source_columns
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(names, vec!["stored"]);
}

#[test]
fn constant_if_folds_in_expression_trees() {
    let mut expr = func("if", vec![lit(0u64), col("x"), col("y")]);
    let result = Analyzer::new(Settings::default())
        .analyze(&mut expr, columns(), None)
        .unwrap();
    assert_eq!(expr.column_name(), "y");
    let names: Vec<&str> = result
        .required_source_columns
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(names, vec!["y"]);
}

#[test]
fn count_distinct_is_customized_in_expression_trees() {
    let mut expr: Expression = func("countDistinct", vec![col("x")]);
    // aggregate collection rejects it afterwards, so only check the rename
    let err = Analyzer::new(Settings::default())
        .analyze(&mut expr, columns(), None)
        .unwrap_err();
    assert!(err.to_string().contains("uniqExact"));
}
