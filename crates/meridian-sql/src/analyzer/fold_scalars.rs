//! Scalar subquery folding.
//!
//! A subquery in a scalar context (inside a comparison, as a function
//! argument, in the SELECT list) is executed once and replaced by its literal
//! value. Execution lives outside this crate behind [`ScalarExecutor`]; the
//! folder drives it with a nesting depth counter and records every computed
//! value in the result's scalar map, keyed by the subquery's rendered SQL.
//! Equal subqueries therefore execute once and fold to the same value.
//!
//! Subqueries feeding the `IN` family are set-returning, not scalar, and are
//! left untouched; derived tables in FROM are a different node kind and never
//! reach the folder.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::expressions::{Expression, Literal, SelectQuery, TableExpression, Value};
use crate::traversal::for_each_select_slot_mut;

/// External executor for scalar subqueries.
///
/// `depth` is the nesting level of the subquery being executed; the executor
/// analyzes and runs the inner query with `depth` as its starting
/// `subquery_depth`. The returned value is a single scalar or a single-row
/// tuple.
pub trait ScalarExecutor {
    fn execute_scalar(&self, query: &SelectQuery, depth: u32) -> Result<Value>;
}

/// Fold every scalar subquery of `query` in place.
///
/// # Arguments
/// * `depth` - current subquery nesting level of `query` itself
/// * `max_depth` - the `max_subquery_depth` setting
/// * `executor` - the external executor; when absent, subqueries are left
///   unfolded and no scalars are recorded
/// * `scalars` - fingerprint-to-value map accumulated into the result
pub fn fold_scalar_subqueries(
    query: &mut SelectQuery,
    depth: u32,
    max_depth: u32,
    executor: Option<&dyn ScalarExecutor>,
    scalars: &mut HashMap<String, Value>,
) -> Result<()> {
    let Some(executor) = executor else {
        return Ok(());
    };
    fold_in_select(query, depth, max_depth, executor, scalars)
}

/// Fold scalar subqueries of a standalone expression tree.
pub fn fold_scalar_subqueries_expr(
    expr: &mut Expression,
    depth: u32,
    max_depth: u32,
    executor: Option<&dyn ScalarExecutor>,
    scalars: &mut HashMap<String, Value>,
) -> Result<()> {
    let Some(executor) = executor else {
        return Ok(());
    };
    fold_expr(expr, depth, max_depth, executor, scalars, false)
}

fn fold_in_select(
    query: &mut SelectQuery,
    depth: u32,
    max_depth: u32,
    executor: &dyn ScalarExecutor,
    scalars: &mut HashMap<String, Value>,
) -> Result<()> {
    for element in &mut query.tables {
        if let TableExpression::Subquery(subquery) = &mut element.table {
            fold_in_select(&mut subquery.query, depth, max_depth, executor, scalars)?;
        }
    }
    let mut failure = None;
    for_each_select_slot_mut(query, &mut |slot| {
        if failure.is_none() {
            failure = fold_expr(slot, depth, max_depth, executor, scalars, false).err();
        }
    });
    match failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn fold_expr(
    expr: &mut Expression,
    depth: u32,
    max_depth: u32,
    executor: &dyn ScalarExecutor,
    scalars: &mut HashMap<String, Value>,
    in_set_context: bool,
) -> Result<()> {
    if !in_set_context {
        fold_node(expr, depth, max_depth, executor, scalars)?;
    }
    if let Expression::Function(func) = expr {
        let set_arg = set_argument_position(&func.name);
        for (i, arg) in func.args.iter_mut().enumerate() {
            fold_expr(arg, depth, max_depth, executor, scalars, set_arg == Some(i))?;
        }
    }
    Ok(())
}

/// Replace the node when it is a subquery in a scalar position. Arguments of
/// the `IN` family are skipped by the callers.
fn fold_node(
    node: &mut Expression,
    depth: u32,
    max_depth: u32,
    executor: &dyn ScalarExecutor,
    scalars: &mut HashMap<String, Value>,
) -> Result<()> {
    if !matches!(node, Expression::Subquery(_)) {
        return Ok(());
    }
    let Expression::Subquery(subquery) = node else {
        unreachable!()
    };
    if depth + 1 > max_depth {
        return Err(Error::TooDeepAst {
            max: max_depth as usize,
            query: subquery.query.to_string(),
        });
    }

    let fingerprint = subquery.query.to_string();
    let value = match scalars.get(&fingerprint) {
        Some(known) => known.clone(),
        None => {
            let computed = executor.execute_scalar(&subquery.query, depth + 1)?;
            scalars.insert(fingerprint, computed.clone());
            computed
        }
    };
    let alias = subquery.alias.clone();
    *node = Expression::Literal(Literal { value, alias });
    Ok(())
}

fn set_argument_position(function_name: &str) -> Option<usize> {
    match function_name {
        "in" | "notIn" | "globalIn" | "globalNotIn" => Some(1),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::*;
    use std::cell::Cell;

    struct FixedExecutor {
        value: Value,
        calls: Cell<usize>,
    }

    impl FixedExecutor {
        fn new(value: Value) -> Self {
            Self {
                value,
                calls: Cell::new(0),
            }
        }
    }

    impl ScalarExecutor for FixedExecutor {
        fn execute_scalar(&self, _query: &SelectQuery, _depth: u32) -> Result<Value> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.value.clone())
        }
    }

    fn scalar_one() -> SelectQuery {
        select(vec![lit(1u64)]).build()
    }

    #[test]
    fn test_scalar_subquery_becomes_literal() {
        let executor = FixedExecutor::new(Value::UInt64(1));
        let mut query = select(vec![func("plus", vec![subquery(scalar_one()), col("x")])])
            .from("t")
            .build();
        let mut scalars = HashMap::new();
        fold_scalar_subqueries(&mut query, 0, 100, Some(&executor), &mut scalars).unwrap();
        assert_eq!(query.select[0].column_name(), "plus(1, x)");
        assert_eq!(scalars.len(), 1);
    }

    #[test]
    fn test_equal_subqueries_execute_once() {
        let executor = FixedExecutor::new(Value::UInt64(1));
        let mut query = select(vec![subquery(scalar_one()), subquery(scalar_one())])
            .from("t")
            .build();
        let mut scalars = HashMap::new();
        fold_scalar_subqueries(&mut query, 0, 100, Some(&executor), &mut scalars).unwrap();
        assert_eq!(executor.calls.get(), 1);
    }

    #[test]
    fn test_in_subquery_is_untouched() {
        let executor = FixedExecutor::new(Value::UInt64(1));
        let mut query = select(vec![col("x")])
            .from("t")
            .where_(func("in", vec![col("x"), subquery(scalar_one())]))
            .build();
        let mut scalars = HashMap::new();
        // fold only the expression positions; IN's right argument is a set
        let mut where_clause = query.where_clause.take().unwrap();
        fold_expr(&mut where_clause, 0, 100, &executor, &mut scalars, false).unwrap();
        let in_func = where_clause.as_function().unwrap();
        assert!(matches!(in_func.args[1], Expression::Subquery(_)));
        assert_eq!(executor.calls.get(), 0);
    }

    #[test]
    fn test_folded_literal_keeps_alias() {
        let executor = FixedExecutor::new(Value::UInt64(7));
        let mut query = select(vec![aliased(subquery(scalar_one()), "total")]).build();
        let mut scalars = HashMap::new();
        fold_scalar_subqueries(&mut query, 0, 100, Some(&executor), &mut scalars).unwrap();
        assert_eq!(query.select[0].alias_or_column_name(), "total");
        assert!(query.select[0].is_literal());
    }

    #[test]
    fn test_depth_limit() {
        let executor = FixedExecutor::new(Value::UInt64(1));
        let mut query = select(vec![subquery(scalar_one())]).build();
        let mut scalars = HashMap::new();
        let err =
            fold_scalar_subqueries(&mut query, 5, 5, Some(&executor), &mut scalars).unwrap_err();
        assert!(matches!(err, Error::TooDeepAst { .. }));
    }

    #[test]
    fn test_missing_executor_leaves_subqueries() {
        let mut query = select(vec![subquery(scalar_one())]).build();
        let mut scalars = HashMap::new();
        fold_scalar_subqueries(&mut query, 0, 100, None, &mut scalars).unwrap();
        assert!(matches!(query.select[0], Expression::Subquery(_)));
    }

    #[test]
    fn test_tuple_value_folds_to_tuple_literal() {
        let executor = FixedExecutor::new(Value::Tuple(vec![
            Value::UInt64(1),
            Value::String("a".into()),
        ]));
        let mut query = select(vec![subquery(scalar_one())]).build();
        let mut scalars = HashMap::new();
        fold_scalar_subqueries(&mut query, 0, 100, Some(&executor), &mut scalars).unwrap();
        assert_eq!(query.select[0].column_name(), "(1, 'a')");
    }
}
