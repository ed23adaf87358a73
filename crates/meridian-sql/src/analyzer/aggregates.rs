//! Aggregate function collection.
//!
//! Enumerates every aggregate call of the query for the planner, and rejects
//! the two placements where aggregation cannot happen: under WHERE/PREWHERE
//! (filters run before aggregation) and nested inside another aggregate.
//! Subquery bodies are separate aggregation scopes and are not visited.

use crate::error::{Error, Result};
use crate::expressions::{Expression, Function, SelectQuery};
use crate::functions::FunctionRegistry;
use crate::traversal::{walk_expr, walk_select};

/// Fail if any aggregate call occurs in the expression. `place` names the
/// clause for the error message.
pub fn assert_no_aggregates(
    expr: &Expression,
    place: &str,
    functions: &FunctionRegistry,
    query_text: &str,
) -> Result<()> {
    let mut offender: Option<String> = None;
    walk_expr(expr, false, &mut |node| {
        if offender.is_none() {
            if let Some(func) = node.as_function() {
                if functions.is_aggregate(&func.name) {
                    offender = Some(func.name.clone());
                }
            }
        }
    });
    match offender {
        Some(name) => Err(Error::illegal_aggregation(name, place, query_text)),
        None => Ok(()),
    }
}

/// Collect every aggregate call of the query, in traversal order.
///
/// # Errors
/// [`Error::IllegalAggregation`] for an aggregate under WHERE or PREWHERE,
/// or for an aggregate nested inside another aggregate's arguments.
pub fn collect_aggregates(
    query: &SelectQuery,
    functions: &FunctionRegistry,
) -> Result<Vec<Function>> {
    let query_text = query.to_string();

    if let Some(where_clause) = &query.where_clause {
        assert_no_aggregates(where_clause, "in WHERE", functions, &query_text)?;
    }
    if let Some(prewhere) = &query.prewhere {
        assert_no_aggregates(prewhere, "in PREWHERE", functions, &query_text)?;
    }

    let mut aggregates = Vec::new();
    walk_select(query, false, &mut |node| {
        if let Some(func) = node.as_function() {
            if functions.is_aggregate(&func.name) {
                aggregates.push(func.clone());
            }
        }
    });

    for aggregate in &aggregates {
        for arg in &aggregate.args {
            assert_no_aggregates(arg, "inside another aggregate function", functions, &query_text)?;
        }
    }
    Ok(aggregates)
}
