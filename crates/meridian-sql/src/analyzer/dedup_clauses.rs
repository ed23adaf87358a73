//! Clause deduplication and cross-query clause removal.
//!
//! The small dedups keep the first occurrence and drop later duplicates:
//!
//! - `ORDER BY` -- two elements are equal iff both the expression's column
//!   name and the collation name match; a missing collation compares as the
//!   empty string.
//! - `LIMIT BY` -- by column name.
//! - `USING` -- by alias-or-column name.
//!
//! Two passes look across query boundaries:
//!
//! - **Duplicate ORDER BY removal** drops `ORDER BY` from subqueries where
//!   it has no observable effect: the outer query reorders (or regroups)
//!   anyway and the subquery has no `LIMIT`-family clause pinning its row
//!   set. Stateful functions in the outer select list make row order
//!   observable, so they block the rewrite, as does a query-level SETTINGS
//!   tail.
//! - **Duplicate DISTINCT removal** drops the outer `DISTINCT` of
//!   `SELECT DISTINCT ... FROM (SELECT DISTINCT ...)` when both projection
//!   signatures are equal.

use std::collections::HashSet;

use crate::expressions::{Expression, SelectQuery, TableExpression};
use crate::functions::FunctionRegistry;
use crate::traversal::walk_subqueries_post_mut;

/// Remove duplicate elements from ORDER BY; first occurrence wins.
pub fn optimize_order_by(query: &mut SelectQuery) {
    let Some(elements) = &mut query.order_by else {
        return;
    };
    let mut seen: HashSet<(String, String)> = HashSet::new();
    elements.retain(|element| {
        let key = (
            element.expr.column_name(),
            element.collation.clone().unwrap_or_default(),
        );
        seen.insert(key)
    });
}

/// Remove duplicate expressions from LIMIT BY; first occurrence wins.
pub fn optimize_limit_by(query: &mut SelectQuery) {
    let Some(limit_by) = &mut query.limit_by else {
        return;
    };
    let mut seen: HashSet<String> = HashSet::new();
    limit_by
        .expressions
        .retain(|expr| seen.insert(expr.column_name()));
}

/// Remove duplicate keys from JOIN USING; first occurrence wins.
pub fn optimize_using(query: &mut SelectQuery) {
    let Some(element) = query.join_element_mut() else {
        return;
    };
    let Some(join) = &mut element.join else {
        return;
    };
    let Some(keys) = &mut join.using_keys else {
        return;
    };
    let mut seen: HashSet<String> = HashSet::new();
    keys.retain(|key| seen.insert(key.alias_or_column_name()));
}

/// Drop ORDER BY from subqueries whose ordering the outer query discards.
/// Processes the tree post-order so inner subqueries are handled first.
pub fn optimize_duplicate_order_by(query: &mut SelectQuery, functions: &FunctionRegistry) {
    walk_subqueries_post_mut(query, &mut |select| {
        if select.has_settings() {
            return;
        }
        if select.order_by.is_none() && select.group_by.is_none() {
            return;
        }
        if select
            .select
            .iter()
            .any(|expr| contains_stateful_function(expr, functions))
        {
            return;
        }
        for element in &mut select.tables {
            if let TableExpression::Subquery(subquery) = &mut element.table {
                let inner = &mut subquery.query;
                if inner.order_by.is_some() && inner.limit_by.is_none() && inner.limit.is_none() {
                    inner.order_by = None;
                }
            }
        }
    });
}

fn contains_stateful_function(expr: &Expression, functions: &FunctionRegistry) -> bool {
    let Some(func) = expr.as_function() else {
        return false;
    };
    if functions.is_stateful(&func.name) {
        return true;
    }
    func.args
        .iter()
        .any(|arg| contains_stateful_function(arg, functions))
}

/// Drop a DISTINCT that repeats the DISTINCT of its derived table with the
/// same projection signature.
pub fn optimize_duplicate_distinct(query: &mut SelectQuery) {
    let mut state = DistinctState::default();
    walk_subqueries_post_mut(query, &mut |select| {
        dedup_distinct_step(select, &mut state);
    });
}

#[derive(Default)]
struct DistinctState {
    is_distinct: bool,
    last_ids: Vec<String>,
}

fn dedup_distinct_step(select: &mut SelectQuery, state: &mut DistinctState) {
    if select.has_settings() {
        state.is_distinct = false;
        state.last_ids = Vec::new();
        return;
    }
    if !select.distinct {
        return;
    }

    let mut current_ids = Vec::with_capacity(select.select.len() + 1);
    if matches!(
        select.select.first(),
        Some(Expression::Asterisk | Expression::QualifiedAsterisk(_))
    ) {
        if let Some(table) = select.first_table() {
            current_ids.push(table.to_string());
        }
    }
    current_ids.extend(select.select.iter().map(Expression::column_name));

    if state.is_distinct && current_ids == state.last_ids {
        select.distinct = false;
    }

    state.is_distinct = true;
    state.last_ids = current_ids;
}
