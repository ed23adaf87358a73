//! Tree traversal utilities for the expression AST.
//!
//! All analyzer passes are built on a small set of walkers:
//!
//! - [`walk_expr`] / [`walk_expr_mut`] -- pre-order traversal of one
//!   expression tree. The mutating variant visits a node *before* its
//!   children, so a visitor that replaces a node has its replacement's
//!   children visited next.
//! - [`walk_select`] / [`walk_select_mut`] -- visit every expression position
//!   of a [`SelectQuery`] in clause order, recursing with the expression
//!   walkers.
//!
//! Every walker takes an `enter_subqueries` flag deciding whether traversal
//! descends into SELECT bodies (scalar subqueries and derived tables). Passes
//! that reason about a single query scope (aggregate checks, required-column
//! accounting) keep it off; whole-tree rewrites (normalization, IF folding)
//! turn it on.
//!
//! Traversal is O(n) in the number of nodes with bounded per-node work, and
//! re-entrant: walkers hold no state beyond the borrowed closure.

use crate::expressions::{Expression, SelectQuery, TableExpression};

/// Pre-order walk of an expression tree.
pub fn walk_expr(expr: &Expression, enter_subqueries: bool, f: &mut dyn FnMut(&Expression)) {
    f(expr);
    match expr {
        Expression::Function(func) => {
            for arg in &func.args {
                walk_expr(arg, enter_subqueries, f);
            }
        }
        Expression::Subquery(subquery) if enter_subqueries => {
            walk_select(&subquery.query, enter_subqueries, f);
        }
        _ => {}
    }
}

/// Pre-order walk of an expression tree with in-place mutation. The visitor
/// may replace the node it is handed; children of the replacement are
/// visited afterwards.
pub fn walk_expr_mut(
    expr: &mut Expression,
    enter_subqueries: bool,
    f: &mut dyn FnMut(&mut Expression),
) {
    f(expr);
    match expr {
        Expression::Function(func) => {
            for arg in &mut func.args {
                walk_expr_mut(arg, enter_subqueries, f);
            }
        }
        Expression::Subquery(subquery) if enter_subqueries => {
            walk_select_mut(&mut subquery.query, enter_subqueries, f);
        }
        _ => {}
    }
}

/// Visit every expression position of a SELECT in clause order.
pub fn walk_select(query: &SelectQuery, enter_subqueries: bool, f: &mut dyn FnMut(&Expression)) {
    for expr in &query.select {
        walk_expr(expr, enter_subqueries, f);
    }
    for element in &query.tables {
        match &element.table {
            TableExpression::Subquery(subquery) if enter_subqueries => {
                walk_select(&subquery.query, enter_subqueries, f);
            }
            TableExpression::TableFunction(tf) => {
                for arg in &tf.function.args {
                    walk_expr(arg, enter_subqueries, f);
                }
            }
            _ => {}
        }
        if let Some(join) = &element.join {
            if let Some(keys) = &join.using_keys {
                for key in keys {
                    walk_expr(key, enter_subqueries, f);
                }
            }
            if let Some(on) = &join.on {
                walk_expr(on, enter_subqueries, f);
            }
        }
    }
    if let Some(array_join) = &query.array_join {
        for expr in &array_join.expressions {
            walk_expr(expr, enter_subqueries, f);
        }
    }
    if let Some(prewhere) = &query.prewhere {
        walk_expr(prewhere, enter_subqueries, f);
    }
    if let Some(where_clause) = &query.where_clause {
        walk_expr(where_clause, enter_subqueries, f);
    }
    if let Some(group_by) = &query.group_by {
        for key in group_by {
            walk_expr(key, enter_subqueries, f);
        }
    }
    if let Some(having) = &query.having {
        walk_expr(having, enter_subqueries, f);
    }
    if let Some(order_by) = &query.order_by {
        for element in order_by {
            walk_expr(&element.expr, enter_subqueries, f);
        }
    }
    if let Some(limit_by) = &query.limit_by {
        for expr in &limit_by.expressions {
            walk_expr(expr, enter_subqueries, f);
        }
    }
}

/// Mutating counterpart of [`walk_select`].
pub fn walk_select_mut(
    query: &mut SelectQuery,
    enter_subqueries: bool,
    f: &mut dyn FnMut(&mut Expression),
) {
    for expr in &mut query.select {
        walk_expr_mut(expr, enter_subqueries, f);
    }
    for element in &mut query.tables {
        match &mut element.table {
            TableExpression::Subquery(subquery) if enter_subqueries => {
                walk_select_mut(&mut subquery.query, enter_subqueries, f);
            }
            TableExpression::TableFunction(tf) => {
                for arg in &mut tf.function.args {
                    walk_expr_mut(arg, enter_subqueries, f);
                }
            }
            _ => {}
        }
        if let Some(join) = &mut element.join {
            if let Some(keys) = &mut join.using_keys {
                for key in keys {
                    walk_expr_mut(key, enter_subqueries, f);
                }
            }
            if let Some(on) = &mut join.on {
                walk_expr_mut(on, enter_subqueries, f);
            }
        }
    }
    if let Some(array_join) = &mut query.array_join {
        for expr in &mut array_join.expressions {
            walk_expr_mut(expr, enter_subqueries, f);
        }
    }
    if let Some(prewhere) = &mut query.prewhere {
        walk_expr_mut(prewhere, enter_subqueries, f);
    }
    if let Some(where_clause) = &mut query.where_clause {
        walk_expr_mut(where_clause, enter_subqueries, f);
    }
    if let Some(group_by) = &mut query.group_by {
        for key in group_by {
            walk_expr_mut(key, enter_subqueries, f);
        }
    }
    if let Some(having) = &mut query.having {
        walk_expr_mut(having, enter_subqueries, f);
    }
    if let Some(order_by) = &mut query.order_by {
        for element in order_by {
            walk_expr_mut(&mut element.expr, enter_subqueries, f);
        }
    }
    if let Some(limit_by) = &mut query.limit_by {
        for expr in &mut limit_by.expressions {
            walk_expr_mut(expr, enter_subqueries, f);
        }
    }
}

/// Apply `f` once to every top-level expression slot of a SELECT, in clause
/// order, without recursing into the expressions themselves. Used by passes
/// that drive their own recursion (scalar folding, alias substitution).
pub fn for_each_select_slot_mut(query: &mut SelectQuery, f: &mut dyn FnMut(&mut Expression)) {
    for expr in &mut query.select {
        f(expr);
    }
    for element in &mut query.tables {
        if let TableExpression::TableFunction(tf) = &mut element.table {
            for arg in &mut tf.function.args {
                f(arg);
            }
        }
        if let Some(join) = &mut element.join {
            if let Some(keys) = &mut join.using_keys {
                for key in keys {
                    f(key);
                }
            }
            if let Some(on) = &mut join.on {
                f(on);
            }
        }
    }
    if let Some(array_join) = &mut query.array_join {
        for expr in &mut array_join.expressions {
            f(expr);
        }
    }
    if let Some(prewhere) = &mut query.prewhere {
        f(prewhere);
    }
    if let Some(where_clause) = &mut query.where_clause {
        f(where_clause);
    }
    if let Some(group_by) = &mut query.group_by {
        for key in group_by {
            f(key);
        }
    }
    if let Some(having) = &mut query.having {
        f(having);
    }
    if let Some(order_by) = &mut query.order_by {
        for element in order_by {
            f(&mut element.expr);
        }
    }
    if let Some(limit_by) = &mut query.limit_by {
        for expr in &mut limit_by.expressions {
            f(expr);
        }
    }
}

/// Recurse into every SELECT query of the tree, innermost first, including
/// derived tables and scalar subqueries. The visitor runs post-order, so a
/// pass sees inner queries before the queries that contain them.
pub fn walk_subqueries_post_mut(query: &mut SelectQuery, f: &mut dyn FnMut(&mut SelectQuery)) {
    for element in &mut query.tables {
        if let TableExpression::Subquery(subquery) = &mut element.table {
            walk_subqueries_post_mut(&mut subquery.query, f);
        }
    }
    let mut recurse = |expr: &mut Expression| {
        if let Expression::Subquery(subquery) = expr {
            walk_subqueries_post_mut(&mut subquery.query, f);
        }
    };
    walk_select_mut(query, false, &mut recurse);
    f(query);
}

/// Whether any node of the expression satisfies the predicate, without
/// descending into subqueries unless asked.
pub fn any_expr(expr: &Expression, enter_subqueries: bool, pred: &dyn Fn(&Expression) -> bool) -> bool {
    let mut found = false;
    walk_expr(expr, enter_subqueries, &mut |node| {
        if pred(node) {
            found = true;
        }
    });
    found
}

/// Whether the expression contains a call to `name`, not looking into
/// subqueries.
pub fn contains_function(expr: &Expression, name: &str) -> bool {
    any_expr(expr, false, &|node| {
        node.as_function().is_some_and(|f| f.name == name)
    })
}

/// Number of nodes in the expression tree, subquery bodies included.
pub fn count_nodes(expr: &Expression) -> usize {
    let mut count = 0;
    walk_expr(expr, true, &mut |_| count += 1);
    count
}
