//! Alias map builder.
//!
//! Collects `expr AS name` bindings from one query scope. Aliases are
//! lexically scoped: a subquery's bindings are private to that subquery, so
//! the walk never descends into SELECT bodies. The subquery node's *own*
//! alias (`(SELECT 1) AS x`) belongs to the enclosing scope and is recorded.
//!
//! Binding the same alias to two structurally different expressions is an
//! error; recording an identical binding twice is idempotent.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::expressions::{Expression, SelectQuery};
use crate::traversal::{walk_expr, walk_select};

/// Alias name to the expression it abbreviates. The stored expression keeps
/// its alias so a substituted subtree retains its output name.
pub type Aliases = HashMap<String, Expression>;

/// Collect the alias bindings of one SELECT scope.
pub fn collect_aliases(query: &SelectQuery, aliases: &mut Aliases) -> Result<()> {
    let mut failure = None;
    walk_select(query, false, &mut |node| {
        if failure.is_none() {
            failure = record_alias(node, aliases).err();
        }
    });
    match failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Collect the alias bindings of a standalone expression tree.
pub fn collect_expr_aliases(expr: &Expression, aliases: &mut Aliases) -> Result<()> {
    let mut failure = None;
    walk_expr(expr, false, &mut |node| {
        if failure.is_none() {
            failure = record_alias(node, aliases).err();
        }
    });
    match failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn record_alias(node: &Expression, aliases: &mut Aliases) -> Result<()> {
    let Some(alias) = node.alias() else {
        return Ok(());
    };
    if alias.is_empty() {
        return Ok(());
    }
    match aliases.get(alias) {
        Some(existing) if existing == node => Ok(()),
        Some(existing) => Err(Error::MultipleExpressionsForAlias {
            alias: alias.to_string(),
            first: existing.column_name(),
            second: node.column_name(),
        }),
        None => {
            aliases.insert(alias.to_string(), node.clone());
            Ok(())
        }
    }
}
