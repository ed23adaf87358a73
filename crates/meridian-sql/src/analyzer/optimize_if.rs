//! IF rewrites.
//!
//! Two rewrites over `if(...)` calls, run after scalar folding so constant
//! conditions produced by folded subqueries are visible:
//!
//! - **Constant-condition folding** -- `if(c, a, b)` with a decidable `c`
//!   collapses to `a` or `b`. A literal decides directly; an identifier is
//!   looked up in the alias map and decides when it is bound to a literal.
//!   `NULL` counts as false.
//! - **Chain collapse** -- `if(c1, x1, if(c2, x2, y))` with at least two
//!   chained calls becomes `multiIf(c1, x1, c2, x2, y)`. Runs post-order so
//!   inner chains collapse first; gated by `optimize_if_chain_to_multiif`.

use crate::expressions::{Expression, SelectQuery};
use crate::traversal::{walk_expr_mut, walk_select_mut};

use super::aliases::Aliases;

/// Apply both IF rewrites to every expression of the query, subqueries
/// included.
pub fn optimize_if(query: &mut SelectQuery, aliases: &Aliases, if_chain_to_multiif: bool) {
    walk_select_mut(query, true, &mut |node| fold_constant_if(node, aliases));
    if if_chain_to_multiif {
        walk_select_mut(query, true, &mut |node| {
            collapse_if_chain(node);
        });
    }
}

/// Apply both IF rewrites to a standalone expression tree.
pub fn optimize_if_expr(expr: &mut Expression, aliases: &Aliases, if_chain_to_multiif: bool) {
    walk_expr_mut(expr, true, &mut |node| fold_constant_if(node, aliases));
    if if_chain_to_multiif {
        walk_expr_mut(expr, true, &mut |node| {
            collapse_if_chain(node);
        });
    }
}

fn fold_constant_if(node: &mut Expression, aliases: &Aliases) {
    let Expression::Function(func) = node else {
        return;
    };
    if func.name != "if" || func.args.len() != 3 {
        return;
    }
    let Some(condition) = literal_condition(&func.args[0], aliases) else {
        return;
    };
    let alias = func.alias.clone();
    let branch = if condition {
        func.args[1].clone()
    } else {
        func.args[2].clone()
    };
    *node = branch;
    if node.alias().is_none() {
        node.set_alias(alias);
    }
    // the chosen branch may itself be a foldable if
    fold_constant_if(node, aliases);
}

/// Decide a condition from a literal, looking through one alias binding.
fn literal_condition(condition: &Expression, aliases: &Aliases) -> Option<bool> {
    match condition {
        Expression::Literal(lit) => lit.value.as_bool(),
        Expression::Identifier(ident) if ident.is_short() => match aliases.get(&ident.name()) {
            Some(Expression::Literal(lit)) => lit.value.as_bool(),
            _ => None,
        },
        _ => None,
    }
}

/// Collapse a chain of nested `if` calls into one `multiIf`. Returns whether
/// the node was rewritten.
fn collapse_if_chain(node: &mut Expression) -> bool {
    let Expression::Function(func) = node else {
        return false;
    };
    if func.name != "if" || func.args.len() != 3 {
        return false;
    }

    let mut chain_length = 1;
    let mut tail = &func.args[2];
    while let Some(inner) = tail.as_function() {
        if inner.name != "if" || inner.args.len() != 3 {
            break;
        }
        chain_length += 1;
        tail = &inner.args[2];
    }
    if chain_length < 2 {
        return false;
    }

    let mut multi_args = Vec::with_capacity(chain_length * 2 + 1);
    let mut current = node.clone();
    loop {
        match current {
            Expression::Function(func) if func.name == "if" && func.args.len() == 3 => {
                let mut args = func.args.into_iter();
                multi_args.push(args.next().unwrap());
                multi_args.push(args.next().unwrap());
                current = args.next().unwrap();
            }
            other => {
                multi_args.push(other);
                break;
            }
        }
    }

    let alias = node.alias().map(str::to_string);
    let mut rewritten = Expression::Function(Box::new(crate::expressions::Function::new(
        "multiIf", multi_args,
    )));
    rewritten.set_alias(alias);
    *node = rewritten;
    true
}
