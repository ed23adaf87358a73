//! Query normalization.
//!
//! Four rewrites run here, in order:
//!
//! 1. **`countDistinct` customization** -- every call named `countDistinct`
//!    (case-insensitive) is renamed to the implementation selected by the
//!    `count_distinct_implementation` setting. Done as a query rewrite so a
//!    distributed query ships the rewritten name to every remote server.
//! 2. **Alias collection** -- the scope's alias map is built (see
//!    [`aliases`](super::aliases)).
//! 3. **Table-identifier marking** -- identifiers that name a table rather
//!    than a column (the right argument of the `IN` family, the first
//!    argument of `joinGet`) are marked so alias substitution skips them.
//! 4. **Alias substitution** -- identifiers naming an alias are replaced by a
//!    clone of the alias body, to a fixed point. Substitution is bounded by
//!    `max_ast_depth` and `max_expanded_ast_elements`; an alias cycle
//!    (`a AS b, b AS a`) runs into the depth bound and fails rather than
//!    looping. A source column name always wins over an alias of the same
//!    name, so aliases cannot shadow real columns.
//!
//! After substitution, structurally equal subtrees are interchangeable:
//! node identity *is* structural equality for the rest of the pipeline, and
//! any pass that rewrites one occurrence clones first.

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::expressions::{Expression, SelectQuery};
use crate::settings::Settings;
use crate::traversal::{count_nodes, for_each_select_slot_mut, walk_select_mut};

use super::aliases::{collect_aliases, collect_expr_aliases, Aliases};

/// Rename `countDistinct` calls to the configured implementation.
pub fn customize_count_distinct(query: &mut SelectQuery, implementation: &str) {
    walk_select_mut(query, true, &mut |node| {
        rename_count_distinct(node, implementation);
    });
}

/// Expression-tree counterpart of [`customize_count_distinct`].
pub fn customize_count_distinct_expr(expr: &mut Expression, implementation: &str) {
    crate::traversal::walk_expr_mut(expr, true, &mut |node| {
        rename_count_distinct(node, implementation);
    });
}

fn rename_count_distinct(node: &mut Expression, implementation: &str) {
    if let Expression::Function(func) = node {
        if func.name.eq_ignore_ascii_case("countdistinct") {
            func.name = implementation.to_string();
        }
    }
}

/// Mark identifiers used as table arguments so they survive substitution.
pub fn mark_table_identifiers(query: &mut SelectQuery) {
    walk_select_mut(query, true, &mut mark_in_function);
}

fn mark_in_function(node: &mut Expression) {
    let Expression::Function(func) = node else {
        return;
    };
    let table_arg = match func.name.as_str() {
        "in" | "notIn" | "globalIn" | "globalNotIn" => 1,
        "joinGet" => 0,
        _ => return,
    };
    if let Some(Expression::Identifier(ident)) = func.args.get_mut(table_arg) {
        ident.table_marker = true;
    }
}

/// Bounded alias substitution over one query and its subqueries.
///
/// Each scope sees its own aliases merged over the enclosing scope's
/// (inner bindings shadow outer ones), and substitutes only within its own
/// expression positions.
pub struct QueryNormalizer<'a> {
    source_columns: &'a HashSet<String>,
    max_depth: usize,
    max_elements: usize,
    nodes_created: usize,
}

impl<'a> QueryNormalizer<'a> {
    pub fn new(settings: &Settings, source_columns: &'a HashSet<String>) -> Self {
        Self {
            source_columns,
            max_depth: settings.max_ast_depth,
            max_elements: settings.max_expanded_ast_elements,
            nodes_created: 0,
        }
    }

    /// Normalize a SELECT in place. `outer` is the enclosing scope's alias
    /// map (empty at the top level); the top scope's own bindings are
    /// returned through `aliases`.
    pub fn normalize_select(
        &mut self,
        query: &mut SelectQuery,
        outer: &Aliases,
        aliases: &mut Aliases,
    ) -> Result<()> {
        collect_aliases(query, aliases)?;
        let mut scope = outer.clone();
        scope.extend(aliases.iter().map(|(k, v)| (k.clone(), v.clone())));

        let query_text = query.to_string();
        let mut failure = None;
        for_each_select_slot_mut(query, &mut |slot| {
            if failure.is_none() {
                failure = self.substitute(slot, &scope, &query_text, 0).err();
            }
        });
        if let Some(err) = failure {
            return Err(err);
        }

        self.normalize_subqueries(query, &scope)
    }

    /// Normalize a standalone expression tree (non-SELECT analysis).
    pub fn normalize_expression(
        &mut self,
        expr: &mut Expression,
        aliases: &mut Aliases,
    ) -> Result<()> {
        collect_expr_aliases(expr, aliases)?;
        let scope = aliases.clone();
        let expr_text = expr.column_name();
        self.substitute(expr, &scope, &expr_text, 0)
    }

    fn normalize_subqueries(&mut self, query: &mut SelectQuery, scope: &Aliases) -> Result<()> {
        for element in &mut query.tables {
            if let crate::expressions::TableExpression::Subquery(subquery) = &mut element.table {
                let mut inner = Aliases::new();
                self.normalize_select(&mut subquery.query, scope, &mut inner)?;
            }
        }
        let mut failure = None;
        walk_select_mut(query, false, &mut |node| {
            if failure.is_none() {
                if let Expression::Subquery(subquery) = node {
                    let mut inner = Aliases::new();
                    failure = self
                        .normalize_select(&mut subquery.query, scope, &mut inner)
                        .err();
                }
            }
        });
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Replace one identifier by its alias body, repeatedly, until the node
    /// is not an alias reference. `depth` counts substitutions along this
    /// path and enforces the depth bound.
    fn substitute(
        &mut self,
        node: &mut Expression,
        scope: &Aliases,
        query_text: &str,
        depth: usize,
    ) -> Result<()> {
        if depth > self.max_depth {
            return Err(Error::TooDeepAst {
                max: self.max_depth,
                query: query_text.to_string(),
            });
        }

        let replacement = match node {
            Expression::Identifier(ident)
                if !ident.table_marker
                    && ident.is_short()
                    && !self.source_columns.contains(&ident.name()) =>
            {
                match scope.get(&ident.name()) {
                    // the defining occurrence of `x AS x` is not a reference
                    Some(bound)
                        if bound.as_identifier().is_some_and(|b| b.name() == ident.name()) =>
                    {
                        None
                    }
                    Some(bound) => Some(bound.clone()),
                    None => None,
                }
            }
            _ => None,
        };

        if let Some(replacement) = replacement {
            self.nodes_created += count_nodes(&replacement);
            if self.nodes_created > self.max_elements {
                return Err(Error::TooBigAst {
                    max: self.max_elements,
                    query: query_text.to_string(),
                });
            }
            // a reference with its own alias keeps it; otherwise the binding
            // name (carried on the body) stays as the output name
            let own_alias = node.alias().map(str::to_string);
            *node = replacement;
            if own_alias.is_some() {
                node.set_alias(own_alias);
            }
            // the body may itself reference aliases
            return self.substitute(node, scope, query_text, depth + 1);
        }

        if let Expression::Function(func) = node {
            for arg in &mut func.args {
                self.substitute(arg, scope, query_text, depth + 1)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::*;

    fn normalize(query: &mut SelectQuery) -> Result<Aliases> {
        let settings = Settings::default();
        let source = HashSet::new();
        let mut normalizer = QueryNormalizer::new(&settings, &source);
        let mut aliases = Aliases::new();
        normalizer.normalize_select(query, &Aliases::new(), &mut aliases)?;
        Ok(aliases)
    }

    #[test]
    fn test_count_distinct_is_renamed() {
        let mut query = select(vec![func("countDistinct", vec![col("x")])])
            .from("t")
            .build();
        customize_count_distinct(&mut query, "uniqExact");
        assert_eq!(query.select[0].column_name(), "uniqExact(x)");
    }

    #[test]
    fn test_count_distinct_rename_is_case_insensitive() {
        let mut query = select(vec![func("COUNTDISTINCT", vec![col("x")])]).build();
        customize_count_distinct(&mut query, "uniq");
        assert_eq!(query.select[0].column_name(), "uniq(x)");
    }

    #[test]
    fn test_in_table_argument_is_marked() {
        let mut query = select(vec![col("x")])
            .from("t")
            .where_(func("in", vec![col("x"), col("allowed")]))
            .build();
        mark_table_identifiers(&mut query);
        let where_clause = query.where_clause.as_ref().unwrap();
        let func = where_clause.as_function().unwrap();
        assert!(func.args[1].as_identifier().unwrap().table_marker);
        assert!(!func.args[0].as_identifier().unwrap().table_marker);
    }

    #[test]
    fn test_alias_substitution() {
        let mut query = select(vec![
            aliased(func("plus", vec![col("a"), lit(1u64)]), "s"),
            func("negate", vec![col("s")]),
        ])
        .from("t")
        .build();
        normalize(&mut query).unwrap();
        assert_eq!(query.select[1].column_name(), "negate(plus(a, 1))");
    }

    #[test]
    fn test_substituted_body_keeps_output_name() {
        let mut query = select(vec![
            aliased(func("plus", vec![col("a"), lit(1u64)]), "s"),
            col("s"),
        ])
        .from("t")
        .build();
        normalize(&mut query).unwrap();
        assert_eq!(query.select[1].alias_or_column_name(), "s");
    }

    #[test]
    fn test_source_column_wins_over_alias() {
        let mut query = select(vec![aliased(func("negate", vec![col("a")]), "x"), col("x")])
            .from("t")
            .build();
        let settings = Settings::default();
        let source: HashSet<String> = ["x".to_string()].into_iter().collect();
        let mut normalizer = QueryNormalizer::new(&settings, &source);
        let mut aliases = Aliases::new();
        normalizer
            .normalize_select(&mut query, &Aliases::new(), &mut aliases)
            .unwrap();
        // `x` names a source column, so the alias does not shadow it
        assert_eq!(query.select[1].column_name(), "x");
    }

    #[test]
    fn test_alias_cycle_is_too_deep() {
        let mut query = select(vec![aliased(col("b"), "a"), aliased(col("a"), "b")]).build();
        let err = normalize(&mut query).unwrap_err();
        assert!(matches!(err, Error::TooDeepAst { .. }));
    }

    #[test]
    fn test_marked_identifier_is_not_substituted() {
        let mut query = select(vec![aliased(func("negate", vec![col("v")]), "t2")])
            .from("t")
            .where_(func("in", vec![col("x"), col("t2")]))
            .build();
        mark_table_identifiers(&mut query);
        normalize(&mut query).unwrap();
        let where_clause = query.where_clause.as_ref().unwrap();
        let in_func = where_clause.as_function().unwrap();
        assert_eq!(in_func.args[1].column_name(), "t2");
    }

    #[test]
    fn test_subquery_scope_sees_outer_aliases() {
        let inner = select(vec![col("s")]).from("u").build();
        let mut query = select(vec![
            aliased(func("plus", vec![col("a"), lit(1u64)]), "s"),
            subquery(inner),
        ])
        .from("t")
        .build();
        normalize(&mut query).unwrap();
        let Expression::Subquery(sq) = &query.select[1] else {
            panic!("expected subquery");
        };
        assert_eq!(sq.query.select[0].column_name(), "plus(a, 1)");
    }
}
