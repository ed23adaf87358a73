//! Referenced-name accounting for required-column analysis.
//!
//! Walks the rewritten query and counts how many times each column name is
//! referenced. JOIN ON references are tallied by the join analysis through
//! the right-key lists; comparing a name's total count against its right-key
//! count tells whether a joined column is needed beyond the join condition
//! itself. Subquery bodies read their own columns and are not visited.

use std::collections::HashMap;

use crate::expressions::{Expression, SelectQuery};
use crate::traversal::{walk_expr, walk_select};

/// Reference counts collected from one query.
#[derive(Debug, Default, Clone)]
pub struct ColumnsContext {
    required: HashMap<String, usize>,
    pub has_table_join: bool,
    pub has_array_join: bool,
}

impl ColumnsContext {
    /// How many times `name` was referenced.
    pub fn name_inclusion(&self, name: &str) -> usize {
        self.required.get(name).copied().unwrap_or(0)
    }

    /// The distinct referenced names.
    pub fn required_names(&self) -> impl Iterator<Item = &String> {
        self.required.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.required.is_empty()
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.required.remove(name).is_some()
    }

    pub fn insert(&mut self, name: String) {
        *self.required.entry(name).or_insert(0) += 1;
    }

    pub fn contains(&self, name: &str) -> bool {
        self.required.contains_key(name)
    }

    fn record(&mut self, node: &Expression) {
        if let Some(ident) = node.as_identifier() {
            if !ident.table_marker {
                self.insert(ident.name());
            }
        }
    }
}

/// Count column references across the whole SELECT.
pub fn collect_required_columns(query: &SelectQuery) -> ColumnsContext {
    let mut context = ColumnsContext {
        has_table_join: query.join_element().is_some(),
        has_array_join: query.array_join.is_some(),
        ..ColumnsContext::default()
    };
    walk_select(query, false, &mut |node| context.record(node));
    context
}

/// Count column references of a standalone expression tree.
pub fn collect_required_columns_expr(expr: &Expression) -> ColumnsContext {
    let mut context = ColumnsContext::default();
    walk_expr(expr, false, &mut |node| context.record(node));
    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::*;
    use crate::expressions::JoinKind;

    #[test]
    fn test_counts_repeated_references() {
        let query = select(vec![col("x"), func("plus", vec![col("x"), col("y")])])
            .from("t")
            .build();
        let context = collect_required_columns(&query);
        assert_eq!(context.name_inclusion("x"), 2);
        assert_eq!(context.name_inclusion("y"), 1);
        assert_eq!(context.name_inclusion("z"), 0);
    }

    #[test]
    fn test_counts_join_on_references() {
        let query = select(vec![col("v")])
            .from("a")
            .join_on(
                JoinKind::Inner,
                table("b"),
                func("equals", vec![col("k"), col("b.k")]),
            )
            .build();
        let context = collect_required_columns(&query);
        assert!(context.has_table_join);
        assert_eq!(context.name_inclusion("b.k"), 1);
        assert_eq!(context.name_inclusion("k"), 1);
    }

    #[test]
    fn test_marked_table_identifiers_are_not_columns() {
        let mut query = select(vec![col("x")])
            .from("t")
            .where_(func("in", vec![col("x"), col("allowed")]))
            .build();
        crate::analyzer::normalize::mark_table_identifiers(&mut query);
        let context = collect_required_columns(&query);
        assert!(!context.contains("allowed"));
        assert_eq!(context.name_inclusion("x"), 2);
    }

    #[test]
    fn test_subquery_columns_are_not_required_here() {
        let inner = select(vec![col("hidden")]).from("u").build();
        let query = select(vec![col("x")])
            .from("t")
            .where_(func("in", vec![col("x"), subquery(inner)]))
            .build();
        let context = collect_required_columns(&query);
        assert!(!context.contains("hidden"));
    }

    #[test]
    fn test_aliased_identifier_counts_its_column_name() {
        let query = select(vec![aliased(col("x"), "y")]).from("t").build();
        let context = collect_required_columns(&query);
        assert!(context.contains("x"));
        assert!(!context.contains("y"));
    }
}
