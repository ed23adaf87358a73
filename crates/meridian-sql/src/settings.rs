//! Analyzer settings snapshot.
//!
//! A [`Settings`] value is taken once per query and is read-only for the life
//! of the analysis call. Passes receive the individual knobs they need rather
//! than reaching for process-global state.

use serde::{Deserialize, Serialize};

/// Default strictness applied to JOINs written without ANY/ALL.
///
/// The `Empty` variant reproduces an unset server setting: a JOIN that needs
/// the default then fails with [`Error::ExpectedAllOrAny`](crate::Error).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum DefaultJoinStrictness {
    #[serde(rename = "")]
    Empty,
    #[default]
    All,
    Any,
}

/// The settings consumed by the analyzer.
///
/// Field names and defaults follow the engine's server settings. The struct
/// is deliberately plain data so a settings snapshot can be deserialized from
/// the session configuration and handed to [`Analyzer::new`](crate::Analyzer::new).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Enable predicate pushdown into subqueries (also gates the rewrite of a
    /// bare joined table into `(SELECT * FROM t) AS t`)
    pub enable_optimize_predicate_expression: bool,
    /// Collapse chains of `if` calls into a single `multiIf`
    pub optimize_if_chain_to_multiif: bool,
    /// Minimum length of an equality disjunction chain handed to the logical
    /// expression optimizer
    pub optimize_min_equality_disjunction_chain_length: u64,
    /// Strictness assumed for JOINs written without ANY/ALL
    pub join_default_strictness: DefaultJoinStrictness,
    /// Compatibility switch restoring the historical ANY JOIN semantics
    pub any_join_distinct_right_table_keys: bool,
    /// The aggregate function that `countDistinct(...)` rewrites to
    pub count_distinct_implementation: String,
    /// Maximum depth of the AST during alias substitution
    pub max_ast_depth: usize,
    /// Maximum number of nodes the AST may grow to during alias substitution
    pub max_expanded_ast_elements: usize,
    /// Maximum nesting level of scalar subqueries
    pub max_subquery_depth: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enable_optimize_predicate_expression: true,
            optimize_if_chain_to_multiif: false,
            optimize_min_equality_disjunction_chain_length: 3,
            join_default_strictness: DefaultJoinStrictness::All,
            any_join_distinct_right_table_keys: false,
            count_distinct_implementation: "uniqExact".to_string(),
            max_ast_depth: 1000,
            max_expanded_ast_elements: 500_000,
            max_subquery_depth: 100,
        }
    }
}
