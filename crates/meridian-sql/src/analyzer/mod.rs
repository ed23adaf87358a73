//! Semantic analysis pipeline.
//!
//! The passes live one per module, in pipeline order; [`analyzer`] hosts the
//! driver that strings them together and the collaborator seams it consumes.

/// Aggregate collection and placement checks
pub mod aggregates;
/// Alias map construction
pub mod aliases;
/// The driver and its collaborator traits
#[allow(clippy::module_inception)]
pub mod analyzer;
/// ARRAY JOIN column resolution
pub mod array_join;
/// Clause deduplication and cross-query clause removal
pub mod dedup_clauses;
/// Scalar subquery folding
pub mod fold_scalars;
/// Join strictness, right-table isolation, and key collection
pub mod joins;
/// countDistinct customization, table marking, and alias substitution
pub mod normalize;
/// GROUP BY simplification
pub mod optimize_group_by;
/// Constant-IF folding and IF-chain collapse
pub mod optimize_if;
/// Qualified-name translation and asterisk expansion
pub mod qualify_columns;
/// Referenced-name accounting
pub mod required_columns;
/// The analysis result record
pub mod result;

/// Aggregate collection entry points
pub use aggregates::{assert_no_aggregates, collect_aggregates};
/// Alias map type and builders
pub use aliases::{collect_aliases, collect_expr_aliases, Aliases};
/// The analyzer driver, options, and collaborator seams
pub use analyzer::{AnalyzeOptions, Analyzer, LogicalOptimizer, PredicatePushdown};
/// ARRAY JOIN resolution
pub use array_join::collect_array_joined_columns;
/// Clause dedups
pub use dedup_clauses::{
    optimize_duplicate_distinct, optimize_duplicate_order_by, optimize_limit_by,
    optimize_order_by, optimize_using,
};
/// Scalar folding and its executor contract
pub use fold_scalars::{fold_scalar_subqueries, ScalarExecutor};
/// Join analysis
pub use joins::{collect_join_keys, replace_joined_table, set_join_strictness, AnalyzedJoin};
/// Normalization entry points
pub use normalize::{customize_count_distinct, mark_table_identifiers, QueryNormalizer};
/// GROUP BY simplification
pub use optimize_group_by::optimize_group_by;
/// IF rewrites
pub use optimize_if::optimize_if;
/// Name translation and duplicate renaming
pub use qualify_columns::{rename_duplicated_columns, translate_qualified_names};
/// Reference accounting
pub use required_columns::{collect_required_columns, ColumnsContext};
/// The result record
pub use result::AnalysisResult;
