//! Analyzer driver.
//!
//! [`Analyzer`] owns the settings snapshot and the collaborator seams, and
//! runs the rewrite pipeline in its fixed order. Each pass's post-condition
//! is the next pass's precondition; the order is load-bearing (constant-IF
//! folding needs folded scalars, GROUP BY simplification needs folded
//! constants, predicate pushdown must not see dead IF branches).
//!
//! One analyzer instance may serve many queries; one call analyzes exactly
//! one query, single-threaded, and either returns a complete
//! [`AnalysisResult`] or an error with nothing mutated worth keeping.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use crate::dictionaries::{DictionarySource, InjectivityCache};
use crate::error::Result;
use crate::expressions::{Expression, SelectQuery};
use crate::functions::FunctionRegistry;
use crate::schema::{Column, Storage, TableWithColumns};
use crate::settings::Settings;
use crate::traversal::contains_function;

use super::aggregates::{assert_no_aggregates, collect_aggregates};
use super::array_join::collect_array_joined_columns;
use super::dedup_clauses::{
    optimize_duplicate_distinct, optimize_duplicate_order_by, optimize_limit_by,
    optimize_order_by, optimize_using,
};
use super::fold_scalars::{fold_scalar_subqueries, fold_scalar_subqueries_expr, ScalarExecutor};
use super::joins::{collect_join_keys, replace_joined_table, set_join_strictness};
use super::normalize::{
    customize_count_distinct, customize_count_distinct_expr, mark_table_identifiers,
    QueryNormalizer,
};
use super::optimize_group_by::optimize_group_by;
use super::optimize_if::{optimize_if, optimize_if_expr};
use super::qualify_columns::{rename_duplicated_columns, translate_qualified_names};
use super::required_columns::{collect_required_columns, collect_required_columns_expr};
use super::result::AnalysisResult;

/// Per-call analysis options.
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    /// Current subquery nesting level of the analyzed query.
    pub subquery_depth: u32,
    /// Rename duplicate output columns before translation.
    pub remove_duplicates: bool,
}

/// External predicate-pushdown optimizer. Returns how many subqueries were
/// rewritten.
pub trait PredicatePushdown {
    fn optimize(
        &self,
        query: &mut SelectQuery,
        tables: &[TableWithColumns],
        settings: &Settings,
    ) -> usize;
}

/// External logical-expression optimizer
/// (`x = 1 OR x = 2` to `x IN (1, 2)` and friends), in place.
pub trait LogicalOptimizer {
    fn perform(&self, query: &mut SelectQuery, min_equality_chain_length: u64);
}

/// The semantic analysis and query-rewrite stage.
pub struct Analyzer {
    settings: Settings,
    functions: FunctionRegistry,
    dictionaries: Option<Box<dyn DictionarySource>>,
    scalar_executor: Option<Box<dyn ScalarExecutor>>,
    predicate_pushdown: Option<Box<dyn PredicatePushdown>>,
    logical_optimizer: Option<Box<dyn LogicalOptimizer>>,
}

impl Analyzer {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            functions: FunctionRegistry::with_defaults(),
            dictionaries: None,
            scalar_executor: None,
            predicate_pushdown: None,
            logical_optimizer: None,
        }
    }

    pub fn with_functions(mut self, functions: FunctionRegistry) -> Self {
        self.functions = functions;
        self
    }

    pub fn with_dictionaries(mut self, dictionaries: Box<dyn DictionarySource>) -> Self {
        self.dictionaries = Some(dictionaries);
        self
    }

    pub fn with_scalar_executor(mut self, executor: Box<dyn ScalarExecutor>) -> Self {
        self.scalar_executor = Some(executor);
        self
    }

    pub fn with_predicate_pushdown(mut self, optimizer: Box<dyn PredicatePushdown>) -> Self {
        self.predicate_pushdown = Some(optimizer);
        self
    }

    pub fn with_logical_optimizer(mut self, optimizer: Box<dyn LogicalOptimizer>) -> Self {
        self.logical_optimizer = Some(optimizer);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Analyze and rewrite a SELECT.
    ///
    /// # Arguments
    /// * `query` - the parsed SELECT, rewritten in place
    /// * `result` - a result seeded with source columns and an optional
    ///   storage handle (see [`AnalysisResult::new`])
    /// * `options` - nesting depth and duplicate handling
    /// * `tables_with_columns` - the FROM tables with their columns, in FROM
    ///   order; the second entry, when present, is the joined table
    /// * `required_result_columns` - output columns the caller needs; the
    ///   projection is pruned down to them
    pub fn analyze_select(
        &self,
        query: &mut SelectQuery,
        mut result: AnalysisResult,
        options: &AnalyzeOptions,
        tables_with_columns: &[TableWithColumns],
        required_result_columns: &[String],
    ) -> Result<AnalysisResult> {
        let source_columns_set = result.source_columns_set.clone();

        if options.remove_duplicates {
            rename_duplicated_columns(query);
        }

        if self.settings.enable_optimize_predicate_expression {
            replace_joined_table(query);
        }

        if tables_with_columns.len() > 1 {
            let joined = &tables_with_columns[1];
            result.analyzed_join.seed_columns_from_joined_table(
                joined.columns.clone(),
                &source_columns_set,
                &joined.qualified_prefix(),
            );
        }

        // table arguments of IN must be marked before translation, or they
        // would be resolved (and rejected) as column references
        mark_table_identifiers(query);
        translate_qualified_names(query, &source_columns_set, tables_with_columns)?;
        trace!(target: "analyzer", query = %query, "translated qualified names");

        if let Some(logical) = &self.logical_optimizer {
            logical.perform(
                query,
                self.settings.optimize_min_equality_disjunction_chain_length,
            );
        }

        customize_count_distinct(query, &self.settings.count_distinct_implementation);
        let mut normalizer = QueryNormalizer::new(&self.settings, &source_columns_set);
        normalizer.normalize_select(query, &HashMap::new(), &mut result.aliases)?;
        trace!(target: "analyzer", query = %query, "normalized");

        // Must run after normalization (so aliases are not lost) and before
        // scalar folding and aggregation analysis (to avoid computing
        // columns nobody asked for).
        remove_unneeded_columns(query, required_result_columns, options.remove_duplicates);

        fold_scalar_subqueries(
            query,
            options.subquery_depth,
            self.settings.max_subquery_depth,
            self.scalar_executor.as_deref(),
            &mut result.scalars,
        )?;

        optimize_if(query, &result.aliases, self.settings.optimize_if_chain_to_multiif);

        if let Some(pushdown) = &self.predicate_pushdown {
            result.rewrite_subqueries =
                pushdown.optimize(query, tables_with_columns, &self.settings);
        }

        {
            let injectivity = self
                .dictionaries
                .as_deref()
                .map(InjectivityCache::new);
            optimize_group_by(query, &source_columns_set, injectivity.as_ref());
        }
        optimize_order_by(query);
        optimize_duplicate_order_by(query, &self.functions);
        optimize_duplicate_distinct(query);
        optimize_limit_by(query);
        optimize_using(query);
        trace!(target: "analyzer", query = %query, "optimized clauses");

        let source_columns = result.source_columns.clone();
        collect_array_joined_columns(query, &mut result, &source_columns)?;

        set_join_strictness(
            query,
            self.settings.join_default_strictness,
            self.settings.any_join_distinct_right_table_keys,
            &mut result.analyzed_join,
        )?;
        collect_join_keys(&mut result.analyzed_join, query, tables_with_columns)?;

        result.aggregates = collect_aggregates(query, &self.functions)?;

        let context = collect_required_columns(query);
        result.collect_used_columns(context, true, &query.to_string())?;
        trace!(
            target: "analyzer",
            required = ?result.required_source_columns,
            trivial_count = result.maybe_optimize_trivial_count,
            "analysis complete"
        );
        Ok(result)
    }

    /// Analyze a non-SELECT expression tree (a column default, a TTL
    /// expression, an index expression).
    pub fn analyze(
        &self,
        expr: &mut Expression,
        source_columns: Vec<Column>,
        storage: Option<Arc<dyn Storage>>,
    ) -> Result<AnalysisResult> {
        let mut result = AnalysisResult::new(source_columns, storage);
        let source_columns_set = result.source_columns_set.clone();

        customize_count_distinct_expr(expr, &self.settings.count_distinct_implementation);
        let mut normalizer = QueryNormalizer::new(&self.settings, &source_columns_set);
        normalizer.normalize_expression(expr, &mut result.aliases)?;

        fold_scalar_subqueries_expr(
            expr,
            0,
            self.settings.max_subquery_depth,
            self.scalar_executor.as_deref(),
            &mut result.scalars,
        )?;

        optimize_if_expr(expr, &result.aliases, self.settings.optimize_if_chain_to_multiif);

        assert_no_aggregates(expr, "in wrong place", &self.functions, &expr.column_name())?;

        let context = collect_required_columns_expr(expr);
        result.collect_used_columns(context, false, &expr.column_name())?;
        Ok(result)
    }
}

/// Prune the SELECT list down to `required_result_columns`.
///
/// Every element named in the requirement list is kept, with multiplicities
/// when `remove_dups` is false (`SELECT x, y, y` may be required twice).
/// DISTINCT queries keep all elements (dropping one would change the
/// duplicate signature), as does any element containing an `arrayJoin` call
/// (dropping it would change the row multiplication). With no requirements,
/// pruning happens only when `remove_dups` is set, using each element's own
/// name once.
fn remove_unneeded_columns(
    query: &mut SelectQuery,
    required_result_columns: &[String],
    remove_dups: bool,
) {
    let mut required: HashMap<String, usize> = HashMap::new();
    if !required_result_columns.is_empty() {
        for name in required_result_columns {
            if remove_dups {
                required.insert(name.clone(), 1);
            } else {
                *required.entry(name.clone()).or_insert(0) += 1;
            }
        }
    } else if remove_dups {
        // asterisks can produce duplicates even without requirements
        for element in &query.select {
            required.entry(element.alias_or_column_name()).or_insert(1);
        }
    } else {
        return;
    }

    let distinct = query.distinct;
    let mut kept = Vec::with_capacity(query.select.len());
    for element in query.select.drain(..) {
        let name = element.alias_or_column_name();
        match required.get_mut(&name) {
            Some(count) if *count > 0 => {
                *count -= 1;
                kept.push(element);
            }
            _ if distinct || contains_function(&element, "arrayJoin") => kept.push(element),
            _ => {}
        }
    }
    query.select = kept;
}
