//! The analysis result record.
//!
//! [`AnalysisResult`] is built incrementally by the pipeline and becomes
//! read-only once the driver returns it. Besides the rewritten AST (mutated
//! in place by the passes), it is everything the physical planner needs:
//! the pruned column set to read from storage, the alias and scalar maps,
//! join and array-join metadata, and the collected aggregates.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::expressions::{Function, Value};
use crate::schema::{Column, Storage};

use super::aliases::Aliases;
use super::joins::AnalyzedJoin;
use super::required_columns::ColumnsContext;

/// Output of [`Analyzer::analyze_select`](super::Analyzer::analyze_select)
/// and [`Analyzer::analyze`](super::Analyzer::analyze).
#[derive(Clone, Default)]
pub struct AnalysisResult {
    /// Storage snapshot behind the left table, when known.
    pub storage: Option<Arc<dyn Storage>>,
    /// Columns available before pruning, in catalog order.
    pub source_columns: Vec<Column>,
    /// Deduplicated names of `source_columns`.
    pub source_columns_set: HashSet<String>,
    /// The pruned list: what storage must actually read.
    pub required_source_columns: Vec<Column>,
    /// Alias bindings of the outermost query scope.
    pub aliases: Aliases,
    /// Folded scalar subqueries, keyed by rendered subquery SQL.
    pub scalars: HashMap<String, Value>,
    /// Join metadata.
    pub analyzed_join: AnalyzedJoin,
    /// ARRAY JOIN result column to its source column.
    pub array_join_result_to_source: BTreeMap<String, String>,
    /// ARRAY JOIN source name to alias.
    pub array_join_name_to_alias: BTreeMap<String, String>,
    /// ARRAY JOIN alias to source name.
    pub array_join_alias_to_name: BTreeMap<String, String>,
    /// Aggregate calls, in traversal order.
    pub aggregates: Vec<Function>,
    /// How many predicate pushdowns rewrote subqueries.
    pub rewrite_subqueries: usize,
    /// No column is referenced; the engine may answer from row counts alone.
    pub maybe_optimize_trivial_count: bool,
}

impl std::fmt::Debug for AnalysisResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisResult")
            .field("source_columns", &self.source_columns)
            .field("required_source_columns", &self.required_source_columns)
            .field("aliases", &self.aliases)
            .field("scalars", &self.scalars)
            .field("analyzed_join", &self.analyzed_join)
            .field("array_join_result_to_source", &self.array_join_result_to_source)
            .field("aggregates", &self.aggregates)
            .field("rewrite_subqueries", &self.rewrite_subqueries)
            .field(
                "maybe_optimize_trivial_count",
                &self.maybe_optimize_trivial_count,
            )
            .finish_non_exhaustive()
    }
}

impl AnalysisResult {
    /// Seed a result with explicit source columns, merging in the storage's
    /// physical columns.
    pub fn new(source_columns: Vec<Column>, storage: Option<Arc<dyn Storage>>) -> Self {
        Self::seed(source_columns, storage, false)
    }

    /// Like [`AnalysisResult::new`], also merging the storage's virtual
    /// columns.
    pub fn new_with_virtuals(source_columns: Vec<Column>, storage: Option<Arc<dyn Storage>>) -> Self {
        Self::seed(source_columns, storage, true)
    }

    fn seed(source_columns: Vec<Column>, storage: Option<Arc<dyn Storage>>, add_virtuals: bool) -> Self {
        let mut result = Self {
            storage,
            source_columns,
            ..Self::default()
        };
        result.collect_source_columns(add_virtuals);
        result
    }

    /// Merge storage columns into `source_columns` and deduplicate by name,
    /// keeping first occurrences.
    fn collect_source_columns(&mut self, add_virtuals: bool) {
        if let Some(storage) = &self.storage {
            let from_storage = if add_virtuals {
                storage.all_columns()
            } else {
                storage.physical_columns()
            };
            if self.source_columns.is_empty() {
                self.source_columns = from_storage;
            } else {
                self.source_columns.extend(from_storage);
            }
        }
        let mut seen = HashSet::new();
        self.source_columns.retain(|c| seen.insert(c.name.clone()));
        self.source_columns_set = seen;
    }

    /// Resolve the referenced names into the final required column list:
    /// promote used joined columns, pull in ARRAY JOIN sources, fall back to
    /// the cheapest readable column for column-less queries, prune, and
    /// admit storage virtuals. Unresolvable names fail with full
    /// diagnostics.
    pub(crate) fn collect_used_columns(
        &mut self,
        mut context: ColumnsContext,
        is_select: bool,
        query_text: &str,
    ) -> Result<()> {
        let referenced_names: Vec<String> =
            context.required_names().cloned().collect();

        // ARRAY JOIN results are produced, not read; their sources are
        for result_name in self.array_join_result_to_source.keys() {
            context.remove(result_name);
        }

        if context.has_table_join {
            let joined = self.analyzed_join.columns_from_joined_table.clone();
            for joined_column in joined {
                let name = joined_column.name.clone();
                if self.source_columns_set.contains(&name) {
                    continue;
                }
                if context.contains(&name) {
                    // a column needed only as a JOIN ON key is produced by
                    // the join, not read from the left table
                    if context.name_inclusion(&name) > self.analyzed_join.right_key_inclusion(&name)
                    {
                        self.analyzed_join.add_joined_column(joined_column);
                    }
                    context.remove(&name);
                }
            }
        }

        let mut array_join_sources: HashSet<String> = HashSet::new();
        if context.has_array_join {
            array_join_sources.extend(self.array_join_result_to_source.values().cloned());
            for column in &self.source_columns {
                if array_join_sources.contains(&column.name) {
                    context.insert(column.name.clone());
                }
            }
        }

        if is_select && context.is_empty() {
            self.maybe_optimize_trivial_count = true;
            context.insert(self.cheapest_column());
        }

        let mut unknown: HashSet<String> = context.required_names().cloned().collect();
        let mut pruned = self.source_columns.clone();
        pruned.retain(|column| {
            unknown.remove(&column.name);
            context.contains(&column.name)
        });

        // virtual columns are readable even though they are not in the
        // user-visible schema
        if let Some(storage) = &self.storage {
            let mut admitted = Vec::new();
            for name in &unknown {
                if let Some(column) = storage.get_column(name) {
                    pruned.push(column);
                    admitted.push(name.clone());
                }
            }
            for name in admitted {
                unknown.remove(&name);
            }
        }

        if !unknown.is_empty() {
            return Err(self.unknown_columns_error(unknown, &referenced_names, &array_join_sources, query_text));
        }

        self.source_columns = pruned.clone();
        self.required_source_columns = pruned;
        Ok(())
    }

    /// The column that is cheapest to read, by
    /// `(compressed size, type size, uncompressed size)` where storage
    /// reports sizes, otherwise by the data type's in-memory size.
    fn cheapest_column(&self) -> String {
        let mut candidates: Vec<(usize, usize, usize, &str)> = Vec::new();
        if let Some(storage) = &self.storage {
            let sizes = storage.column_sizes();
            for column in &self.source_columns {
                let Some(size) = sizes.get(&column.name) else {
                    continue;
                };
                let type_size = column.data_type.fixed_value_size().unwrap_or(100);
                candidates.push((size.compressed, type_size, size.uncompressed, &column.name));
            }
        }
        if let Some(best) = candidates.iter().min() {
            return best.3.to_string();
        }
        smallest_column(&self.source_columns)
    }

    fn unknown_columns_error(
        &self,
        unknown: HashSet<String>,
        referenced_names: &[String],
        array_join_sources: &HashSet<String>,
        query_text: &str,
    ) -> Error {
        let mut missing: Vec<&String> = unknown.iter().collect();
        missing.sort();
        let names = missing
            .iter()
            .map(|n| format!("'{}'", n))
            .collect::<Vec<_>>()
            .join(" ");

        let mut details = String::new();
        let mut required: Vec<&String> = referenced_names.iter().collect();
        required.sort();
        details.push_str(", required columns:");
        for name in required {
            details.push_str(&format!(" '{}'", name));
        }
        if self.source_columns_set.is_empty() {
            details.push_str(", no source columns");
        } else {
            let mut source: Vec<&String> = self.source_columns_set.iter().collect();
            source.sort();
            details.push_str(", source columns:");
            for name in source {
                details.push_str(&format!(" '{}'", name));
            }
        }
        if !self.analyzed_join.columns_from_joined_table.is_empty() {
            details.push_str(", joined columns:");
            for column in &self.analyzed_join.columns_from_joined_table {
                details.push_str(&format!(" '{}'", column.name));
            }
        }
        if !array_join_sources.is_empty() {
            let mut sources: Vec<&String> = array_join_sources.iter().collect();
            sources.sort();
            details.push_str(", arrayJoin columns:");
            for name in sources {
                details.push_str(&format!(" '{}'", name));
            }
        }

        Error::UnknownIdentifier {
            names,
            query: query_text.to_string(),
            details,
        }
    }
}

/// The source column whose data type has the smallest in-memory value size;
/// unbounded types count as 100 bytes. Ties keep the first column.
fn smallest_column(columns: &[Column]) -> String {
    columns
        .iter()
        .min_by_key(|c| c.data_type.fixed_value_size().unwrap_or(100))
        .map(|c| c.name.clone())
        .unwrap_or_default()
}
