//! ARRAY JOIN column resolution.
//!
//! `ARRAY JOIN` unfolds array columns into rows. Downstream execution needs
//! to know, for every column name the query produces through the clause,
//! which source column feeds it. This pass fills three maps of the analysis
//! result:
//!
//! - `array_join_result_to_source` -- result column name to source column.
//! - `array_join_name_to_alias` / `array_join_alias_to_name` -- the alias
//!   bindings of the clause itself, in both directions.
//!
//! The walk records a mapping for every reference the query makes to an
//! array-joined column, aliased (`ARRAY JOIN arr AS a ... a`), plain
//! (`ARRAY JOIN arr ... arr`), or nested (`ARRAY JOIN nest AS n ... n.x`).
//!
//! A query can also ARRAY JOIN without referencing any result column
//! (`SELECT count() FROM t ARRAY JOIN arr`); the row multiplication is still
//! observable, so a mapping is synthesized from the first clause entry. For
//! a nested table, every subcolumn with a matching prefix is mapped;
//! none matching is an error.

use crate::error::{Error, Result};
use crate::expressions::{Expression, SelectQuery};
use crate::schema::{concat_nested, split_nested, Column};
use crate::traversal::walk_select;

use super::result::AnalysisResult;

/// Resolve ARRAY JOIN columns into the result maps. No-op when the query has
/// no ARRAY JOIN clause.
pub fn collect_array_joined_columns(
    query: &SelectQuery,
    result: &mut AnalysisResult,
    source_columns: &[Column],
) -> Result<()> {
    let Some(array_join) = &query.array_join else {
        return Ok(());
    };

    // the clause's own alias bindings
    for expr in &array_join.expressions {
        if let Some(alias) = expr.alias() {
            let source = expr.column_name();
            result
                .array_join_name_to_alias
                .insert(source.clone(), alias.to_string());
            result
                .array_join_alias_to_name
                .insert(alias.to_string(), source);
        }
    }

    let unaliased_identifier_sources: Vec<String> = array_join
        .expressions
        .iter()
        .filter(|e| e.alias().is_none() && e.as_identifier().is_some())
        .map(|e| e.column_name())
        .collect();

    // map every reference the query makes to an array-joined column
    walk_select(query, false, &mut |node| {
        let Some(ident) = node.as_identifier() else {
            return;
        };
        if ident.table_marker {
            return;
        }
        let name = ident.name();
        if let Some(source) = result.array_join_alias_to_name.get(&name) {
            result
                .array_join_result_to_source
                .insert(name.clone(), source.clone());
            return;
        }
        if unaliased_identifier_sources.contains(&name)
            && result.source_columns_set.contains(&name)
        {
            result
                .array_join_result_to_source
                .insert(name.clone(), name.clone());
            return;
        }
        let (first, rest) = split_nested(&name);
        if rest.is_empty() {
            return;
        }
        if let Some(source_prefix) = result.array_join_alias_to_name.get(first) {
            let source = concat_nested(source_prefix, rest);
            if result.source_columns_set.contains(&source) {
                result.array_join_result_to_source.insert(name.clone(), source);
            }
        } else if unaliased_identifier_sources.iter().any(|s| s == first)
            && result.source_columns_set.contains(&name)
        {
            result
                .array_join_result_to_source
                .insert(name.clone(), name.clone());
        }
    });

    if result.array_join_result_to_source.is_empty() {
        synthesize_first_entry(array_join.expressions.first(), result, source_columns)?;
    }
    Ok(())
}

/// The result of ARRAY JOIN is unused; map one column anyway so the row
/// multiplication happens.
fn synthesize_first_entry(
    first: Option<&Expression>,
    result: &mut AnalysisResult,
    source_columns: &[Column],
) -> Result<()> {
    let Some(expr) = first else {
        return Ok(());
    };
    let source_name = expr.column_name();
    let result_name = expr.alias_or_column_name();

    let is_plain_array = expr.as_identifier().is_none()
        || result.source_columns_set.contains(&source_name);
    if is_plain_array {
        result
            .array_join_result_to_source
            .insert(result_name, source_name);
        return Ok(());
    }

    // a nested table: map every subcolumn under the prefix
    let mut found = false;
    for column in source_columns {
        let (first_part, rest) = split_nested(&column.name);
        if first_part == source_name && !rest.is_empty() {
            result.array_join_result_to_source.insert(
                concat_nested(&result_name, rest),
                column.name.clone(),
            );
            found = true;
        }
    }
    if !found {
        return Err(Error::EmptyNestedTable { name: source_name });
    }
    Ok(())
}
