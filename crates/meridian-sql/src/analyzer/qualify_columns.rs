//! Qualified-name translation and asterisk expansion.
//!
//! Brings every column reference into its normal form against the FROM
//! tables:
//!
//! - `*` expands to every column of every FROM table, in FROM order.
//! - `t.*` expands to the columns of table `t` (or its alias).
//! - `db.tbl.col`, `tbl.col` and `alias.col` resolve against the table list.
//!   References to the first (left) table are stripped down to the bare
//!   column name; references to a joined table keep their qualifier exactly
//!   when the bare name would clash with a left-table column, matching the
//!   qualified names the join analysis assigns to the joined columns.
//! - Single-part identifiers are left untouched: they are either already in
//!   normal form or they name an alias, which the normalizer resolves.
//!
//! The `remove_duplicates` pre-step renames SELECT elements that share an
//! output name (`name_1`, `name_2`, ...) so later pruning keeps the column
//! count stable.

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::expressions::{Expression, Identifier, SelectQuery};
use crate::schema::TableWithColumns;
use crate::traversal::walk_select_mut;

/// Rename SELECT-list elements sharing an output name so each name is
/// assigned once. The clone before re-aliasing keeps structurally equal
/// expressions from fusing into one output column.
pub fn rename_duplicated_columns(query: &mut SelectQuery) {
    let mut all_names: HashSet<String> = query
        .select
        .iter()
        .map(Expression::alias_or_column_name)
        .collect();
    let mut assigned: HashSet<String> = HashSet::new();

    for expr in &mut query.select {
        let name = expr.alias_or_column_name();
        if assigned.insert(name.clone()) {
            continue;
        }
        let mut suffix = 1;
        let mut candidate = format!("{}_{}", name, suffix);
        while all_names.contains(&candidate) {
            suffix += 1;
            candidate = format!("{}_{}", name, suffix);
        }
        let mut renamed = expr.clone();
        renamed.set_alias(Some(candidate.clone()));
        *expr = renamed;
        all_names.insert(candidate.clone());
        assigned.insert(candidate);
    }
}

/// Translate qualified names and expand asterisks across the whole query.
///
/// # Arguments
/// * `query` - the SELECT to rewrite in place
/// * `source_columns` - names available from the left table before pruning
/// * `tables` - the FROM tables with their columns, in FROM order
///
/// # Errors
/// [`Error::UnknownIdentifier`] for a qualifier or compound name that matches
/// no table, and [`Error::EmptyColumnsList`] when the SELECT list is empty
/// after expansion.
pub fn translate_qualified_names(
    query: &mut SelectQuery,
    source_columns: &HashSet<String>,
    tables: &[TableWithColumns],
) -> Result<()> {
    expand_asterisks(query, tables)?;

    let mut failure = None;
    walk_select_mut(query, false, &mut |node| {
        if failure.is_none() {
            let rendered = node.column_name();
            if let Expression::Identifier(ident) = node {
                failure = translate_identifier(ident, source_columns, tables, rendered).err();
            }
        }
    });
    if let Some(err) = failure {
        return Err(err);
    }

    if query.select.is_empty() {
        return Err(Error::EmptyColumnsList);
    }
    Ok(())
}

fn translate_identifier(
    ident: &mut Identifier,
    source_columns: &HashSet<String>,
    tables: &[TableWithColumns],
    rendered: String,
) -> Result<()> {
    if ident.table_marker || ident.is_short() {
        return Ok(());
    }

    // (db, table, col)
    if ident.parts.len() == 3 {
        let db_table = format!("{}.{}", ident.parts[0], ident.parts[1]);
        if let Some(position) = tables.iter().position(|t| t.matches_qualifier(&db_table)) {
            normalize_against(ident, 2, position, tables, source_columns);
            return Ok(());
        }
    }

    // (table-or-alias, col...)
    let first = ident.parts[0].clone();
    if let Some(position) = tables.iter().position(|t| t.matches_qualifier(&first)) {
        normalize_against(ident, 1, position, tables, source_columns);
        return Ok(());
    }

    // nested column whose full dotted name is a source column
    if source_columns.contains(&ident.name()) {
        return Ok(());
    }

    Err(Error::unknown_identifier(ident.name(), rendered))
}

/// Strip `qualifier_parts` name parts, then re-qualify joined-table columns
/// whose bare name clashes with a left-table column.
fn normalize_against(
    ident: &mut Identifier,
    qualifier_parts: usize,
    table_position: usize,
    tables: &[TableWithColumns],
    source_columns: &HashSet<String>,
) {
    ident.strip_qualifier(qualifier_parts);
    if table_position == 0 {
        return;
    }
    let column = ident.name();
    if source_columns.contains(&column) {
        let prefix = tables[table_position].qualified_prefix();
        let alias = ident.alias.take();
        *ident = Identifier::new(format!("{}{}", prefix, column));
        ident.alias = alias;
    }
}

fn expand_asterisks(query: &mut SelectQuery, tables: &[TableWithColumns]) -> Result<()> {
    let mut expanded = Vec::with_capacity(query.select.len());
    for expr in query.select.drain(..) {
        match expr {
            Expression::Asterisk => {
                for table in tables {
                    for column in &table.columns {
                        expanded.push(Expression::Identifier(Identifier::new(&column.name)));
                    }
                }
            }
            Expression::QualifiedAsterisk(q) => {
                let table = tables
                    .iter()
                    .find(|t| t.matches_qualifier(&q.qualifier))
                    .ok_or_else(|| {
                        Error::unknown_identifier(&q.qualifier, format!("{}.*", q.qualifier))
                    })?;
                for column in &table.columns {
                    expanded.push(Expression::Identifier(Identifier::new(&column.name)));
                }
            }
            other => expanded.push(other),
        }
    }
    query.select = expanded;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::*;
    use crate::schema::{Column, DataType};

    fn hits_tables() -> Vec<TableWithColumns> {
        vec![TableWithColumns::new(
            "hits",
            vec![
                Column::new("x", DataType::UInt64),
                Column::new("y", DataType::String),
            ],
        )]
    }

    fn source_set() -> HashSet<String> {
        ["x", "y"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_asterisk_expands_in_from_order() {
        let mut query = select(vec![asterisk()]).from("hits").build();
        translate_qualified_names(&mut query, &source_set(), &hits_tables()).unwrap();
        let names: Vec<String> = query.select.iter().map(|e| e.column_name()).collect();
        assert_eq!(names, vec!["x", "y"]);
    }

    #[test]
    fn test_qualified_asterisk_expands_one_table() {
        let tables = vec![
            TableWithColumns::new("a", vec![Column::new("k", DataType::UInt64)]),
            TableWithColumns::new("b", vec![Column::new("v", DataType::UInt64)]),
        ];
        let source: HashSet<String> = ["k"].iter().map(|s| s.to_string()).collect();
        let mut query = select(vec![qualified_asterisk("b")])
            .from("a")
            .join_using(crate::expressions::JoinKind::Inner, table("b"), vec![col("k")])
            .build();
        translate_qualified_names(&mut query, &source, &tables).unwrap();
        let names: Vec<String> = query.select.iter().map(|e| e.column_name()).collect();
        assert_eq!(names, vec!["v"]);
    }

    #[test]
    fn test_left_table_qualifier_is_stripped() {
        let mut query = select(vec![col("hits.x")]).from("hits").build();
        translate_qualified_names(&mut query, &source_set(), &hits_tables()).unwrap();
        assert_eq!(query.select[0].column_name(), "x");
    }

    #[test]
    fn test_joined_table_clash_keeps_qualifier() {
        let tables = vec![
            TableWithColumns::new("a", vec![Column::new("k", DataType::UInt64)]),
            TableWithColumns::new("b", vec![Column::new("k", DataType::UInt64)]),
        ];
        let source: HashSet<String> = ["k"].iter().map(|s| s.to_string()).collect();
        let mut query = select(vec![col("a.k"), col("b.k")])
            .from("a")
            .join_on(
                crate::expressions::JoinKind::Inner,
                table("b"),
                func("equals", vec![col("a.k"), col("b.k")]),
            )
            .build();
        translate_qualified_names(&mut query, &source, &tables).unwrap();
        assert_eq!(query.select[0].column_name(), "k");
        assert_eq!(query.select[1].column_name(), "b.k");
    }

    #[test]
    fn test_nested_column_is_left_alone() {
        let source: HashSet<String> = ["nest.x"].iter().map(|s| s.to_string()).collect();
        let tables = vec![TableWithColumns::new(
            "t",
            vec![Column::new("nest.x", DataType::UInt64)],
        )];
        let mut query = select(vec![col("nest.x")]).from("t").build();
        translate_qualified_names(&mut query, &source, &tables).unwrap();
        assert_eq!(query.select[0].column_name(), "nest.x");
    }

    #[test]
    fn test_unknown_qualifier_fails() {
        let mut query = select(vec![col("zzz.x")]).from("hits").build();
        let err = translate_qualified_names(&mut query, &source_set(), &hits_tables()).unwrap_err();
        assert!(matches!(err, Error::UnknownIdentifier { .. }));
    }

    #[test]
    fn test_empty_select_after_expansion_fails() {
        let mut query = select(vec![asterisk()]).from("empty").build();
        let err = translate_qualified_names(
            &mut query,
            &HashSet::new(),
            &[TableWithColumns::new("empty", vec![])],
        )
        .unwrap_err();
        assert_eq!(err, Error::EmptyColumnsList);
    }

    #[test]
    fn test_rename_duplicated_columns() {
        let mut query = select(vec![aliased(lit(1u64), "a"), col("a"), col("b")])
            .from("t")
            .build();
        rename_duplicated_columns(&mut query);
        let names: Vec<String> = query
            .select
            .iter()
            .map(|e| e.alias_or_column_name())
            .collect();
        assert_eq!(names, vec!["a", "a_1", "b"]);
    }

    #[test]
    fn test_rename_skips_taken_suffixes() {
        let mut query = select(vec![
            aliased(lit(1u64), "a"),
            aliased(lit(2u64), "a_1"),
            col("a"),
        ])
        .build();
        rename_duplicated_columns(&mut query);
        let names: Vec<String> = query
            .select
            .iter()
            .map(|e| e.alias_or_column_name())
            .collect();
        assert_eq!(names, vec!["a", "a_1", "a_2"]);
    }

    #[test]
    fn test_rename_is_idempotent() {
        let mut query = select(vec![aliased(lit(1u64), "a"), col("a")]).build();
        rename_duplicated_columns(&mut query);
        let once: Vec<String> = query.select.iter().map(|e| e.alias_or_column_name()).collect();
        rename_duplicated_columns(&mut query);
        let twice: Vec<String> = query.select.iter().map(|e| e.alias_or_column_name()).collect();
        assert_eq!(once, twice);
    }
}
