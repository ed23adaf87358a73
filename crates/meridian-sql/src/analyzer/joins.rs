//! Join analysis.
//!
//! Three steps around the (single) JOIN of a SELECT:
//!
//! - **Strictness defaulting** -- a non-CROSS join written without ANY/ALL
//!   takes the `join_default_strictness` setting; an empty setting is an
//!   error. The `any_join_distinct_right_table_keys` compatibility switch
//!   restores the historical ANY semantics (`ANY INNER` becomes `SEMI LEFT`,
//!   remaining `ANY` becomes `RightAny`); under the current semantics
//!   `ANY FULL` is rejected outright.
//! - **Right-table isolation** -- before name resolution, a bare unaliased
//!   single-part table on the right side is rewritten to
//!   `(SELECT * FROM t) AS t`. The derived table exposes a stable alias and
//!   isolates the right-side projection so predicates can be pushed into it.
//!   Aliased and database-qualified tables cannot be rewritten without
//!   changing name resolution, and CROSS JOIN predicates must not move.
//! - **Key collection** -- `USING` keys apply to both sides verbatim. An
//!   `ON` expression is split on top-level AND; every conjunct must be an
//!   equality between one side and the other. ASOF joins allow exactly one
//!   trailing inequality, stored separately as the inequality key.
//!
//! [`AnalyzedJoin`] is the join slice of the analysis result: the key lists,
//! the joined table's columns (qualified where they clash with left-table
//! names), and the subset of joined columns the query actually uses.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::builder;
use crate::error::{Error, Result};
use crate::expressions::{
    Expression, JoinKind, JoinStrictness, SelectQuery, TableExpression, TableJoin, TableSubquery,
};
use crate::schema::{Column, TableWithColumns};
use crate::settings::DefaultJoinStrictness;
use crate::traversal::walk_expr;

/// Join metadata collected by the analyzer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyzedJoin {
    /// The join clause after strictness defaulting; `None` without a JOIN.
    pub table_join: Option<TableJoin>,
    /// Equi-join key names, left side.
    pub key_names_left: Vec<String>,
    /// Equi-join key names, right side, index-aligned with the left.
    pub key_names_right: Vec<String>,
    /// The inequality function of an ASOF join, oriented left-to-right.
    pub asof_inequality: Option<String>,
    /// Every column the joined table offers, qualified where the bare name
    /// clashes with a left-table column.
    pub columns_from_joined_table: Vec<Column>,
    /// Joined columns the query references outside JOIN ON.
    pub joined_columns: Vec<Column>,
    /// Whether keys came from USING.
    pub has_using: bool,
}

impl AnalyzedJoin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one USING key, applying to both sides.
    pub fn add_using_key(&mut self, key: &Expression) {
        let name = key.alias_or_column_name();
        self.key_names_left.push(name.clone());
        self.key_names_right.push(name);
        self.has_using = true;
    }

    /// Record one equi-join key pair from ON.
    pub fn add_on_key_pair(&mut self, left: String, right: String) {
        self.key_names_left.push(left);
        self.key_names_right.push(right);
    }

    /// How often `name` occurs among the right-side keys.
    pub fn right_key_inclusion(&self, name: &str) -> usize {
        self.key_names_right.iter().filter(|k| *k == name).count()
    }

    pub fn add_joined_column(&mut self, column: Column) {
        self.joined_columns.push(column);
    }

    /// Seed the joined table's column list, renaming columns whose bare name
    /// clashes with a left-table column (or repeats within the right table)
    /// to `prefix + name`.
    pub fn seed_columns_from_joined_table(
        &mut self,
        columns: Vec<Column>,
        source_columns: &HashSet<String>,
        prefix: &str,
    ) {
        let mut seen: HashSet<String> = HashSet::new();
        self.columns_from_joined_table = columns
            .into_iter()
            .map(|mut column| {
                if source_columns.contains(&column.name) || !seen.insert(column.name.clone()) {
                    column.name = format!("{}{}", prefix, column.name);
                }
                column
            })
            .collect();
    }
}

/// Rewrite the right side of the JOIN to `(SELECT * FROM t) AS t` when it is
/// a bare unaliased short table name and the join is not CROSS.
pub fn replace_joined_table(query: &mut SelectQuery) {
    let Some(element) = query.join_element_mut() else {
        return;
    };
    let Some(join) = &element.join else {
        return;
    };
    if join.kind == JoinKind::Cross {
        return;
    }
    let TableExpression::Table(table) = &element.table else {
        return;
    };
    if table.alias.is_some() || !table.is_short() {
        return;
    }
    let name = table.name.clone();
    let inner = builder::select(vec![builder::asterisk()]).from(&name).build();
    element.table = TableExpression::Subquery(TableSubquery {
        query: Box::new(inner),
        alias: Some(name),
    });
}

/// Apply the default strictness and the old-ANY compatibility rewrites.
/// Stores the final join clause into `analyzed.table_join`.
pub fn set_join_strictness(
    query: &mut SelectQuery,
    default: DefaultJoinStrictness,
    old_any: bool,
    analyzed: &mut AnalyzedJoin,
) -> Result<()> {
    let Some(element) = query.join_element_mut() else {
        return Ok(());
    };
    let Some(join) = &mut element.join else {
        return Ok(());
    };

    if join.strictness == JoinStrictness::Unspecified && join.kind != JoinKind::Cross {
        join.strictness = match default {
            DefaultJoinStrictness::Any => JoinStrictness::Any,
            DefaultJoinStrictness::All => JoinStrictness::All,
            DefaultJoinStrictness::Empty => return Err(Error::ExpectedAllOrAny),
        };
    }

    if old_any {
        if join.strictness == JoinStrictness::Any && join.kind == JoinKind::Inner {
            join.strictness = JoinStrictness::Semi;
            join.kind = JoinKind::Left;
        }
        if join.strictness == JoinStrictness::Any {
            join.strictness = JoinStrictness::RightAny;
        }
    } else if join.strictness == JoinStrictness::Any && join.kind == JoinKind::Full {
        return Err(Error::not_implemented("ANY FULL JOIN"));
    }

    analyzed.table_join = Some(join.clone());
    Ok(())
}

/// Collect the equi-join keys from USING or ON.
pub fn collect_join_keys(
    analyzed: &mut AnalyzedJoin,
    query: &SelectQuery,
    tables: &[TableWithColumns],
) -> Result<()> {
    let Some(element) = query.join_element() else {
        return Ok(());
    };
    let Some(join) = &element.join else {
        return Ok(());
    };

    if let Some(keys) = &join.using_keys {
        for key in keys {
            analyzed.add_using_key(key);
        }
        return Ok(());
    }

    let Some(on) = &join.on else {
        return Ok(());
    };
    let is_asof = join.strictness == JoinStrictness::Asof;
    collect_on_keys(analyzed, on, tables, is_asof)
}

fn collect_on_keys(
    analyzed: &mut AnalyzedJoin,
    on: &Expression,
    tables: &[TableWithColumns],
    is_asof: bool,
) -> Result<()> {
    let mut conjuncts = Vec::new();
    split_conjuncts(on, &mut conjuncts);

    let invalid = || Error::InvalidJoinOnExpression {
        expression: on.column_name(),
    };

    let mut asof_pair: Option<(String, String, String)> = None;
    let mut found_equality = false;

    for (index, conjunct) in conjuncts.iter().enumerate() {
        let Some(func) = conjunct.as_function() else {
            return Err(invalid());
        };
        if func.args.len() != 2 {
            return Err(invalid());
        }
        let lhs = &func.args[0];
        let rhs = &func.args[1];

        match func.name.as_str() {
            "equals" => {
                let (left, right) = orient_sides(lhs, rhs, tables).ok_or_else(invalid)?;
                analyzed.add_on_key_pair(left, right);
                found_equality = true;
            }
            "less" | "greater" | "lessOrEquals" | "greaterOrEquals" => {
                // only ASOF admits an inequality, and only as the final conjunct
                if !is_asof || index + 1 != conjuncts.len() || asof_pair.is_some() {
                    return Err(invalid());
                }
                let lhs_side = expression_side(lhs, tables);
                let operator = match lhs_side {
                    Some(1) => func.name.clone(),
                    Some(2) => mirror_inequality(&func.name),
                    _ => return Err(invalid()),
                };
                let (left, right) = orient_sides(lhs, rhs, tables).ok_or_else(invalid)?;
                asof_pair = Some((left, right, operator));
            }
            _ => return Err(invalid()),
        }
    }

    if let Some((left, right, operator)) = asof_pair {
        analyzed.add_on_key_pair(left, right);
        analyzed.asof_inequality = Some(operator);
    } else if !found_equality {
        return Err(invalid());
    }
    Ok(())
}

fn split_conjuncts<'a>(expr: &'a Expression, out: &mut Vec<&'a Expression>) {
    if let Some(func) = expr.as_function() {
        if func.name == "and" {
            for arg in &func.args {
                split_conjuncts(arg, out);
            }
            return;
        }
    }
    out.push(expr);
}

/// Order an operand pair as (left-table expression, right-table expression).
fn orient_sides(
    lhs: &Expression,
    rhs: &Expression,
    tables: &[TableWithColumns],
) -> Option<(String, String)> {
    let lhs_side = expression_side(lhs, tables)?;
    let rhs_side = expression_side(rhs, tables)?;
    match (lhs_side, rhs_side) {
        (1, 2) => Some((lhs.column_name(), rhs.column_name())),
        (2, 1) => Some((rhs.column_name(), lhs.column_name())),
        _ => None,
    }
}

/// Which table an operand belongs to: 1 (left), 2 (right). `None` when the
/// operand has no identifiers, mixes both sides, or cannot be resolved.
fn expression_side(expr: &Expression, tables: &[TableWithColumns]) -> Option<u8> {
    let mut side: Option<u8> = None;
    let mut conflict = false;
    walk_expr(expr, false, &mut |node| {
        let Some(ident) = node.as_identifier() else {
            return;
        };
        if ident.table_marker {
            return;
        }
        let Some(this_side) = identifier_side(ident, tables) else {
            conflict = true;
            return;
        };
        match side {
            None => side = Some(this_side),
            Some(existing) if existing != this_side => conflict = true,
            _ => {}
        }
    });
    if conflict {
        None
    } else {
        side
    }
}

fn identifier_side(
    ident: &crate::expressions::Identifier,
    tables: &[TableWithColumns],
) -> Option<u8> {
    let name = ident.name();
    if !ident.is_short() {
        // a qualified reference names its table directly
        let (first, _) = crate::schema::split_nested(&name);
        for (position, table) in tables.iter().enumerate().take(2) {
            if table.matches_qualifier(first) || table.has_column(&name) {
                return Some(position as u8 + 1);
            }
        }
        return None;
    }
    // unqualified: membership decides, preferring the left table
    for (position, table) in tables.iter().enumerate().take(2) {
        if table.has_column(&name) {
            return Some(position as u8 + 1);
        }
    }
    None
}

fn mirror_inequality(name: &str) -> String {
    match name {
        "less" => "greater",
        "greater" => "less",
        "lessOrEquals" => "greaterOrEquals",
        "greaterOrEquals" => "lessOrEquals",
        other => other,
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::*;
    use crate::schema::DataType;

    fn two_tables() -> Vec<TableWithColumns> {
        vec![
            TableWithColumns::new(
                "a",
                vec![
                    Column::new("k", DataType::UInt64),
                    Column::new("t", DataType::DateTime),
                ],
            ),
            TableWithColumns::new(
                "b",
                vec![
                    Column::new("k2", DataType::UInt64),
                    Column::new("t2", DataType::DateTime),
                ],
            ),
        ]
    }

    fn join_query(on: Expression) -> SelectQuery {
        select(vec![asterisk()])
            .from("a")
            .join_on(JoinKind::Inner, table("b"), on)
            .build()
    }

    #[test]
    fn test_default_strictness_all() {
        let mut query = join_query(func("equals", vec![col("k"), col("k2")]));
        let mut analyzed = AnalyzedJoin::new();
        set_join_strictness(&mut query, DefaultJoinStrictness::All, false, &mut analyzed).unwrap();
        assert_eq!(
            analyzed.table_join.as_ref().unwrap().strictness,
            JoinStrictness::All
        );
    }

    #[test]
    fn test_empty_default_strictness_fails() {
        let mut query = join_query(func("equals", vec![col("k"), col("k2")]));
        let mut analyzed = AnalyzedJoin::new();
        let err = set_join_strictness(
            &mut query,
            DefaultJoinStrictness::Empty,
            false,
            &mut analyzed,
        )
        .unwrap_err();
        assert_eq!(err, Error::ExpectedAllOrAny);
    }

    #[test]
    fn test_cross_join_needs_no_strictness() {
        let mut query = select(vec![asterisk()])
            .from("a")
            .join(table("b"), TableJoin::new(JoinKind::Cross))
            .build();
        let mut analyzed = AnalyzedJoin::new();
        set_join_strictness(
            &mut query,
            DefaultJoinStrictness::Empty,
            false,
            &mut analyzed,
        )
        .unwrap();
        assert_eq!(
            analyzed.table_join.as_ref().unwrap().strictness,
            JoinStrictness::Unspecified
        );
    }

    #[test]
    fn test_old_any_inner_becomes_semi_left() {
        let mut query = join_query(func("equals", vec![col("k"), col("k2")]));
        let mut analyzed = AnalyzedJoin::new();
        set_join_strictness(&mut query, DefaultJoinStrictness::Any, true, &mut analyzed).unwrap();
        let join = analyzed.table_join.as_ref().unwrap();
        assert_eq!(join.kind, JoinKind::Left);
        assert_eq!(join.strictness, JoinStrictness::Semi);
    }

    #[test]
    fn test_old_any_left_becomes_right_any() {
        let mut query = select(vec![asterisk()])
            .from("a")
            .join_on(
                JoinKind::Left,
                table("b"),
                func("equals", vec![col("k"), col("k2")]),
            )
            .build();
        let mut analyzed = AnalyzedJoin::new();
        set_join_strictness(&mut query, DefaultJoinStrictness::Any, true, &mut analyzed).unwrap();
        assert_eq!(
            analyzed.table_join.as_ref().unwrap().strictness,
            JoinStrictness::RightAny
        );
    }

    #[test]
    fn test_any_full_is_rejected() {
        let mut query = select(vec![asterisk()])
            .from("a")
            .join_on(
                JoinKind::Full,
                table("b"),
                func("equals", vec![col("k"), col("k2")]),
            )
            .strictness(JoinStrictness::Any)
            .build();
        let mut analyzed = AnalyzedJoin::new();
        let err = set_join_strictness(&mut query, DefaultJoinStrictness::All, false, &mut analyzed)
            .unwrap_err();
        assert!(matches!(err, Error::NotImplemented { .. }));
    }

    #[test]
    fn test_using_keys_apply_to_both_sides() {
        let mut query = select(vec![asterisk()])
            .from("a")
            .join_using(JoinKind::Inner, table("b"), vec![col("k"), col("v")])
            .build();
        let mut analyzed = AnalyzedJoin::new();
        set_join_strictness(&mut query, DefaultJoinStrictness::All, false, &mut analyzed).unwrap();
        collect_join_keys(&mut analyzed, &query, &two_tables()).unwrap();
        assert_eq!(analyzed.key_names_left, vec!["k", "v"]);
        assert_eq!(analyzed.key_names_right, vec!["k", "v"]);
        assert!(analyzed.has_using);
    }

    #[test]
    fn test_on_equality_collects_oriented_pair() {
        let query = join_query(func("equals", vec![col("k2"), col("k")]));
        let mut analyzed = AnalyzedJoin::new();
        collect_join_keys(&mut analyzed, &query, &two_tables()).unwrap();
        assert_eq!(analyzed.key_names_left, vec!["k"]);
        assert_eq!(analyzed.key_names_right, vec!["k2"]);
    }

    #[test]
    fn test_on_conjunction_collects_all_pairs() {
        let on = func(
            "and",
            vec![
                func("equals", vec![col("k"), col("k2")]),
                func("equals", vec![col("t"), col("t2")]),
            ],
        );
        let query = join_query(on);
        let mut analyzed = AnalyzedJoin::new();
        collect_join_keys(&mut analyzed, &query, &two_tables()).unwrap();
        assert_eq!(analyzed.key_names_left, vec!["k", "t"]);
        assert_eq!(analyzed.key_names_right, vec!["k2", "t2"]);
    }

    #[test]
    fn test_same_side_equality_is_invalid() {
        let query = join_query(func("equals", vec![col("k"), col("t")]));
        let mut analyzed = AnalyzedJoin::new();
        let err = collect_join_keys(&mut analyzed, &query, &two_tables()).unwrap_err();
        assert!(matches!(err, Error::InvalidJoinOnExpression { .. }));
    }

    #[test]
    fn test_disjunction_is_invalid() {
        let on = func(
            "or",
            vec![
                func("equals", vec![col("k"), col("k2")]),
                func("equals", vec![col("t"), col("t2")]),
            ],
        );
        let query = join_query(on);
        let mut analyzed = AnalyzedJoin::new();
        assert!(collect_join_keys(&mut analyzed, &query, &two_tables()).is_err());
    }

    #[test]
    fn test_asof_inequality_is_final_key() {
        let on = func(
            "and",
            vec![
                func("equals", vec![col("k"), col("k2")]),
                func("greaterOrEquals", vec![col("t"), col("t2")]),
            ],
        );
        let mut query = select(vec![asterisk()])
            .from("a")
            .join_on(JoinKind::Inner, table("b"), on)
            .strictness(JoinStrictness::Asof)
            .build();
        let mut analyzed = AnalyzedJoin::new();
        set_join_strictness(&mut query, DefaultJoinStrictness::All, false, &mut analyzed).unwrap();
        collect_join_keys(&mut analyzed, &query, &two_tables()).unwrap();
        assert_eq!(analyzed.key_names_left, vec!["k", "t"]);
        assert_eq!(analyzed.key_names_right, vec!["k2", "t2"]);
        assert_eq!(analyzed.asof_inequality.as_deref(), Some("greaterOrEquals"));
    }

    #[test]
    fn test_non_asof_inequality_is_invalid() {
        let query = join_query(func("less", vec![col("t"), col("t2")]));
        let mut analyzed = AnalyzedJoin::new();
        assert!(collect_join_keys(&mut analyzed, &query, &two_tables()).is_err());
    }

    #[test]
    fn test_replace_joined_table() {
        let mut query = join_query(func("equals", vec![col("k"), col("k2")]));
        replace_joined_table(&mut query);
        let element = query.join_element().unwrap();
        let TableExpression::Subquery(subquery) = &element.table else {
            panic!("expected derived table");
        };
        assert_eq!(subquery.alias.as_deref(), Some("b"));
        assert_eq!(subquery.query.to_string(), "SELECT * FROM b");
    }

    #[test]
    fn test_replace_skips_aliased_table() {
        let mut query = select(vec![asterisk()])
            .from("a")
            .join_on(
                JoinKind::Inner,
                table_aliased("b", "bb"),
                func("equals", vec![col("k"), col("k2")]),
            )
            .build();
        replace_joined_table(&mut query);
        assert!(matches!(
            query.join_element().unwrap().table,
            TableExpression::Table(_)
        ));
    }

    #[test]
    fn test_replace_skips_cross_join() {
        let mut query = select(vec![asterisk()])
            .from("a")
            .join(table("b"), TableJoin::new(JoinKind::Cross))
            .build();
        replace_joined_table(&mut query);
        assert!(matches!(
            query.join_element().unwrap().table,
            TableExpression::Table(_)
        ));
    }

    #[test]
    fn test_replace_skips_qualified_table() {
        let mut query = select(vec![asterisk()])
            .from("a")
            .join_on(
                JoinKind::Inner,
                table_in("db", "b"),
                func("equals", vec![col("k"), col("k2")]),
            )
            .build();
        replace_joined_table(&mut query);
        assert!(matches!(
            query.join_element().unwrap().table,
            TableExpression::Table(_)
        ));
    }

    #[test]
    fn test_seed_columns_qualifies_clashes() {
        let mut analyzed = AnalyzedJoin::new();
        let source: HashSet<String> = ["k".to_string()].into_iter().collect();
        analyzed.seed_columns_from_joined_table(
            vec![
                Column::new("k", DataType::UInt64),
                Column::new("v", DataType::UInt64),
            ],
            &source,
            "b.",
        );
        let names: Vec<&str> = analyzed
            .columns_from_joined_table
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["b.k", "v"]);
    }

    #[test]
    fn test_right_key_inclusion_counts_occurrences() {
        let mut analyzed = AnalyzedJoin::new();
        analyzed.add_on_key_pair("k".into(), "k2".into());
        analyzed.add_on_key_pair("t".into(), "k2".into());
        assert_eq!(analyzed.right_key_inclusion("k2"), 2);
        assert_eq!(analyzed.right_key_inclusion("zz"), 0);
    }
}
