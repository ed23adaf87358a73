//! SQL Expression AST.
//!
//! This module defines the AST node types the analyzer operates on. The
//! central type is [`Expression`], a tagged enum with one variant per SQL
//! construct; inner structs carry the fields for each variant and non-trivial
//! payloads are boxed to keep the enum small.
//!
//! # Variant Groups
//!
//! | Group | Examples | Purpose |
//! |---|---|---|
//! | **Names** | `Identifier`, `Asterisk`, `QualifiedAsterisk` | Column and table references |
//! | **Values** | `Literal` | Typed constants |
//! | **Calls** | `Function` | Scalar and aggregate calls; operators are functions (`equals`, `and`, ...) |
//! | **Queries** | `Subquery` | A SELECT used in a scalar expression position |
//!
//! [`SelectQuery`] is a separate struct rather than an `Expression` variant:
//! statements and expressions never substitute for one another in this
//! engine, so the distinction is made in the type system. Subquery bodies
//! (scalar contexts and derived tables) hold a `SelectQuery` by value.
//!
//! # Ownership
//!
//! Every node exclusively owns its children. Rewrites mutate in place through
//! `&mut` or reconstruct subtrees; structurally equal subtrees (`PartialEq`)
//! act as a single identity after normalization, with clone-on-write where a
//! rewrite must diverge.
//!
//! # Rendering
//!
//! Every node renders back to SQL text via `Display`. Rendering is used for
//! error diagnostics, dedup keys, and subquery fingerprints, so it is stable
//! and canonical: one space after commas, operators in function form.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A typed constant value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Null,
    Bool(bool),
    UInt64(u64),
    Int64(i64),
    Float64(f64),
    String(String),
    Tuple(Vec<Value>),
}

impl Value {
    /// Truthiness used by constant-IF folding: `NULL` and zero are false,
    /// any other value is true. `None` when the value cannot decide a branch.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::UInt64(n) => Some(*n != 0),
            Value::Int64(n) => Some(*n != 0),
            Value::Null => Some(false),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", if *b { "1" } else { "0" }),
            Value::UInt64(n) => write!(f, "{}", n),
            Value::Int64(n) => write!(f, "{}", n),
            Value::Float64(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
            Value::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// A possibly dotted name of one to three parts (`col`, `tbl.col`,
/// `db.tbl.col`), with an optional alias.
///
/// `table_marker` is set by the mark-table-identifiers step for identifiers
/// that name a table rather than a column (the right argument of `IN`-family
/// functions); the normalizer never substitutes aliases into marked
/// identifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identifier {
    pub parts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub table_marker: bool,
}

impl Identifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            parts: name.into().split('.').map(str::to_string).collect(),
            alias: None,
            table_marker: false,
        }
    }

    pub fn from_parts(parts: Vec<String>) -> Self {
        Self {
            parts,
            alias: None,
            table_marker: false,
        }
    }

    /// The full dotted name.
    pub fn name(&self) -> String {
        self.parts.join(".")
    }

    /// The last name part.
    pub fn short_name(&self) -> &str {
        self.parts.last().map(String::as_str).unwrap_or("")
    }

    /// Whether the name has a single part.
    pub fn is_short(&self) -> bool {
        self.parts.len() == 1
    }

    /// Drop the first `count` parts, keeping the rest as the column name.
    pub fn strip_qualifier(&mut self, count: usize) {
        self.parts.drain(..count.min(self.parts.len().saturating_sub(1)));
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A typed constant with an optional alias.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Literal {
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl Literal {
    pub fn new(value: Value) -> Self {
        Self { value, alias: None }
    }
}

/// A function call: name plus ordered arguments. Operators (`and`, `or`,
/// `equals`, `less`, ...) are represented as functions in canonical name
/// form, exactly as the parser emits them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub args: Vec<Expression>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl Function {
    pub fn new(name: impl Into<String>, args: Vec<Expression>) -> Self {
        Self {
            name: name.into(),
            args,
            alias: None,
        }
    }
}

/// A SELECT used in a scalar expression position (inside a comparison, as a
/// function argument, as the right side of `IN`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subquery {
    pub query: SelectQuery,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

/// `t.*` / `db.t.*` in a SELECT list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualifiedAsterisk {
    pub qualifier: String,
}

/// Any SQL expression recognized by the analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expression {
    Identifier(Identifier),
    Literal(Literal),
    Function(Box<Function>),
    Asterisk,
    QualifiedAsterisk(QualifiedAsterisk),
    Subquery(Box<Subquery>),
}

impl Expression {
    /// The node's alias, if the node kind can carry one.
    pub fn alias(&self) -> Option<&str> {
        match self {
            Expression::Identifier(ident) => ident.alias.as_deref(),
            Expression::Literal(lit) => lit.alias.as_deref(),
            Expression::Function(func) => func.alias.as_deref(),
            Expression::Subquery(subquery) => subquery.alias.as_deref(),
            _ => None,
        }
    }

    /// Set or clear the node's alias. Alias-less node kinds ignore the call.
    pub fn set_alias(&mut self, alias: Option<String>) {
        match self {
            Expression::Identifier(ident) => ident.alias = alias,
            Expression::Literal(lit) => lit.alias = alias,
            Expression::Function(func) => func.alias = alias,
            Expression::Subquery(subquery) => subquery.alias = alias,
            _ => {}
        }
    }

    /// The canonical column name of this expression, ignoring any alias.
    pub fn column_name(&self) -> String {
        match self {
            Expression::Identifier(ident) => ident.name(),
            Expression::Literal(lit) => lit.value.to_string(),
            Expression::Function(func) => {
                let args: Vec<String> = func.args.iter().map(|a| a.column_name()).collect();
                format!("{}({})", func.name, args.join(", "))
            }
            Expression::Asterisk => "*".to_string(),
            Expression::QualifiedAsterisk(q) => format!("{}.*", q.qualifier),
            Expression::Subquery(subquery) => format!("({})", subquery.query),
        }
    }

    /// The alias if set, otherwise the canonical column name. This is the
    /// output name of a SELECT-list element.
    pub fn alias_or_column_name(&self) -> String {
        match self.alias() {
            Some(alias) => alias.to_string(),
            None => self.column_name(),
        }
    }

    pub fn as_identifier(&self) -> Option<&Identifier> {
        match self {
            Expression::Identifier(ident) => Some(ident),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Expression::Literal(lit) => Some(lit),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Expression::Function(func) => Some(func),
            _ => None,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Expression::Literal(_))
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.column_name())?;
        if let Some(alias) = self.alias() {
            write!(f, " AS {}", alias)?;
        }
        Ok(())
    }
}

/// How a joined table relates to the rows of the left side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

impl fmt::Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            JoinKind::Inner => "INNER",
            JoinKind::Left => "LEFT",
            JoinKind::Right => "RIGHT",
            JoinKind::Full => "FULL",
            JoinKind::Cross => "CROSS",
        };
        write!(f, "{}", text)
    }
}

/// How many matching rows of the right side each left row joins with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JoinStrictness {
    #[default]
    Unspecified,
    All,
    Any,
    Asof,
    Semi,
    Anti,
    RightAny,
}

/// The join clause attached to a FROM chain element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableJoin {
    pub kind: JoinKind,
    #[serde(default)]
    pub strictness: JoinStrictness,
    /// `USING (k1, k2, ...)`; mutually exclusive with `on`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub using_keys: Option<Vec<Expression>>,
    /// The `ON` condition; mutually exclusive with `using_keys`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<Expression>,
}

impl TableJoin {
    pub fn new(kind: JoinKind) -> Self {
        Self {
            kind,
            strictness: JoinStrictness::Unspecified,
            using_keys: None,
            on: None,
        }
    }
}

/// A `db.table` reference in FROM, with an optional alias.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableIdentifier {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl TableIdentifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            database: None,
            name: name.into(),
            alias: None,
        }
    }

    /// Whether the name is a bare single-part table name.
    pub fn is_short(&self) -> bool {
        self.database.is_none()
    }
}

impl fmt::Display for TableIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(database) = &self.database {
            write!(f, "{}.", database)?;
        }
        write!(f, "{}", self.name)?;
        if let Some(alias) = &self.alias {
            write!(f, " AS {}", alias)?;
        }
        Ok(())
    }
}

/// A derived table: `(SELECT ...) AS alias`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSubquery {
    pub query: Box<SelectQuery>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

/// A table-function call: `numbers(10) AS n`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableFunction {
    pub function: Function,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

/// One source in the FROM chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableExpression {
    Table(TableIdentifier),
    Subquery(TableSubquery),
    TableFunction(TableFunction),
}

impl fmt::Display for TableExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableExpression::Table(table) => write!(f, "{}", table),
            TableExpression::Subquery(subquery) => {
                write!(f, "({})", subquery.query)?;
                if let Some(alias) = &subquery.alias {
                    write!(f, " AS {}", alias)?;
                }
                Ok(())
            }
            TableExpression::TableFunction(tf) => {
                let args: Vec<String> = tf.function.args.iter().map(|a| a.column_name()).collect();
                write!(f, "{}({})", tf.function.name, args.join(", "))?;
                if let Some(alias) = &tf.alias {
                    write!(f, " AS {}", alias)?;
                }
                Ok(())
            }
        }
    }
}

/// One element of the FROM/JOIN chain. The first element has no join clause;
/// each later element records how it attaches to what precedes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TablesElement {
    pub table: TableExpression,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join: Option<TableJoin>,
}

/// The `ARRAY JOIN` clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayJoin {
    /// `LEFT ARRAY JOIN` keeps rows with empty arrays
    #[serde(default)]
    pub left: bool,
    pub expressions: Vec<Expression>,
}

/// One element of `ORDER BY`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderByElement {
    pub expr: Expression,
    #[serde(default)]
    pub descending: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nulls_first: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collation: Option<String>,
}

impl OrderByElement {
    pub fn ascending(expr: Expression) -> Self {
        Self {
            expr,
            descending: false,
            nulls_first: None,
            collation: None,
        }
    }
}

/// `LIMIT n BY expressions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitByClause {
    pub length: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    pub expressions: Vec<Expression>,
}

/// `LIMIT n [OFFSET m]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitClause {
    pub length: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
}

/// A complete SELECT statement as seen by the analyzer.
///
/// Clauses are owned options in query order. The `settings` list is the
/// query-level `SETTINGS k = v` tail; its presence pins the query's observable
/// behavior, so clause optimizers that would change row order or duplicate
/// visibility refuse to touch queries that carry one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SelectQuery {
    #[serde(default)]
    pub distinct: bool,
    pub select: Vec<Expression>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tables: Vec<TablesElement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array_join: Option<ArrayJoin>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prewhere: Option<Expression>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub where_clause: Option<Expression>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_by: Option<Vec<Expression>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub having: Option<Expression>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<Vec<OrderByElement>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_by: Option<LimitByClause>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<LimitClause>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Vec<(String, Value)>>,
}

impl SelectQuery {
    /// The first join element of the FROM chain, if any.
    pub fn join_element(&self) -> Option<&TablesElement> {
        self.tables.iter().find(|e| e.join.is_some())
    }

    pub fn join_element_mut(&mut self) -> Option<&mut TablesElement> {
        self.tables.iter_mut().find(|e| e.join.is_some())
    }

    /// The first table expression of the FROM chain.
    pub fn first_table(&self) -> Option<&TableExpression> {
        self.tables.first().map(|e| &e.table)
    }

    /// Whether the query carries a query-level SETTINGS tail.
    pub fn has_settings(&self) -> bool {
        self.settings.as_ref().is_some_and(|s| !s.is_empty())
    }
}

impl fmt::Display for SelectQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT ")?;
        if self.distinct {
            write!(f, "DISTINCT ")?;
        }
        for (i, expr) in self.select.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", expr)?;
        }
        for (i, element) in self.tables.iter().enumerate() {
            match &element.join {
                None if i == 0 => write!(f, " FROM {}", element.table)?,
                None => write!(f, ", {}", element.table)?,
                Some(join) => {
                    write!(f, " ")?;
                    match join.strictness {
                        JoinStrictness::Unspecified => {}
                        JoinStrictness::All => write!(f, "ALL ")?,
                        JoinStrictness::Any => write!(f, "ANY ")?,
                        JoinStrictness::Asof => write!(f, "ASOF ")?,
                        JoinStrictness::Semi => write!(f, "SEMI ")?,
                        JoinStrictness::Anti => write!(f, "ANTI ")?,
                        JoinStrictness::RightAny => write!(f, "RIGHT_ANY ")?,
                    }
                    write!(f, "{} JOIN {}", join.kind, element.table)?;
                    if let Some(keys) = &join.using_keys {
                        let names: Vec<String> = keys.iter().map(|k| k.column_name()).collect();
                        write!(f, " USING ({})", names.join(", "))?;
                    }
                    if let Some(on) = &join.on {
                        write!(f, " ON {}", on.column_name())?;
                    }
                }
            }
        }
        if let Some(array_join) = &self.array_join {
            if array_join.left {
                write!(f, " LEFT")?;
            }
            write!(f, " ARRAY JOIN ")?;
            for (i, expr) in array_join.expressions.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", expr)?;
            }
        }
        if let Some(prewhere) = &self.prewhere {
            write!(f, " PREWHERE {}", prewhere.column_name())?;
        }
        if let Some(where_clause) = &self.where_clause {
            write!(f, " WHERE {}", where_clause.column_name())?;
        }
        if let Some(group_by) = &self.group_by {
            let keys: Vec<String> = group_by.iter().map(|k| k.column_name()).collect();
            write!(f, " GROUP BY {}", keys.join(", "))?;
        }
        if let Some(having) = &self.having {
            write!(f, " HAVING {}", having.column_name())?;
        }
        if let Some(order_by) = &self.order_by {
            write!(f, " ORDER BY ")?;
            for (i, element) in order_by.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", element.expr.column_name())?;
                if element.descending {
                    write!(f, " DESC")?;
                }
                if let Some(nulls_first) = element.nulls_first {
                    write!(f, " NULLS {}", if nulls_first { "FIRST" } else { "LAST" })?;
                }
                if let Some(collation) = &element.collation {
                    write!(f, " COLLATE '{}'", collation)?;
                }
            }
        }
        if let Some(limit_by) = &self.limit_by {
            write!(f, " LIMIT {}", limit_by.length)?;
            if let Some(offset) = limit_by.offset {
                write!(f, " OFFSET {}", offset)?;
            }
            let names: Vec<String> = limit_by.expressions.iter().map(|e| e.column_name()).collect();
            write!(f, " BY {}", names.join(", "))?;
        }
        if let Some(limit) = &self.limit {
            write!(f, " LIMIT {}", limit.length)?;
            if let Some(offset) = limit.offset {
                write!(f, " OFFSET {}", offset)?;
            }
        }
        if let Some(settings) = &self.settings {
            if !settings.is_empty() {
                write!(f, " SETTINGS ")?;
                for (i, (name, value)) in settings.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} = {}", name, value)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::*;

    #[test]
    fn test_identifier_parts() {
        let ident = Identifier::new("db.tbl.col");
        assert_eq!(ident.parts.len(), 3);
        assert_eq!(ident.name(), "db.tbl.col");
        assert_eq!(ident.short_name(), "col");
        assert!(!ident.is_short());
    }

    #[test]
    fn test_strip_qualifier() {
        let mut ident = Identifier::new("db.tbl.col");
        ident.strip_qualifier(2);
        assert_eq!(ident.name(), "col");
        // never strips away the last part
        let mut ident = Identifier::new("col");
        ident.strip_qualifier(1);
        assert_eq!(ident.name(), "col");
    }

    #[test]
    fn test_alias_or_column_name() {
        let mut expr = func("plus", vec![col("a"), lit(1u64)]);
        assert_eq!(expr.column_name(), "plus(a, 1)");
        assert_eq!(expr.alias_or_column_name(), "plus(a, 1)");
        expr.set_alias(Some("s".to_string()));
        assert_eq!(expr.alias_or_column_name(), "s");
        assert_eq!(expr.column_name(), "plus(a, 1)");
    }

    #[test]
    fn test_value_truthiness() {
        assert_eq!(Value::UInt64(0).as_bool(), Some(false));
        assert_eq!(Value::Int64(-3).as_bool(), Some(true));
        assert_eq!(Value::Null.as_bool(), Some(false));
        assert_eq!(Value::String("x".into()).as_bool(), None);
    }

    #[test]
    fn test_select_rendering() {
        let query = select(vec![col("x"), aliased(func("plus", vec![col("y"), lit(1u64)]), "s")])
            .from("t")
            .where_(func("equals", vec![col("x"), lit(10u64)]))
            .build();
        assert_eq!(
            query.to_string(),
            "SELECT x, plus(y, 1) AS s FROM t WHERE equals(x, 10)"
        );
    }

    #[test]
    fn test_string_literal_escaping() {
        assert_eq!(Value::String("it's".into()).to_string(), "'it\\'s'");
    }

    #[test]
    fn test_serde_round_trip() {
        let query = select(vec![col("a")])
            .from("t")
            .order_by(vec![OrderByElement::ascending(col("a"))])
            .build();
        let json = serde_json::to_string(&query).unwrap();
        let back: SelectQuery = serde_json::from_str(&json).unwrap();
        assert_eq!(query, back);
    }
}
