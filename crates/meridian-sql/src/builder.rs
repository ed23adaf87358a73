//! Fluent AST construction helpers.
//!
//! The analyzer receives parsed trees from the engine's parser, which lives
//! outside this crate. The builder provides a programmatic way to construct
//! the same trees: leaf helpers ([`col`], [`lit`], [`func`], [`subquery`]),
//! table helpers ([`table`], [`derived`]), and a fluent [`SelectBuilder`]
//! started with [`select`].
//!
//! ```
//! use meridian_sql::builder::*;
//!
//! // SELECT x, count() FROM hits WHERE equals(region, 'eu') GROUP BY x
//! let query = select(vec![col("x"), func("count", vec![])])
//!     .from("hits")
//!     .where_(func("equals", vec![col("region"), lit("eu")]))
//!     .group_by(vec![col("x")])
//!     .build();
//! ```

use crate::expressions::*;

/// Convert plain Rust values into AST [`Value`]s.
pub trait IntoValue {
    fn into_value(self) -> Value;
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl IntoValue for u64 {
    fn into_value(self) -> Value {
        Value::UInt64(self)
    }
}

impl IntoValue for i64 {
    fn into_value(self) -> Value {
        Value::Int64(self)
    }
}

impl IntoValue for f64 {
    fn into_value(self) -> Value {
        Value::Float64(self)
    }
}

impl IntoValue for bool {
    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::String(self.to_string())
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::String(self)
    }
}

/// A column (or dotted) identifier expression.
pub fn col(name: &str) -> Expression {
    Expression::Identifier(Identifier::new(name))
}

/// A literal expression.
pub fn lit(value: impl IntoValue) -> Expression {
    Expression::Literal(Literal::new(value.into_value()))
}

/// A function call expression.
pub fn func(name: &str, args: Vec<Expression>) -> Expression {
    Expression::Function(Box::new(Function::new(name, args)))
}

/// Attach an alias to any alias-capable expression.
pub fn aliased(mut expr: Expression, alias: &str) -> Expression {
    expr.set_alias(Some(alias.to_string()));
    expr
}

/// The bare `*`.
pub fn asterisk() -> Expression {
    Expression::Asterisk
}

/// `t.*`.
pub fn qualified_asterisk(qualifier: &str) -> Expression {
    Expression::QualifiedAsterisk(QualifiedAsterisk {
        qualifier: qualifier.to_string(),
    })
}

/// A SELECT wrapped as a scalar-position subquery expression.
pub fn subquery(query: SelectQuery) -> Expression {
    Expression::Subquery(Box::new(Subquery { query, alias: None }))
}

/// A bare table reference for FROM/JOIN positions.
pub fn table(name: &str) -> TableExpression {
    TableExpression::Table(TableIdentifier::new(name))
}

/// A `db.table` reference.
pub fn table_in(database: &str, name: &str) -> TableExpression {
    TableExpression::Table(TableIdentifier {
        database: Some(database.to_string()),
        name: name.to_string(),
        alias: None,
    })
}

/// A table reference with an alias.
pub fn table_aliased(name: &str, alias: &str) -> TableExpression {
    TableExpression::Table(TableIdentifier {
        database: None,
        name: name.to_string(),
        alias: Some(alias.to_string()),
    })
}

/// A derived table `(SELECT ...) AS alias`.
pub fn derived(query: SelectQuery, alias: Option<&str>) -> TableExpression {
    TableExpression::Subquery(TableSubquery {
        query: Box::new(query),
        alias: alias.map(str::to_string),
    })
}

/// Start building a SELECT from its projection list.
pub fn select(expressions: Vec<Expression>) -> SelectBuilder {
    SelectBuilder {
        query: SelectQuery {
            select: expressions,
            ..SelectQuery::default()
        },
    }
}

/// Fluent builder for [`SelectQuery`].
#[derive(Debug, Clone)]
pub struct SelectBuilder {
    query: SelectQuery,
}

impl SelectBuilder {
    pub fn distinct(mut self) -> Self {
        self.query.distinct = true;
        self
    }

    pub fn from(self, name: &str) -> Self {
        self.from_table(table(name))
    }

    pub fn from_table(mut self, table: TableExpression) -> Self {
        self.query.tables.push(TablesElement { table, join: None });
        self
    }

    pub fn from_subquery(self, inner: SelectQuery, alias: Option<&str>) -> Self {
        self.from_table(derived(inner, alias))
    }

    /// Attach a joined table with an ON condition.
    pub fn join_on(self, kind: JoinKind, table: TableExpression, on: Expression) -> Self {
        let mut join = TableJoin::new(kind);
        join.on = Some(on);
        self.join(table, join)
    }

    /// Attach a joined table with a USING key list.
    pub fn join_using(self, kind: JoinKind, table: TableExpression, keys: Vec<Expression>) -> Self {
        let mut join = TableJoin::new(kind);
        join.using_keys = Some(keys);
        self.join(table, join)
    }

    pub fn join(mut self, table: TableExpression, join: TableJoin) -> Self {
        self.query.tables.push(TablesElement {
            table,
            join: Some(join),
        });
        self
    }

    /// Set the strictness of the most recently added join.
    pub fn strictness(mut self, strictness: JoinStrictness) -> Self {
        if let Some(element) = self.query.tables.iter_mut().rev().find(|e| e.join.is_some()) {
            if let Some(join) = &mut element.join {
                join.strictness = strictness;
            }
        }
        self
    }

    pub fn array_join(mut self, expressions: Vec<Expression>) -> Self {
        self.query.array_join = Some(ArrayJoin {
            left: false,
            expressions,
        });
        self
    }

    pub fn left_array_join(mut self, expressions: Vec<Expression>) -> Self {
        self.query.array_join = Some(ArrayJoin {
            left: true,
            expressions,
        });
        self
    }

    pub fn prewhere(mut self, expr: Expression) -> Self {
        self.query.prewhere = Some(expr);
        self
    }

    pub fn where_(mut self, expr: Expression) -> Self {
        self.query.where_clause = Some(expr);
        self
    }

    pub fn group_by(mut self, keys: Vec<Expression>) -> Self {
        self.query.group_by = Some(keys);
        self
    }

    pub fn having(mut self, expr: Expression) -> Self {
        self.query.having = Some(expr);
        self
    }

    pub fn order_by(mut self, elements: Vec<OrderByElement>) -> Self {
        self.query.order_by = Some(elements);
        self
    }

    /// Ascending ORDER BY over plain column names.
    pub fn order_by_columns(self, names: &[&str]) -> Self {
        self.order_by(
            names
                .iter()
                .map(|&n| OrderByElement::ascending(col(n)))
                .collect(),
        )
    }

    pub fn limit(mut self, length: u64) -> Self {
        self.query.limit = Some(LimitClause {
            length,
            offset: None,
        });
        self
    }

    pub fn limit_by(mut self, length: u64, expressions: Vec<Expression>) -> Self {
        self.query.limit_by = Some(LimitByClause {
            length,
            offset: None,
            expressions,
        });
        self
    }

    pub fn settings(mut self, pairs: Vec<(&str, Value)>) -> Self {
        self.query.settings = Some(
            pairs
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        );
        self
    }

    pub fn build(self) -> SelectQuery {
        self.query
    }
}
