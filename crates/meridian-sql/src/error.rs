//! Error types for meridian-sql

use thiserror::Error;

/// The result type for analysis operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during semantic analysis and query rewriting.
///
/// Each variant corresponds to one failure mode of the analyzer. Variants
/// carry the offending (sub-)query text rendered from the AST so that the
/// operator can see what was being processed when the analysis failed.
/// No partial results are returned on failure.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// The SELECT list became empty after asterisk expansion
    #[error("Empty list of columns in SELECT query")]
    EmptyColumnsList,

    /// ARRAY JOIN named a nested table with no matching subcolumns
    #[error("No columns in nested table {name}")]
    EmptyNestedTable { name: String },

    /// An identifier could not be resolved to a column, table or alias
    #[error("Missing columns: {names} while processing query: '{query}'{details}")]
    UnknownIdentifier {
        names: String,
        query: String,
        details: String,
    },

    /// A JOIN ON section contained something other than a conjunction of
    /// equalities between the two joined tables
    #[error("Cannot get JOIN keys from JOIN ON section: {expression}")]
    InvalidJoinOnExpression { expression: String },

    /// JOIN strictness was left unspecified and the default setting is empty
    #[error("Expected ANY or ALL in JOIN section, because setting (join_default_strictness) is empty")]
    ExpectedAllOrAny,

    /// A requested combination is recognized but not supported
    #[error("{feature} is not implemented")]
    NotImplemented { feature: String },

    /// An aggregate function appeared where aggregation cannot happen
    #[error("Aggregate function {function}() is found {place} in query: '{query}'")]
    IllegalAggregation {
        function: String,
        place: String,
        query: String,
    },

    /// The same alias was bound to two structurally different expressions
    #[error("Different expressions with the same alias {alias}: '{first}' and '{second}'")]
    MultipleExpressionsForAlias {
        alias: String,
        first: String,
        second: String,
    },

    /// Alias substitution exceeded the configured AST depth limit
    #[error("Maximum AST depth of {max} exceeded while normalizing query: '{query}'")]
    TooDeepAst { max: usize, query: String },

    /// Alias substitution expanded the tree past the configured node limit
    #[error("Maximum expanded AST size of {max} elements exceeded while normalizing query: '{query}'")]
    TooBigAst { max: usize, query: String },

    /// An internal invariant was violated; indicates a bug in the analyzer
    #[error("Logical error: {0}")]
    Logical(String),
}

impl Error {
    /// Create an unknown-identifier error for a single unresolved name
    pub fn unknown_identifier(name: impl Into<String>, query: impl Into<String>) -> Self {
        Error::UnknownIdentifier {
            names: format!("'{}'", name.into()),
            query: query.into(),
            details: String::new(),
        }
    }

    /// Create an illegal-aggregation error
    pub fn illegal_aggregation(
        function: impl Into<String>,
        place: impl Into<String>,
        query: impl Into<String>,
    ) -> Self {
        Error::IllegalAggregation {
            function: function.into(),
            place: place.into(),
            query: query.into(),
        }
    }

    /// Create a not-implemented error
    pub fn not_implemented(feature: impl Into<String>) -> Self {
        Error::NotImplemented {
            feature: feature.into(),
        }
    }

    /// Create a logical error
    pub fn logical(message: impl Into<String>) -> Self {
        Error::Logical(message.into())
    }
}
