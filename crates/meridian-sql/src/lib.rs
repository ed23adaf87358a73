//! Meridian SQL - semantic analysis and query rewriting for the Meridian
//! analytic SQL engine.
//!
//! Given a parsed SELECT (or a plain expression tree) and a catalog snapshot,
//! this library resolves names, expands asterisks, substitutes aliases,
//! simplifies clauses, analyzes joins and ARRAY JOINs, collects aggregates,
//! and computes the exact set of columns the physical planner must read.
//!
//! # Architecture
//!
//! The library is a pipeline of AST rewrite passes over an owned expression
//! tree:
//! 1. **Name resolution** - qualified-name translation, asterisk expansion
//! 2. **Normalization** - alias substitution with depth and size bounds
//! 3. **Folding** - scalar subqueries, constant IF conditions, IF chains
//! 4. **Clause optimization** - GROUP BY simplification, dedups, cross-query
//!    ORDER BY/DISTINCT removal
//! 5. **Metadata collection** - join keys, ARRAY JOIN mappings, aggregates,
//!    required source columns
//!
//! Parsing, scalar execution, dictionary metadata, predicate pushdown, and
//! the logical-expression optimizer live outside this crate behind small
//! traits; see [`analyzer::Analyzer`] for the seams.
//!
//! # Example
//!
//! ```
//! use meridian_sql::builder::*;
//! use meridian_sql::schema::{Column, DataType, TableWithColumns};
//! use meridian_sql::{AnalysisResult, AnalyzeOptions, Analyzer, Settings};
//!
//! let mut query = select(vec![func("count", vec![])]).from("hits").build();
//! let columns = vec![
//!     Column::new("id", DataType::UInt64),
//!     Column::new("flag", DataType::UInt8),
//! ];
//! let tables = vec![TableWithColumns::new("hits", columns.clone())];
//!
//! let analyzer = Analyzer::new(Settings::default());
//! let result = analyzer
//!     .analyze_select(
//!         &mut query,
//!         AnalysisResult::new(columns, None),
//!         &AnalyzeOptions::default(),
//!         &tables,
//!         &[],
//!     )
//!     .unwrap();
//!
//! assert!(result.maybe_optimize_trivial_count);
//! assert_eq!(result.required_source_columns[0].name, "flag");
//! ```

pub mod analyzer;
pub mod builder;
pub mod dictionaries;
pub mod error;
pub mod expressions;
pub mod functions;
pub mod schema;
pub mod settings;
pub mod traversal;

pub use analyzer::{
    AnalysisResult, AnalyzeOptions, AnalyzedJoin, Analyzer, LogicalOptimizer, PredicatePushdown,
    ScalarExecutor,
};
pub use dictionaries::{DictionarySource, InjectivityCache};
pub use error::{Error, Result};
pub use expressions::{
    ArrayJoin, Expression, Function, Identifier, JoinKind, JoinStrictness, Literal,
    OrderByElement, SelectQuery, TableExpression, TableIdentifier, TableJoin, Value,
};
pub use functions::FunctionRegistry;
pub use schema::{Column, ColumnSize, DataType, Storage, TableStorage, TableWithColumns};
pub use settings::{DefaultJoinStrictness, Settings};
