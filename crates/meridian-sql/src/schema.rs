//! Storage and catalog contracts.
//!
//! The analyzer never talks to real storage. It consumes a read-only snapshot
//! of the table schema through the [`Storage`] trait: the column list, the
//! per-column on-disk sizes (for the cheapest-column pick), and membership
//! checks that also cover virtual columns synthesized by the engine.
//!
//! [`TableStorage`] is a plain in-memory implementation suitable for tests
//! and for embedders that already hold the schema as data.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A column data type, reduced to what the analyzer needs: a stable name and
/// an optional fixed in-memory value size for the smallest-column heuristic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Date,
    DateTime,
    String,
    FixedString(usize),
    Array(Box<DataType>),
    Nullable(Box<DataType>),
    Tuple(Vec<DataType>),
}

impl DataType {
    /// The maximum in-memory size of a single value, when the type is
    /// fixed-size. `None` for strings, arrays and other unbounded types.
    pub fn fixed_value_size(&self) -> Option<usize> {
        match self {
            DataType::UInt8 | DataType::Int8 => Some(1),
            DataType::UInt16 | DataType::Int16 | DataType::Date => Some(2),
            DataType::UInt32 | DataType::Int32 | DataType::Float32 | DataType::DateTime => Some(4),
            DataType::UInt64 | DataType::Int64 | DataType::Float64 => Some(8),
            DataType::FixedString(n) => Some(*n),
            DataType::Nullable(inner) => inner.fixed_value_size().map(|s| s + 1),
            DataType::Tuple(items) => items
                .iter()
                .map(DataType::fixed_value_size)
                .sum::<Option<usize>>(),
            DataType::String | DataType::Array(_) => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::FixedString(n) => write!(f, "FixedString({})", n),
            DataType::Array(inner) => write!(f, "Array({})", inner),
            DataType::Nullable(inner) => write!(f, "Nullable({})", inner),
            DataType::Tuple(items) => {
                write!(f, "Tuple(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            other => write!(f, "{:?}", other),
        }
    }
}

/// A named, typed column as seen by the analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// On-disk size of one column, reported by storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSize {
    pub compressed: usize,
    pub uncompressed: usize,
}

/// Read-only snapshot of one table's schema, as provided by the storage
/// catalog. Implementations must be cheap to query repeatedly.
pub trait Storage {
    /// Every readable column, including virtual columns.
    fn all_columns(&self) -> Vec<Column>;

    /// Columns physically stored on disk (no virtuals).
    fn physical_columns(&self) -> Vec<Column>;

    /// Whether `name` is readable from this table (physical or virtual).
    fn has_column(&self, name: &str) -> bool;

    /// Look up one readable column by name.
    fn get_column(&self, name: &str) -> Option<Column>;

    /// Per-column on-disk sizes, where known. Missing entries are allowed.
    fn column_sizes(&self) -> HashMap<String, ColumnSize>;
}

/// In-memory [`Storage`] implementation backed by plain column lists.
#[derive(Debug, Clone, Default)]
pub struct TableStorage {
    physical: Vec<Column>,
    virtuals: Vec<Column>,
    sizes: HashMap<String, ColumnSize>,
}

impl TableStorage {
    pub fn new(physical: Vec<Column>) -> Self {
        Self {
            physical,
            virtuals: Vec::new(),
            sizes: HashMap::new(),
        }
    }

    /// Add a virtual column (row number, partition id, ...).
    pub fn with_virtual(mut self, column: Column) -> Self {
        self.virtuals.push(column);
        self
    }

    /// Record the on-disk size of one column.
    pub fn with_size(mut self, name: impl Into<String>, compressed: usize, uncompressed: usize) -> Self {
        self.sizes.insert(
            name.into(),
            ColumnSize {
                compressed,
                uncompressed,
            },
        );
        self
    }
}

impl Storage for TableStorage {
    fn all_columns(&self) -> Vec<Column> {
        let mut columns = self.physical.clone();
        columns.extend(self.virtuals.iter().cloned());
        columns
    }

    fn physical_columns(&self) -> Vec<Column> {
        self.physical.clone()
    }

    fn has_column(&self, name: &str) -> bool {
        self.physical.iter().any(|c| c.name == name) || self.virtuals.iter().any(|c| c.name == name)
    }

    fn get_column(&self, name: &str) -> Option<Column> {
        self.physical
            .iter()
            .chain(self.virtuals.iter())
            .find(|c| c.name == name)
            .cloned()
    }

    fn column_sizes(&self) -> HashMap<String, ColumnSize> {
        self.sizes.clone()
    }
}

/// One FROM table together with the columns it contributes, in FROM order.
/// Used for asterisk expansion and qualified-name resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableWithColumns {
    pub database: Option<String>,
    pub table: String,
    pub alias: Option<String>,
    pub columns: Vec<Column>,
}

impl TableWithColumns {
    pub fn new(table: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            database: None,
            table: table.into(),
            alias: None,
            columns,
        }
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// The prefix used when qualifying this table's columns: the alias if
    /// present, otherwise `db.table.` or `table.`.
    pub fn qualified_prefix(&self) -> String {
        if let Some(alias) = &self.alias {
            format!("{}.", alias)
        } else if let Some(database) = &self.database {
            format!("{}.{}.", database, self.table)
        } else {
            format!("{}.", self.table)
        }
    }

    /// Whether `qualifier` names this table: its alias, bare name, or
    /// `db.name` form.
    pub fn matches_qualifier(&self, qualifier: &str) -> bool {
        if let Some(alias) = &self.alias {
            if alias == qualifier {
                return true;
            }
        }
        if self.table == qualifier {
            return true;
        }
        if let Some(database) = &self.database {
            return format!("{}.{}", database, self.table) == qualifier;
        }
        false
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }
}

/// Split a nested column name at the first dot: `n.x` -> `("n", "x")`.
/// A name without a dot yields an empty second part.
pub fn split_nested(name: &str) -> (&str, &str) {
    match name.find('.') {
        Some(pos) => (&name[..pos], &name[pos + 1..]),
        None => (name, ""),
    }
}

/// Concatenate a nested table name and a subcolumn name.
pub fn concat_nested(first: &str, second: &str) -> String {
    format!("{}.{}", first, second)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_value_size() {
        assert_eq!(DataType::UInt8.fixed_value_size(), Some(1));
        assert_eq!(DataType::Float64.fixed_value_size(), Some(8));
        assert_eq!(DataType::String.fixed_value_size(), None);
        assert_eq!(
            DataType::Nullable(Box::new(DataType::UInt32)).fixed_value_size(),
            Some(5)
        );
        assert_eq!(
            DataType::Array(Box::new(DataType::UInt8)).fixed_value_size(),
            None
        );
    }

    #[test]
    fn test_table_storage_virtuals() {
        let storage = TableStorage::new(vec![Column::new("x", DataType::UInt64)])
            .with_virtual(Column::new("_row", DataType::UInt64));
        assert!(storage.has_column("x"));
        assert!(storage.has_column("_row"));
        assert_eq!(storage.physical_columns().len(), 1);
        assert_eq!(storage.all_columns().len(), 2);
    }

    #[test]
    fn test_qualified_prefix() {
        let t = TableWithColumns::new("hits", vec![]).with_database("web");
        assert_eq!(t.qualified_prefix(), "web.hits.");
        let t = t.with_alias("h");
        assert_eq!(t.qualified_prefix(), "h.");
    }

    #[test]
    fn test_matches_qualifier() {
        let t = TableWithColumns::new("hits", vec![]).with_database("web");
        assert!(t.matches_qualifier("hits"));
        assert!(t.matches_qualifier("web.hits"));
        assert!(!t.matches_qualifier("web"));
    }

    #[test]
    fn test_split_nested() {
        assert_eq!(split_nested("nest.x"), ("nest", "x"));
        assert_eq!(split_nested("plain"), ("plain", ""));
        assert_eq!(split_nested("a.b.c"), ("a", "b.c"));
    }
}
