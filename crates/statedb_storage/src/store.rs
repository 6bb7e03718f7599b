//! Row-store trait and row/value definitions.

use crate::error::StorageResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single column value.
///
/// Values are tagged by kind so that binary columns are never coerced
/// through text. Whatever bytes go in come back out bit-identical, which is
/// what makes before-image restoration exact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnValue {
    /// Explicit null (a column that exists but holds no value).
    Null,
    /// Signed integer.
    Int(i64),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes, preserved exactly.
    Bytes(Vec<u8>),
}

impl ColumnValue {
    /// Creates a text value.
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Returns the text content, if this is a text value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer content, if this is an integer value.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the byte content, if this is a bytes value.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

impl fmt::Display for ColumnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
            Self::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

/// A row: column name mapped to its value.
///
/// `BTreeMap` keeps column iteration order deterministic, which keeps
/// encoded before-images canonical.
pub type Row = BTreeMap<String, ColumnValue>;

/// A schema operation.
///
/// Schema changes are expressed as data rather than statement strings; the
/// store decides how to realize them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DdlOp {
    /// Create an empty table with the given name.
    CreateTable {
        /// Name of the table to create.
        name: String,
    },
    /// Drop the table with the given name, including all its rows.
    DropTable {
        /// Name of the table to drop.
        name: String,
    },
}

impl DdlOp {
    /// Creates a create-table operation.
    pub fn create_table(name: impl Into<String>) -> Self {
        Self::CreateTable { name: name.into() }
    }

    /// Creates a drop-table operation.
    pub fn drop_table(name: impl Into<String>) -> Self {
        Self::DropTable { name: name.into() }
    }

    /// Returns the table name this operation targets.
    #[must_use]
    pub fn table(&self) -> &str {
        match self {
            Self::CreateTable { name } | Self::DropTable { name } => name,
        }
    }
}

/// A low-level row store for StateDB.
///
/// Row stores hold named tables of rows keyed by a string identifier. They
/// provide simple keyed operations plus schema operations and scoped
/// boundaries. The engine owns all semantics above that - stores do not
/// understand rollback entries, partitions, or transactions.
///
/// # Invariants
///
/// - `put` followed by `get` with the same key returns exactly the stored
///   row; `Bytes` columns round-trip byte-for-byte
/// - `scan` returns all rows whose id starts with the given prefix, ordered
///   by id
/// - a scoped boundary opened with `begin_scoped` is released by exactly one
///   of `commit_scoped` / `abort_scoped`; after abort, the store is
///   observably identical to the moment the boundary was opened
/// - boundaries nest; inner boundaries commit into the outer one
/// - stores must be `Send + Sync` for concurrent access
///
/// Transient failures are an implementation concern: a store may retry its
/// own I/O, but callers never retry through this interface.
pub trait RowStore: Send + Sync {
    /// Reads a row by id.
    ///
    /// Returns `None` if the row does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the table does not exist or the store fails.
    fn get(&self, table: &str, id: &str) -> StorageResult<Option<Row>>;

    /// Writes a row, replacing any existing row with the same id.
    ///
    /// # Errors
    ///
    /// Returns an error if the table does not exist or the store fails.
    fn put(&self, table: &str, id: &str, columns: Row) -> StorageResult<()>;

    /// Deletes a row by id.
    ///
    /// Deleting a row that does not exist is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the table does not exist or the store fails.
    fn delete(&self, table: &str, id: &str) -> StorageResult<()>;

    /// Returns all rows whose id starts with `id_prefix`, ordered by id.
    ///
    /// An empty prefix returns every row in the table.
    ///
    /// # Errors
    ///
    /// Returns an error if the table does not exist or the store fails.
    fn scan(&self, table: &str, id_prefix: &str) -> StorageResult<Vec<(String, Row)>>;

    /// Executes a schema operation.
    ///
    /// # Errors
    ///
    /// Returns an error if the operation cannot be applied (creating a table
    /// that exists, dropping one that does not) or the store fails.
    fn exec_ddl(&self, op: &DdlOp) -> StorageResult<()>;

    /// Returns whether a table with the given name exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    fn has_table(&self, table: &str) -> StorageResult<bool>;

    /// Opens a scoped boundary.
    ///
    /// All mutations until the matching `commit_scoped` or `abort_scoped`
    /// form one unit: commit makes them permanent (relative to the enclosing
    /// boundary, if any), abort discards them completely.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    fn begin_scoped(&self) -> StorageResult<()>;

    /// Commits the innermost scoped boundary.
    ///
    /// # Errors
    ///
    /// Returns an error if no boundary is open or the store fails.
    fn commit_scoped(&self) -> StorageResult<()>;

    /// Aborts the innermost scoped boundary, discarding its mutations.
    ///
    /// # Errors
    ///
    /// Returns an error if no boundary is open or the store fails.
    fn abort_scoped(&self) -> StorageResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_value_accessors() {
        assert_eq!(ColumnValue::text("abc").as_text(), Some("abc"));
        assert_eq!(ColumnValue::Int(7).as_int(), Some(7));
        assert_eq!(
            ColumnValue::Bytes(vec![0, 255]).as_bytes(),
            Some(&[0u8, 255][..])
        );
        assert_eq!(ColumnValue::Null.as_text(), None);
        assert_eq!(ColumnValue::text("abc").as_int(), None);
    }

    #[test]
    fn ddl_op_table_name() {
        assert_eq!(DdlOp::create_table("7_pages").table(), "7_pages");
        assert_eq!(DdlOp::drop_table("7_pages").table(), "7_pages");
    }

    #[test]
    fn column_value_display() {
        assert_eq!(format!("{}", ColumnValue::Int(3)), "3");
        assert_eq!(format!("{}", ColumnValue::Bytes(vec![1, 2])), "<2 bytes>");
    }
}
