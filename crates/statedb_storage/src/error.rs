//! Error types for row-store operations.

use thiserror::Error;

/// Result type for row-store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during row-store operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The named table does not exist.
    #[error("no such table: {table}")]
    NoSuchTable {
        /// The table that was addressed.
        table: String,
    },

    /// A table with this name already exists.
    #[error("table already exists: {table}")]
    TableExists {
        /// The table that was being created.
        table: String,
    },

    /// A scoped boundary operation was called without a matching begin.
    #[error("unbalanced scoped boundary: {operation} without begin_scoped")]
    UnbalancedBoundary {
        /// The operation that was attempted (`commit` or `abort`).
        operation: &'static str,
    },

    /// The underlying store failed.
    ///
    /// Transient failures of this kind are retried by store implementations
    /// where that makes sense; callers see them only once retries are
    /// exhausted.
    #[error("storage failure: {message}")]
    Failure {
        /// Description of the failure.
        message: String,
    },
}

impl StorageError {
    /// Creates a no-such-table error.
    pub fn no_such_table(table: impl Into<String>) -> Self {
        Self::NoSuchTable {
            table: table.into(),
        }
    }

    /// Creates a table-exists error.
    pub fn table_exists(table: impl Into<String>) -> Self {
        Self::TableExists {
            table: table.into(),
        }
    }

    /// Creates a generic storage failure.
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
        }
    }
}
