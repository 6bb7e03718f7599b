//! Error types for the StateDB engine.
//!
//! Every failure is scoped to one transaction and reported to the caller;
//! nothing in this crate is fatal to the process. The caller decides whether
//! to drop the transaction, retry, or escalate.

use crate::types::TxHash;
use statedb_storage::StorageError;
use thiserror::Error;

/// A raw transaction payload could not be decoded.
///
/// Rejection with this error happens before any state is touched.
#[derive(Debug, Error)]
#[error("malformed payload: {message}")]
pub struct DecodeError {
    /// Description of the decode failure.
    message: String,
}

impl DecodeError {
    /// Creates a decode error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A transaction failed structural, signature, or domain validation.
///
/// Rejection with this error happens before any state is touched.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field was empty or missing.
    #[error("missing required field: {field}")]
    MissingField {
        /// Name of the missing field.
        field: &'static str,
    },

    /// No public key is known for the sender.
    #[error("no public key registered for {wallet}")]
    UnknownSender {
        /// The sender wallet.
        wallet: i64,
    },

    /// Signature verification against the sender's key failed.
    #[error("signature verification failed for {wallet}")]
    BadSignature {
        /// The sender wallet.
        wallet: i64,
    },

    /// The target state name is already registered.
    #[error("state {name:?} already exists")]
    StateExists {
        /// The conflicting state name.
        name: String,
    },

    /// The store failed while validation was reading.
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),
}

/// A schema operation failed during partition creation or teardown.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A table create/drop failed.
    #[error("DDL failed for table {table}: {source}")]
    Ddl {
        /// The table the operation targeted.
        table: String,
        /// The underlying store error.
        source: StorageError,
    },

    /// The partition is not the most recently allocated one.
    ///
    /// Dropping a non-newest partition would make its identifier reusable
    /// while newer partitions still reference higher identifiers.
    #[error("partition {id} is not the most recently allocated (current max {max})")]
    PartitionOrder {
        /// The partition that was addressed.
        id: u64,
        /// The current maximum allocated identifier.
        max: u64,
    },

    /// The shared partition counter row is missing or malformed.
    #[error("partition counter row is missing or malformed")]
    CounterCorrupt,

    /// A permissions document could not be parsed.
    #[error("malformed permissions document on {table}/{row}")]
    Document {
        /// Table holding the document.
        table: String,
        /// Row holding the document.
        row: String,
    },

    /// The store failed outside a DDL call.
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),
}

impl SchemaError {
    /// Creates a DDL error for a table.
    pub fn ddl(table: impl Into<String>, source: StorageError) -> Self {
        Self::Ddl {
            table: table.into(),
            source,
        }
    }
}

/// A rollback could not be performed.
///
/// `NotFound` and `PartitionOrder` indicate caller misuse or an invariant
/// violation and must not be silently ignored; `Storage` failures are
/// retried at the storage boundary, never here.
#[derive(Debug, Error)]
pub enum RollbackError {
    /// No rollback entries and no partition are associated with the hash.
    ///
    /// Also the result of rolling back the same transaction twice; the
    /// second call is a no-op failure, not a corrupting retry.
    #[error("nothing to roll back for transaction {hash}")]
    NotFound {
        /// The transaction hash.
        hash: TxHash,
    },

    /// The transaction created a partition that is no longer the newest.
    #[error("partition {id} is not the most recently allocated (current max {max})")]
    PartitionOrder {
        /// The partition the transaction created.
        id: u64,
        /// The current maximum allocated identifier.
        max: u64,
    },

    /// A persisted rollback entry could not be decoded.
    #[error("corrupt rollback entry: {message}")]
    Corrupt {
        /// Description of the corruption.
        message: String,
    },

    /// The store failed mid-rollback; no entries were consumed.
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),
}

impl RollbackError {
    /// Creates a corrupt-entry error.
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt {
            message: message.into(),
        }
    }
}

/// Effect application failed.
///
/// By the time this error surfaces, the engine has already rolled back
/// everything the transaction recorded.
#[derive(Debug, Error)]
pub enum ApplyError {
    /// Partition creation failed.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// A row mutation or its log write failed.
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),

    /// The governing contract could not be loaded.
    #[error("contract load failed: {0}")]
    Contract(#[from] ContractError),
}

/// The default contract definition could not be produced.
#[derive(Debug, Error)]
#[error("contract error: {message}")]
pub struct ContractError {
    /// Description of the failure.
    message: String,
}

impl ContractError {
    /// Creates a contract error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Top-level error surfaced by the transaction lifecycle.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The payload was malformed; the transaction was rejected.
    #[error("rejected: {0}")]
    Decode(#[from] DecodeError),

    /// Validation failed; the transaction was rejected.
    #[error("rejected: {0}")]
    Validation(#[from] ValidationError),

    /// Application failed; partial work was rolled back.
    #[error("apply failed: {0}")]
    Apply(#[from] ApplyError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_error_message() {
        let err = DecodeError::new("truncated CBOR");
        assert_eq!(format!("{err}"), "malformed payload: truncated CBOR");
    }

    #[test]
    fn partition_order_message_names_both_ids() {
        let err = SchemaError::PartitionOrder { id: 3, max: 5 };
        let text = format!("{err}");
        assert!(text.contains('3') && text.contains('5'));
    }

    #[test]
    fn lifecycle_error_wraps_validation() {
        let err: LifecycleError = ValidationError::MissingField {
            field: "state_name",
        }
        .into();
        assert!(matches!(err, LifecycleError::Validation(_)));
    }
}
