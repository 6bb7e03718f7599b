//! Rollback entry representation and its log-row codec.

use crate::error::RollbackError;
use crate::types::{BlockId, EntrySeq, TxHash};
use statedb_storage::{ColumnValue, Row, StorageError};

/// Global table holding all pending rollback entries.
pub const ROLLBACK_LOG_TABLE: &str = "rollback_log";

const COL_TABLE: &str = "table_name";
const COL_ROW: &str = "row_id";
const COL_SEQ: &str = "seq";
const COL_BLOCK: &str = "block";
const COL_HASH: &str = "tx_hash";
const COL_BEFORE: &str = "before";

/// One reversible log record.
///
/// The composite key is (transaction hash, table, row id, sequence number).
/// A present before-image means "this row existed with these values"; an
/// absent one means "this row did not exist before the transaction".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackEntry {
    /// Hash of the transaction that performed the mutation.
    pub tx_hash: TxHash,
    /// Table the mutation touched.
    pub table: String,
    /// Row identifier within the table.
    pub row_id: String,
    /// Position within this transaction's writes to (table, row).
    pub seq: EntrySeq,
    /// Block the transaction belongs to.
    pub block: BlockId,
    /// Prior column values, or `None` for an insertion.
    pub before: Option<Row>,
}

impl RollbackEntry {
    /// Log-row id prefix covering every entry of one transaction.
    #[must_use]
    pub fn tx_prefix(hash: TxHash) -> String {
        format!("{}:", hash.to_hex())
    }

    /// Log-row id prefix covering one (transaction, table, row) group.
    #[must_use]
    pub fn group_prefix(hash: TxHash, table: &str, row_id: &str) -> String {
        format!("{}:{table}:{row_id}:", hash.to_hex())
    }

    /// Log-row id of this entry.
    ///
    /// The sequence component is zero-padded so lexicographic scan order
    /// matches numeric order.
    #[must_use]
    pub fn log_id(&self) -> String {
        format!(
            "{}:{}:{}:{:010}",
            self.tx_hash.to_hex(),
            self.table,
            self.row_id,
            self.seq.as_u32()
        )
    }

    /// Encodes the entry into a log row.
    ///
    /// The before-image is serialized as canonical CBOR so that binary
    /// columns survive bit-identically.
    ///
    /// # Errors
    ///
    /// Returns a storage failure if the before-image cannot be serialized.
    pub fn to_log_row(&self) -> Result<Row, StorageError> {
        let mut row = Row::new();
        row.insert(COL_TABLE.into(), ColumnValue::text(&self.table));
        row.insert(COL_ROW.into(), ColumnValue::text(&self.row_id));
        row.insert(COL_SEQ.into(), ColumnValue::Int(i64::from(self.seq.as_u32())));
        row.insert(
            COL_BLOCK.into(),
            ColumnValue::Int(self.block.as_u64() as i64),
        );
        row.insert(
            COL_HASH.into(),
            ColumnValue::Bytes(self.tx_hash.as_bytes().to_vec()),
        );
        if let Some(before) = &self.before {
            let mut buf = Vec::new();
            ciborium::ser::into_writer(before, &mut buf).map_err(|e| {
                StorageError::failure(format!("before-image encode failed: {e}"))
            })?;
            row.insert(COL_BEFORE.into(), ColumnValue::Bytes(buf));
        }
        Ok(row)
    }

    /// Decodes an entry from a log row.
    ///
    /// # Errors
    ///
    /// Returns [`RollbackError::Corrupt`] if a required column is missing or
    /// the before-image is not valid CBOR.
    pub fn from_log_row(row: &Row) -> Result<Self, RollbackError> {
        let table = row
            .get(COL_TABLE)
            .and_then(ColumnValue::as_text)
            .ok_or_else(|| RollbackError::corrupt("missing table_name column"))?
            .to_owned();
        let row_id = row
            .get(COL_ROW)
            .and_then(ColumnValue::as_text)
            .ok_or_else(|| RollbackError::corrupt("missing row_id column"))?
            .to_owned();
        let seq = row
            .get(COL_SEQ)
            .and_then(ColumnValue::as_int)
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| RollbackError::corrupt("missing or invalid seq column"))?;
        let block = row
            .get(COL_BLOCK)
            .and_then(ColumnValue::as_int)
            .ok_or_else(|| RollbackError::corrupt("missing block column"))?;
        let hash_bytes: [u8; 32] = row
            .get(COL_HASH)
            .and_then(ColumnValue::as_bytes)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| RollbackError::corrupt("missing or invalid tx_hash column"))?;
        let before = match row.get(COL_BEFORE) {
            Some(value) => {
                let bytes = value
                    .as_bytes()
                    .ok_or_else(|| RollbackError::corrupt("before column is not bytes"))?;
                let image: Row = ciborium::de::from_reader(bytes)
                    .map_err(|e| RollbackError::corrupt(format!("before-image decode: {e}")))?;
                Some(image)
            }
            None => None,
        };
        Ok(Self {
            tx_hash: TxHash::from_bytes(hash_bytes),
            table,
            row_id,
            seq: EntrySeq::new(seq),
            block: BlockId::new(block as u64),
            before,
        })
    }
}
