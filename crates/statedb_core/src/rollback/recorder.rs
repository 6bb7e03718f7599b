//! Mutation recorder: captures a reversible log entry before every write.

use crate::rollback::entry::{RollbackEntry, ROLLBACK_LOG_TABLE};
use crate::types::{BlockId, EntrySeq, TxHash};
use statedb_storage::{Row, RowStore, StorageError, StorageResult};
use std::sync::Arc;
use tracing::debug;

/// Records rollback entries and performs recorded row writes.
///
/// The recorder enforces log-before-write ordering: a mutation is never
/// applied without its entry durably recorded first, so a crash
/// mid-transaction never leaves an unrecoverable row. Each recorded write
/// runs inside its own scoped boundary - if either the log write or the row
/// write fails, neither lands.
pub struct MutationRecorder {
    store: Arc<dyn RowStore>,
}

impl MutationRecorder {
    /// Creates a recorder over a store.
    pub fn new(store: Arc<dyn RowStore>) -> Self {
        Self { store }
    }

    /// Persists an entry capturing a row's prior column values.
    ///
    /// The entry is assigned the next sequence number for this
    /// (transaction, table, row) triple. Binary columns in the before-image
    /// are preserved exactly.
    ///
    /// # Errors
    ///
    /// Returns an error if the log write fails; the enclosing mutation must
    /// then be aborted.
    pub fn record_update(
        &self,
        tx_hash: TxHash,
        block: BlockId,
        table: &str,
        row_id: &str,
        before: &Row,
    ) -> StorageResult<EntrySeq> {
        self.record(tx_hash, block, table, row_id, Some(before.clone()))
    }

    /// Persists an entry marking that a row did not exist before this
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the log write fails; the enclosing mutation must
    /// then be aborted.
    pub fn record_insert(
        &self,
        tx_hash: TxHash,
        block: BlockId,
        table: &str,
        row_id: &str,
    ) -> StorageResult<EntrySeq> {
        self.record(tx_hash, block, table, row_id, None)
    }

    /// Writes a new row with its insertion entry, log first.
    ///
    /// # Errors
    ///
    /// Returns an error if either write fails; in that case neither the
    /// entry nor the row lands.
    pub fn insert_row(
        &self,
        tx_hash: TxHash,
        block: BlockId,
        table: &str,
        row_id: &str,
        columns: Row,
    ) -> StorageResult<()> {
        self.store.begin_scoped()?;
        let result = self
            .record_insert(tx_hash, block, table, row_id)
            .and_then(|_| self.store.put(table, row_id, columns));
        self.finish(result)
    }

    /// Overwrites an existing row with its update entry, log first.
    ///
    /// The current row is captured as the before-image.
    ///
    /// # Errors
    ///
    /// Returns an error if the row does not exist or either write fails; in
    /// that case neither the entry nor the row lands.
    pub fn update_row(
        &self,
        tx_hash: TxHash,
        block: BlockId,
        table: &str,
        row_id: &str,
        columns: Row,
    ) -> StorageResult<()> {
        let before = self.store.get(table, row_id)?.ok_or_else(|| {
            StorageError::failure(format!("cannot update missing row {table}/{row_id}"))
        })?;
        self.store.begin_scoped()?;
        let result = self
            .record_update(tx_hash, block, table, row_id, &before)
            .and_then(|_| self.store.put(table, row_id, columns));
        self.finish(result)
    }

    fn record(
        &self,
        tx_hash: TxHash,
        block: BlockId,
        table: &str,
        row_id: &str,
        before: Option<Row>,
    ) -> StorageResult<EntrySeq> {
        let seq = self.next_seq(tx_hash, table, row_id)?;
        let entry = RollbackEntry {
            tx_hash,
            table: table.to_owned(),
            row_id: row_id.to_owned(),
            seq,
            block,
            before,
        };
        let log_row = entry.to_log_row()?;
        self.store.put(ROLLBACK_LOG_TABLE, &entry.log_id(), log_row)?;
        debug!(%tx_hash, table, row_id, %seq, "recorded rollback entry");
        Ok(seq)
    }

    /// Next sequence number for (transaction, table, row).
    ///
    /// Derived from the count of existing entries for the triple; correct
    /// because all mutating phases are serialized behind a single writer.
    fn next_seq(&self, tx_hash: TxHash, table: &str, row_id: &str) -> StorageResult<EntrySeq> {
        let prefix = RollbackEntry::group_prefix(tx_hash, table, row_id);
        let existing = self.store.scan(ROLLBACK_LOG_TABLE, &prefix)?;
        Ok(EntrySeq::new(existing.len() as u32))
    }

    fn finish<T>(&self, result: StorageResult<T>) -> StorageResult<T> {
        match result {
            Ok(value) => {
                self.store.commit_scoped()?;
                Ok(value)
            }
            Err(err) => {
                let _ = self.store.abort_scoped();
                Err(err)
            }
        }
    }
}

impl std::fmt::Debug for MutationRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationRecorder").finish_non_exhaustive()
    }
}
