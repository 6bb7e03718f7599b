//! Rollback engine: replays a transaction's undo log in reverse.

use crate::error::{RollbackError, SchemaError};
use crate::partition::{SchemaRegistry, PARTITIONS_TABLE};
use crate::rollback::entry::{RollbackEntry, ROLLBACK_LOG_TABLE};
use crate::types::{PartitionId, TxHash};
use statedb_storage::{RowStore, StorageResult};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Undoes everything recorded under a transaction hash.
///
/// Rollback of one transaction is all-or-nothing: either every (table, row)
/// group is restored and the log purged, or the call fails and no entries
/// are consumed. The whole replay runs inside one scoped boundary against
/// the store.
pub struct RollbackEngine {
    store: Arc<dyn RowStore>,
    schema: SchemaRegistry,
}

impl RollbackEngine {
    /// Creates a rollback engine over a store.
    pub fn new(store: Arc<dyn RowStore>) -> Self {
        let schema = SchemaRegistry::new(store.clone());
        Self { store, schema }
    }

    /// Rolls back one transaction.
    ///
    /// Entries are replayed per (table, row) group in descending sequence
    /// order: a before-image overwrites the row with its exact prior
    /// values, no before-image deletes the row. If the transaction created
    /// a state partition, the partition is dropped (subject to the
    /// last-allocated invariant) before the log purge commits.
    ///
    /// # Errors
    ///
    /// Returns [`RollbackError::NotFound`] when nothing is associated with
    /// the hash - including the second call for an already rolled back
    /// transaction, which performs no writes.
    pub fn rollback(&self, tx_hash: TxHash) -> Result<(), RollbackError> {
        self.store.begin_scoped()?;
        match self.rollback_inner(tx_hash) {
            Ok(entries) => {
                self.store.commit_scoped()?;
                info!(%tx_hash, entries, "transaction rolled back");
                Ok(())
            }
            Err(err) => {
                let _ = self.store.abort_scoped();
                Err(err)
            }
        }
    }

    fn rollback_inner(&self, tx_hash: TxHash) -> Result<usize, RollbackError> {
        let prefix = RollbackEntry::tx_prefix(tx_hash);
        let raw = self.store.scan(ROLLBACK_LOG_TABLE, &prefix)?;
        if raw.is_empty() {
            return Err(RollbackError::NotFound { hash: tx_hash });
        }

        let mut entries = Vec::with_capacity(raw.len());
        for (_, row) in &raw {
            entries.push(RollbackEntry::from_log_row(row)?);
        }

        let created_partition = Self::created_partition(&entries)?;

        // Group by (table, row); undo each group newest-first so repeated
        // updates to the same row unwind layer by layer.
        let mut groups: BTreeMap<(String, String), Vec<RollbackEntry>> = BTreeMap::new();
        for entry in entries {
            groups
                .entry((entry.table.clone(), entry.row_id.clone()))
                .or_default()
                .push(entry);
        }
        for ((table, row_id), group) in &mut groups {
            group.sort_by(|a, b| b.seq.cmp(&a.seq));
            for entry in group.iter() {
                match &entry.before {
                    Some(before) => self.store.put(table, row_id, before.clone())?,
                    None => self.store.delete(table, row_id)?,
                }
            }
            debug!(%tx_hash, table = %table, row_id = %row_id, writes = group.len(), "restored row group");
        }

        if let Some(id) = created_partition {
            self.schema
                .drop_partition(id)
                .map_err(Self::schema_to_rollback)?;
        }

        for (log_id, _) in &raw {
            self.store.delete(ROLLBACK_LOG_TABLE, log_id)?;
        }
        Ok(raw.len())
    }

    /// Deletes a finalized transaction's entries without replaying them.
    ///
    /// After pruning, the transaction can no longer be rolled back.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails; no entries are consumed in that
    /// case.
    pub fn prune(&self, tx_hash: TxHash) -> StorageResult<u64> {
        self.store.begin_scoped()?;
        let result = (|| {
            let prefix = RollbackEntry::tx_prefix(tx_hash);
            let raw = self.store.scan(ROLLBACK_LOG_TABLE, &prefix)?;
            for (log_id, _) in &raw {
                self.store.delete(ROLLBACK_LOG_TABLE, log_id)?;
            }
            Ok(raw.len() as u64)
        })();
        match result {
            Ok(count) => {
                self.store.commit_scoped()?;
                Ok(count)
            }
            Err(err) => {
                let _ = self.store.abort_scoped();
                Err(err)
            }
        }
    }

    /// Finds the partition this transaction created, if any.
    ///
    /// An insertion entry on the global partition registry marks the
    /// creating transaction; its row id carries the partition identifier.
    fn created_partition(entries: &[RollbackEntry]) -> Result<Option<PartitionId>, RollbackError> {
        for entry in entries {
            if entry.table == PARTITIONS_TABLE && entry.before.is_none() {
                let id = entry.row_id.parse::<u64>().map_err(|_| {
                    RollbackError::corrupt(format!(
                        "partition registry entry has non-numeric row id {:?}",
                        entry.row_id
                    ))
                })?;
                return Ok(Some(PartitionId::new(id)));
            }
        }
        Ok(None)
    }

    fn schema_to_rollback(err: SchemaError) -> RollbackError {
        match err {
            SchemaError::PartitionOrder { id, max } => RollbackError::PartitionOrder { id, max },
            SchemaError::Ddl { source, .. } | SchemaError::Storage(source) => {
                RollbackError::Storage(source)
            }
            SchemaError::CounterCorrupt => {
                RollbackError::corrupt("partition counter row is missing or malformed")
            }
            SchemaError::Document { table, row } => RollbackError::corrupt(format!(
                "malformed permissions document on {table}/{row}"
            )),
        }
    }
}

impl std::fmt::Debug for RollbackEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RollbackEngine").finish_non_exhaustive()
    }
}
