//! Pending-transaction intake queue boundary.

use crate::types::TxHash;
use statedb_storage::{ColumnValue, Row, RowStore, StorageResult};
use std::sync::Arc;

/// Global table backing the pending queue.
pub const QUEUE_TABLE: &str = "queue_tx";

const COL_PAYLOAD: &str = "payload";
const COL_GATEWAY: &str = "from_gate";

/// The pending-transaction intake queue.
///
/// A simple keyed insert/count/delete surface; items are keyed uniquely by
/// transaction hash.
pub trait PendingQueue: Send + Sync {
    /// Inserts a pending transaction, replacing any previous item with the
    /// same hash.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    fn enqueue(&self, hash: TxHash, payload: &[u8], origin_gateway: i64) -> StorageResult<()>;

    /// Returns how many items carry this hash (0 or 1).
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    fn count(&self, hash: TxHash) -> StorageResult<u64>;

    /// Removes the item with this hash, returning the number of rows
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    fn dequeue_by_hash(&self, hash: TxHash) -> StorageResult<u64>;
}

/// Pending queue backed by a [`RowStore`] table.
pub struct StoreQueue {
    store: Arc<dyn RowStore>,
}

impl StoreQueue {
    /// Creates a queue over a store.
    pub fn new(store: Arc<dyn RowStore>) -> Self {
        Self { store }
    }
}

impl PendingQueue for StoreQueue {
    fn enqueue(&self, hash: TxHash, payload: &[u8], origin_gateway: i64) -> StorageResult<()> {
        let mut row = Row::new();
        row.insert(COL_PAYLOAD.into(), ColumnValue::Bytes(payload.to_vec()));
        row.insert(COL_GATEWAY.into(), ColumnValue::Int(origin_gateway));
        self.store.put(QUEUE_TABLE, &hash.to_hex(), row)
    }

    fn count(&self, hash: TxHash) -> StorageResult<u64> {
        Ok(u64::from(self.store.get(QUEUE_TABLE, &hash.to_hex())?.is_some()))
    }

    fn dequeue_by_hash(&self, hash: TxHash) -> StorageResult<u64> {
        let id = hash.to_hex();
        let present = self.store.get(QUEUE_TABLE, &id)?.is_some();
        if present {
            self.store.delete(QUEUE_TABLE, &id)?;
        }
        Ok(u64::from(present))
    }
}

impl std::fmt::Debug for StoreQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreQueue").finish_non_exhaustive()
    }
}
