//! Fault-injecting store wrapper.

use parking_lot::Mutex;
use statedb_storage::{DdlOp, MemoryStore, Row, RowStore, StorageError, StorageResult};
use std::sync::Arc;

/// A store wrapper that fails table creation on command.
///
/// Used to exercise partial-failure paths: arm the fault with a budget of
/// `n` remaining creates, and the `n+1`-th `CreateTable` fails with a
/// storage failure. Unarmed, the wrapper is a transparent passthrough.
pub struct FaultStore {
    inner: Arc<MemoryStore>,
    remaining_creates: Mutex<Option<u32>>,
}

impl FaultStore {
    /// Wraps an in-memory store, unarmed.
    #[must_use]
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            remaining_creates: Mutex::new(None),
        }
    }

    /// Arms the fault: the next `budget` table creations succeed, the one
    /// after fails.
    pub fn arm_create_faults(&self, budget: u32) {
        *self.remaining_creates.lock() = Some(budget);
    }

    /// Disarms the fault.
    pub fn disarm(&self) {
        *self.remaining_creates.lock() = None;
    }

    /// Returns the wrapped store.
    #[must_use]
    pub fn inner(&self) -> &Arc<MemoryStore> {
        &self.inner
    }
}

impl RowStore for FaultStore {
    fn get(&self, table: &str, id: &str) -> StorageResult<Option<Row>> {
        self.inner.get(table, id)
    }

    fn put(&self, table: &str, id: &str, columns: Row) -> StorageResult<()> {
        self.inner.put(table, id, columns)
    }

    fn delete(&self, table: &str, id: &str) -> StorageResult<()> {
        self.inner.delete(table, id)
    }

    fn scan(&self, table: &str, id_prefix: &str) -> StorageResult<Vec<(String, Row)>> {
        self.inner.scan(table, id_prefix)
    }

    fn exec_ddl(&self, op: &DdlOp) -> StorageResult<()> {
        if matches!(op, DdlOp::CreateTable { .. }) {
            let mut remaining = self.remaining_creates.lock();
            if let Some(budget) = remaining.as_mut() {
                if *budget == 0 {
                    return Err(StorageError::failure(format!(
                        "injected fault creating {}",
                        op.table()
                    )));
                }
                *budget -= 1;
            }
        }
        self.inner.exec_ddl(op)
    }

    fn has_table(&self, table: &str) -> StorageResult<bool> {
        self.inner.has_table(table)
    }

    fn begin_scoped(&self) -> StorageResult<()> {
        self.inner.begin_scoped()
    }

    fn commit_scoped(&self) -> StorageResult<()> {
        self.inner.commit_scoped()
    }

    fn abort_scoped(&self) -> StorageResult<()> {
        self.inner.abort_scoped()
    }
}

impl std::fmt::Debug for FaultStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaultStore")
            .field("armed", &self.remaining_creates.lock().is_some())
            .finish_non_exhaustive()
    }
}
