//! In-memory row store for testing and ephemeral state.

use crate::error::{StorageError, StorageResult};
use crate::store::{DdlOp, Row, RowStore};
use parking_lot::RwLock;
use std::collections::BTreeMap;

type Tables = BTreeMap<String, BTreeMap<String, Row>>;

#[derive(Debug, Default)]
struct Inner {
    tables: Tables,
    /// Snapshot stack for scoped boundaries; abort restores the top entry.
    snapshots: Vec<Tables>,
}

/// An in-memory row store.
///
/// This store keeps all tables in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral engines that don't need persistence
///
/// Scoped boundaries are implemented as a snapshot stack: `begin_scoped`
/// snapshots the whole table set, `abort_scoped` restores it, and
/// `commit_scoped` discards the snapshot. Boundaries nest.
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use statedb_storage::{DdlOp, MemoryStore, Row, RowStore};
///
/// let store = MemoryStore::new();
/// store.exec_ddl(&DdlOp::create_table("pages")).unwrap();
///
/// store.begin_scoped().unwrap();
/// store.put("pages", "home", Row::new()).unwrap();
/// store.abort_scoped().unwrap();
/// assert_eq!(store.get("pages", "home").unwrap(), None);
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the names of all existing tables.
    ///
    /// Useful for testing and debugging.
    #[must_use]
    pub fn table_names(&self) -> Vec<String> {
        self.inner.read().tables.keys().cloned().collect()
    }

    /// Returns the number of rows in a table, or `None` if it does not
    /// exist.
    #[must_use]
    pub fn row_count(&self, table: &str) -> Option<usize> {
        self.inner.read().tables.get(table).map(BTreeMap::len)
    }

    /// Returns the current scoped-boundary nesting depth.
    ///
    /// Zero means no boundary is open. Useful for asserting that every exit
    /// path released its boundary.
    #[must_use]
    pub fn boundary_depth(&self) -> usize {
        self.inner.read().snapshots.len()
    }
}

impl RowStore for MemoryStore {
    fn get(&self, table: &str, id: &str) -> StorageResult<Option<Row>> {
        let inner = self.inner.read();
        let rows = inner
            .tables
            .get(table)
            .ok_or_else(|| StorageError::no_such_table(table))?;
        Ok(rows.get(id).cloned())
    }

    fn put(&self, table: &str, id: &str, columns: Row) -> StorageResult<()> {
        let mut inner = self.inner.write();
        let rows = inner
            .tables
            .get_mut(table)
            .ok_or_else(|| StorageError::no_such_table(table))?;
        rows.insert(id.to_owned(), columns);
        Ok(())
    }

    fn delete(&self, table: &str, id: &str) -> StorageResult<()> {
        let mut inner = self.inner.write();
        let rows = inner
            .tables
            .get_mut(table)
            .ok_or_else(|| StorageError::no_such_table(table))?;
        rows.remove(id);
        Ok(())
    }

    fn scan(&self, table: &str, id_prefix: &str) -> StorageResult<Vec<(String, Row)>> {
        let inner = self.inner.read();
        let rows = inner
            .tables
            .get(table)
            .ok_or_else(|| StorageError::no_such_table(table))?;
        Ok(rows
            .range(id_prefix.to_owned()..)
            .take_while(|(id, _)| id.starts_with(id_prefix))
            .map(|(id, row)| (id.clone(), row.clone()))
            .collect())
    }

    fn exec_ddl(&self, op: &DdlOp) -> StorageResult<()> {
        let mut inner = self.inner.write();
        match op {
            DdlOp::CreateTable { name } => {
                if inner.tables.contains_key(name) {
                    return Err(StorageError::table_exists(name));
                }
                inner.tables.insert(name.clone(), BTreeMap::new());
                Ok(())
            }
            DdlOp::DropTable { name } => {
                if inner.tables.remove(name).is_none() {
                    return Err(StorageError::no_such_table(name));
                }
                Ok(())
            }
        }
    }

    fn has_table(&self, table: &str) -> StorageResult<bool> {
        Ok(self.inner.read().tables.contains_key(table))
    }

    fn begin_scoped(&self) -> StorageResult<()> {
        let mut inner = self.inner.write();
        let snapshot = inner.tables.clone();
        inner.snapshots.push(snapshot);
        Ok(())
    }

    fn commit_scoped(&self) -> StorageResult<()> {
        let mut inner = self.inner.write();
        if inner.snapshots.pop().is_none() {
            return Err(StorageError::UnbalancedBoundary {
                operation: "commit",
            });
        }
        Ok(())
    }

    fn abort_scoped(&self) -> StorageResult<()> {
        let mut inner = self.inner.write();
        match inner.snapshots.pop() {
            Some(snapshot) => {
                inner.tables = snapshot;
                Ok(())
            }
            None => Err(StorageError::UnbalancedBoundary { operation: "abort" }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ColumnValue;

    fn row(pairs: &[(&str, ColumnValue)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.clone()))
            .collect()
    }

    #[test]
    fn new_store_has_no_tables() {
        let store = MemoryStore::new();
        assert!(store.table_names().is_empty());
        assert!(!store.has_table("wallets").unwrap());
    }

    #[test]
    fn create_and_drop_table() {
        let store = MemoryStore::new();
        store.exec_ddl(&DdlOp::create_table("wallets")).unwrap();
        assert!(store.has_table("wallets").unwrap());

        store.exec_ddl(&DdlOp::drop_table("wallets")).unwrap();
        assert!(!store.has_table("wallets").unwrap());
    }

    #[test]
    fn create_existing_table_fails() {
        let store = MemoryStore::new();
        store.exec_ddl(&DdlOp::create_table("wallets")).unwrap();

        let result = store.exec_ddl(&DdlOp::create_table("wallets"));
        assert!(matches!(result, Err(StorageError::TableExists { .. })));
    }

    #[test]
    fn drop_missing_table_fails() {
        let store = MemoryStore::new();
        let result = store.exec_ddl(&DdlOp::drop_table("wallets"));
        assert!(matches!(result, Err(StorageError::NoSuchTable { .. })));
    }

    #[test]
    fn put_get_roundtrip() {
        let store = MemoryStore::new();
        store.exec_ddl(&DdlOp::create_table("wallets")).unwrap();

        let r = row(&[
            ("public_key", ColumnValue::Bytes(vec![0, 1, 255])),
            ("amount", ColumnValue::Int(100)),
        ]);
        store.put("wallets", "42", r.clone()).unwrap();
        assert_eq!(store.get("wallets", "42").unwrap(), Some(r));
    }

    #[test]
    fn bytes_roundtrip_exact() {
        let store = MemoryStore::new();
        store.exec_ddl(&DdlOp::create_table("blobs")).unwrap();

        let payload: Vec<u8> = (0..=255).collect();
        let r = row(&[("data", ColumnValue::Bytes(payload.clone()))]);
        store.put("blobs", "b", r).unwrap();

        let got = store.get("blobs", "b").unwrap().unwrap();
        assert_eq!(got["data"].as_bytes(), Some(payload.as_slice()));
    }

    #[test]
    fn put_to_missing_table_fails() {
        let store = MemoryStore::new();
        let result = store.put("wallets", "42", Row::new());
        assert!(matches!(result, Err(StorageError::NoSuchTable { .. })));
    }

    #[test]
    fn delete_is_idempotent() {
        let store = MemoryStore::new();
        store.exec_ddl(&DdlOp::create_table("wallets")).unwrap();
        store.put("wallets", "42", Row::new()).unwrap();

        store.delete("wallets", "42").unwrap();
        store.delete("wallets", "42").unwrap();
        assert_eq!(store.get("wallets", "42").unwrap(), None);
    }

    #[test]
    fn scan_returns_prefix_matches_in_order() {
        let store = MemoryStore::new();
        store.exec_ddl(&DdlOp::create_table("log")).unwrap();
        store.put("log", "aa:2", Row::new()).unwrap();
        store.put("log", "aa:1", Row::new()).unwrap();
        store.put("log", "ab:1", Row::new()).unwrap();

        let hits = store.scan("log", "aa:").unwrap();
        let ids: Vec<_> = hits.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["aa:1", "aa:2"]);
    }

    #[test]
    fn scan_empty_prefix_returns_all() {
        let store = MemoryStore::new();
        store.exec_ddl(&DdlOp::create_table("log")).unwrap();
        store.put("log", "a", Row::new()).unwrap();
        store.put("log", "b", Row::new()).unwrap();

        assert_eq!(store.scan("log", "").unwrap().len(), 2);
    }

    #[test]
    fn abort_restores_rows_and_tables() {
        let store = MemoryStore::new();
        store.exec_ddl(&DdlOp::create_table("wallets")).unwrap();
        store
            .put("wallets", "42", row(&[("amount", ColumnValue::Int(1))]))
            .unwrap();

        store.begin_scoped().unwrap();
        store
            .put("wallets", "42", row(&[("amount", ColumnValue::Int(2))]))
            .unwrap();
        store.exec_ddl(&DdlOp::create_table("pages")).unwrap();
        store.abort_scoped().unwrap();

        let got = store.get("wallets", "42").unwrap().unwrap();
        assert_eq!(got["amount"].as_int(), Some(1));
        assert!(!store.has_table("pages").unwrap());
        assert_eq!(store.boundary_depth(), 0);
    }

    #[test]
    fn commit_keeps_changes() {
        let store = MemoryStore::new();
        store.exec_ddl(&DdlOp::create_table("wallets")).unwrap();

        store.begin_scoped().unwrap();
        store.put("wallets", "42", Row::new()).unwrap();
        store.commit_scoped().unwrap();

        assert!(store.get("wallets", "42").unwrap().is_some());
    }

    #[test]
    fn boundaries_nest() {
        let store = MemoryStore::new();
        store.exec_ddl(&DdlOp::create_table("wallets")).unwrap();

        store.begin_scoped().unwrap();
        store.put("wallets", "outer", Row::new()).unwrap();

        store.begin_scoped().unwrap();
        store.put("wallets", "inner", Row::new()).unwrap();
        store.abort_scoped().unwrap();

        store.commit_scoped().unwrap();

        assert!(store.get("wallets", "outer").unwrap().is_some());
        assert_eq!(store.get("wallets", "inner").unwrap(), None);
    }

    #[test]
    fn unbalanced_commit_fails() {
        let store = MemoryStore::new();
        let result = store.commit_scoped();
        assert!(matches!(
            result,
            Err(StorageError::UnbalancedBoundary { .. })
        ));
    }

    #[test]
    fn unbalanced_abort_fails() {
        let store = MemoryStore::new();
        let result = store.abort_scoped();
        assert!(matches!(
            result,
            Err(StorageError::UnbalancedBoundary { .. })
        ));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn put_get_roundtrips_arbitrary_bytes(payload in proptest::collection::vec(any::<u8>(), 0..256)) {
                let store = MemoryStore::new();
                store.exec_ddl(&DdlOp::create_table("blobs")).unwrap();
                store
                    .put("blobs", "b", row(&[("data", ColumnValue::Bytes(payload.clone()))]))
                    .unwrap();

                let got = store.get("blobs", "b").unwrap().unwrap();
                prop_assert_eq!(got["data"].as_bytes(), Some(payload.as_slice()));
            }

            #[test]
            fn scan_matches_exactly_the_prefixed_ids(ids in proptest::collection::btree_set("[a-c]{1,4}", 1..12), prefix in "[a-c]{0,2}") {
                let store = MemoryStore::new();
                store.exec_ddl(&DdlOp::create_table("t")).unwrap();
                for id in &ids {
                    store.put("t", id, Row::new()).unwrap();
                }

                let hits: Vec<String> = store
                    .scan("t", &prefix)
                    .unwrap()
                    .into_iter()
                    .map(|(id, _)| id)
                    .collect();
                let expected: Vec<String> = ids
                    .iter()
                    .filter(|id| id.starts_with(&prefix))
                    .cloned()
                    .collect();
                prop_assert_eq!(hits, expected);
            }
        }
    }
}
