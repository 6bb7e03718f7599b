//! State partitions: the isolated per-tenant table namespaces.
//!
//! A partition is the fixed set of tables one logical ledger state owns,
//! all named `"<id>_<kind>"`. This module is the single place that composes
//! identifier-qualified table names and the only code that touches the
//! shared partition counter.

use crate::error::SchemaError;
use crate::types::{BlockId, PartitionId, WalletId};
use statedb_storage::{ColumnValue, DdlOp, Row, RowStore};
use std::sync::Arc;
use tracing::{debug, info};

/// Global registry of state partitions.
pub const PARTITIONS_TABLE: &str = "partitions";

/// Global table holding shared counter rows.
pub const COUNTERS_TABLE: &str = "counters";

/// Counter row tracking the highest allocated partition identifier.
const PARTITION_COUNTER_ROW: &str = "partition";

const COUNTER_VALUE_COLUMN: &str = "value";

/// Column of a table-registry row holding its permissions document.
pub const PERMISSIONS_COLUMN: &str = "permissions";

/// Column of a table-registry row holding its revision counter.
pub const REVISION_COLUMN: &str = "revision";

/// The fixed set of table kinds every state partition owns.
///
/// The enumeration order is the creation order; teardown drops in reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    /// Per-table permission registry.
    Tables,
    /// Smart-contract registry.
    Contracts,
    /// Page registry.
    Pages,
    /// Menu registry.
    Menus,
    /// Member registry.
    Members,
    /// Language registry.
    Languages,
    /// Signature registry.
    Signatures,
    /// Application registry.
    Apps,
    /// Miscellaneous-anchor registry.
    Anchors,
}

impl TableKind {
    /// All table kinds, in creation order.
    pub const ALL: [Self; 9] = [
        Self::Tables,
        Self::Contracts,
        Self::Pages,
        Self::Menus,
        Self::Members,
        Self::Languages,
        Self::Signatures,
        Self::Apps,
        Self::Anchors,
    ];

    /// Returns the name suffix for this kind.
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Tables => "tables",
            Self::Contracts => "contracts",
            Self::Pages => "pages",
            Self::Menus => "menus",
            Self::Members => "members",
            Self::Languages => "languages",
            Self::Signatures => "signatures",
            Self::Apps => "apps",
            Self::Anchors => "anchors",
        }
    }

    /// Returns the identifier-qualified table name for a partition.
    #[must_use]
    pub fn qualified(self, id: PartitionId) -> String {
        format!("{}_{}", id.as_u64(), self.suffix())
    }
}

/// Creates and tears down state partitions.
///
/// The registry owns the partition-identifier counter: a single shared row
/// that is read-modify-written only inside the scoped boundaries of
/// [`create_partition`](Self::create_partition) and
/// [`drop_partition`](Self::drop_partition), never elsewhere.
pub struct SchemaRegistry {
    store: Arc<dyn RowStore>,
}

impl SchemaRegistry {
    /// Creates a registry over a store.
    pub fn new(store: Arc<dyn RowStore>) -> Self {
        Self { store }
    }

    /// Seeds the counter row at store bootstrap if it is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the counter table cannot be read or written.
    pub fn init_counter(&self) -> Result<(), SchemaError> {
        if self.store.get(COUNTERS_TABLE, PARTITION_COUNTER_ROW)?.is_none() {
            self.write_counter(0)?;
        }
        Ok(())
    }

    /// Returns the highest allocated partition identifier.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::CounterCorrupt`] if the counter row is missing
    /// or malformed.
    pub fn last_allocated(&self) -> Result<u64, SchemaError> {
        let row = self
            .store
            .get(COUNTERS_TABLE, PARTITION_COUNTER_ROW)?
            .ok_or(SchemaError::CounterCorrupt)?;
        row.get(COUNTER_VALUE_COLUMN)
            .and_then(ColumnValue::as_int)
            .and_then(|n| u64::try_from(n).ok())
            .ok_or(SchemaError::CounterCorrupt)
    }

    fn write_counter(&self, value: u64) -> Result<(), SchemaError> {
        let mut row = Row::new();
        row.insert(COUNTER_VALUE_COLUMN.into(), ColumnValue::Int(value as i64));
        self.store
            .put(COUNTERS_TABLE, PARTITION_COUNTER_ROW, row)?;
        Ok(())
    }

    /// Allocates a new partition and creates its full table set.
    ///
    /// The identifier is returned only once every table exists. If any table
    /// creation fails partway, all previously created tables for this
    /// identifier are dropped and the counter is rewound before the error
    /// surfaces - no half-built partition persists.
    ///
    /// # Errors
    ///
    /// Returns an error if the counter cannot be advanced or a table cannot
    /// be created.
    pub fn create_partition(
        &self,
        owner: WalletId,
        block: BlockId,
    ) -> Result<PartitionId, SchemaError> {
        self.store.begin_scoped()?;
        match self.create_partition_inner() {
            Ok(id) => {
                self.store.commit_scoped()?;
                info!(%id, %owner, %block, "allocated state partition");
                Ok(id)
            }
            Err(err) => {
                let _ = self.store.abort_scoped();
                Err(err)
            }
        }
    }

    fn create_partition_inner(&self) -> Result<PartitionId, SchemaError> {
        let max = self.last_allocated()?;
        let id = PartitionId::new(max + 1);
        self.write_counter(id.as_u64())?;

        let mut created: Vec<String> = Vec::with_capacity(TableKind::ALL.len());
        for kind in TableKind::ALL {
            let name = kind.qualified(id);
            if let Err(err) = self.store.exec_ddl(&DdlOp::create_table(&name)) {
                for table in created.iter().rev() {
                    let _ = self.store.exec_ddl(&DdlOp::drop_table(table));
                }
                let _ = self.write_counter(max);
                return Err(SchemaError::ddl(name, err));
            }
            debug!(table = %name, "created partition table");
            created.push(name);
        }
        Ok(id)
    }

    /// Drops a partition and rewinds the identifier counter.
    ///
    /// Only the most recently allocated partition may be dropped: rewinding
    /// the counter to `id` is safe precisely because nothing newer exists.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::PartitionOrder`] if `id` is not the current
    /// maximum, or a DDL error if a table cannot be dropped.
    pub fn drop_partition(&self, id: PartitionId) -> Result<(), SchemaError> {
        self.store.begin_scoped()?;
        match self.drop_partition_inner(id) {
            Ok(()) => {
                self.store.commit_scoped()?;
                info!(%id, "dropped state partition");
                Ok(())
            }
            Err(err) => {
                let _ = self.store.abort_scoped();
                Err(err)
            }
        }
    }

    fn drop_partition_inner(&self, id: PartitionId) -> Result<(), SchemaError> {
        let max = self.last_allocated()?;
        if id.as_u64() != max {
            return Err(SchemaError::PartitionOrder {
                id: id.as_u64(),
                max,
            });
        }
        for kind in TableKind::ALL.iter().rev() {
            let name = kind.qualified(id);
            self.store
                .exec_ddl(&DdlOp::drop_table(&name))
                .map_err(|err| SchemaError::ddl(name, err))?;
        }
        // The next allocation reuses `id`.
        self.write_counter(id.as_u64() - 1)
    }

    /// Performs a keyed update inside the permissions document of a
    /// table-registry row.
    ///
    /// `action_key` is a dotted path into the JSON document (for example
    /// `update.public_key_0`); missing intermediate objects are created. The
    /// row's revision column is set to `revision`. Returns the number of
    /// rows affected (0 when the row does not exist).
    ///
    /// The update itself is not recorded; callers that need it reversible
    /// capture the row's before-image first.
    ///
    /// # Errors
    ///
    /// Returns an error if the existing document is not valid JSON or the
    /// store fails.
    pub fn set_column_permission(
        &self,
        table: &str,
        row_name: &str,
        action_key: &str,
        value: &str,
        revision: u64,
    ) -> Result<u64, SchemaError> {
        let Some(mut row) = self.store.get(table, row_name)? else {
            return Ok(0);
        };

        let doc_text = row
            .get(PERMISSIONS_COLUMN)
            .and_then(ColumnValue::as_text)
            .unwrap_or("{}");
        let mut doc: serde_json::Value =
            serde_json::from_str(doc_text).map_err(|_| SchemaError::Document {
                table: table.to_owned(),
                row: row_name.to_owned(),
            })?;

        let mut node = &mut doc;
        let mut parts = action_key.split('.').peekable();
        while let Some(part) = parts.next() {
            if !node.is_object() {
                *node = serde_json::Value::Object(serde_json::Map::new());
            }
            let Some(map) = node.as_object_mut() else {
                return Err(SchemaError::Document {
                    table: table.to_owned(),
                    row: row_name.to_owned(),
                });
            };
            if parts.peek().is_none() {
                map.insert(part.to_owned(), serde_json::Value::String(value.to_owned()));
                break;
            }
            node = map
                .entry(part.to_owned())
                .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
        }

        row.insert(PERMISSIONS_COLUMN.into(), ColumnValue::Text(doc.to_string()));
        row.insert(REVISION_COLUMN.into(), ColumnValue::Int(revision as i64));
        self.store.put(table, row_name, row)?;
        debug!(table, row_name, action_key, "updated column permission");
        Ok(1)
    }
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRegistry").finish_non_exhaustive()
    }
}
