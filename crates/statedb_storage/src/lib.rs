//! # StateDB Storage
//!
//! Row-store trait and implementations for StateDB.
//!
//! This crate provides the lowest-level storage abstraction the StateDB
//! engine runs on. Row stores are **plain mutable table/row stores** - they
//! hold named tables of rows and execute schema operations, but they know
//! nothing about transactions, rollback entries, or state partitions. The
//! engine's own undo log is the atomicity mechanism; the store only has to
//! honor scoped boundaries.
//!
//! ## Design Principles
//!
//! - Stores are simple keyed row containers (get, put, delete, scan)
//! - Schema operations are data ([`DdlOp`]), not statement strings
//! - Column values are tagged ([`ColumnValue`]); binary columns round-trip
//!   byte-exactly
//! - Must be `Send + Sync` for concurrent access
//!
//! ## Available Stores
//!
//! - [`MemoryStore`] - For testing and ephemeral state
//!
//! ## Example
//!
//! ```rust
//! use statedb_storage::{ColumnValue, DdlOp, MemoryStore, Row, RowStore};
//!
//! let store = MemoryStore::new();
//! store.exec_ddl(&DdlOp::create_table("wallets")).unwrap();
//!
//! let mut row = Row::new();
//! row.insert("public_key".into(), ColumnValue::Bytes(vec![1, 2, 3]));
//! store.put("wallets", "42", row.clone()).unwrap();
//! assert_eq!(store.get("wallets", "42").unwrap(), Some(row));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod memory;
mod store;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
pub use store::{ColumnValue, DdlOp, Row, RowStore};
