//! # StateDB Core
//!
//! State-mutation and rollback engine for a ledger node.
//!
//! Every accepted transaction applies a set of row- and schema-level
//! mutations to a shared row store, and any mutation must be perfectly
//! reversible if the transaction is later rejected, reorganized away, or
//! fails mid-application. There is no general-purpose transactional storage
//! engine underneath: the rollback log *is* the atomicity mechanism, layered
//! on top of plain mutable storage.
//!
//! This crate provides:
//! - The mutation recorder: a reversible log entry before every row write
//! - The rollback engine: all-or-nothing reversal of everything a
//!   transaction recorded
//! - The state-partition manager: creation and atomic teardown of the
//!   per-tenant table namespace, with leak-free identifier allocation
//! - The transaction lifecycle state machine orchestrating decode,
//!   validation, application, and reversal

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod contract;
mod error;
mod lifecycle;
mod partition;
mod queue;
mod rollback;
mod tx;
mod types;
mod verify;

pub use contract::{ContractLoader, StaticContractLoader};
pub use error::{
    ApplyError, ContractError, DecodeError, LifecycleError, RollbackError, SchemaError,
    ValidationError,
};
pub use lifecycle::{content, Effect, Engine, Phase, WALLETS_TABLE};
pub use partition::{
    SchemaRegistry, TableKind, COUNTERS_TABLE, PARTITIONS_TABLE, PERMISSIONS_COLUMN,
    REVISION_COLUMN,
};
pub use queue::{PendingQueue, StoreQueue, QUEUE_TABLE};
pub use rollback::{MutationRecorder, RollbackEngine, RollbackEntry, ROLLBACK_LOG_TABLE};
pub use tx::{NewStatePayload, Transaction, TxPayload, TxType};
pub use types::{BlockId, EntrySeq, PartitionId, TxHash, WalletId};
pub use verify::{Ed25519Verifier, SignatureVerifier};
