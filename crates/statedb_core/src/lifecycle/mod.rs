//! Transaction lifecycle state machine.
//!
//! One transaction moves through `Received → Decoded → Validated → Applied`
//! and ends in `Finalized`, `RolledBack`, or `Rejected`. Decode and
//! validation only read; every state-mutating phase is serialized behind a
//! single logical writer per engine instance.

pub mod content;
mod new_state;

use crate::contract::ContractLoader;
use crate::error::{LifecycleError, RollbackError, SchemaError};
use crate::partition::{SchemaRegistry, COUNTERS_TABLE, PARTITIONS_TABLE};
use crate::queue::{PendingQueue, StoreQueue, QUEUE_TABLE};
use crate::rollback::{MutationRecorder, RollbackEngine, ROLLBACK_LOG_TABLE};
use crate::tx::{Transaction, TxPayload};
use crate::types::{PartitionId, TxHash};
use crate::verify::SignatureVerifier;
use new_state::NewStateRun;
use parking_lot::Mutex;
use statedb_storage::{DdlOp, RowStore};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Global wallet registry table.
pub const WALLETS_TABLE: &str = "wallets";

/// Phase of a transaction's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Raw transaction accepted, nothing interpreted yet.
    Received,
    /// Payload parsed into its typed body.
    Decoded,
    /// Structural, signature, and domain checks passed.
    Validated,
    /// Effect procedure is executing or has executed.
    Applied,
    /// Terminal success; entries remain until pruned.
    Finalized,
    /// Terminal; every recorded mutation was reversed.
    RolledBack,
    /// Terminal; nothing was recorded, no side effects.
    Rejected,
}

impl Phase {
    /// Returns whether `next` is a legal successor of this phase.
    #[must_use]
    pub fn permits(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Received, Self::Decoded | Self::Rejected)
                | (Self::Decoded, Self::Validated | Self::Rejected)
                | (Self::Validated, Self::Applied | Self::Rejected)
                | (Self::Applied, Self::Finalized | Self::RolledBack)
                | (Self::Finalized, Self::RolledBack)
        )
    }

    /// Returns whether this phase is terminal.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::RolledBack | Self::Rejected)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::Decoded => "decoded",
            Self::Validated => "validated",
            Self::Applied => "applied",
            Self::Finalized => "finalized",
            Self::RolledBack => "rolled-back",
            Self::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// Outcome of a successfully applied transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// A new state partition was created.
    PartitionCreated {
        /// The allocated partition.
        partition: PartitionId,
    },
}

/// The transaction lifecycle engine.
///
/// Sequences decode, validation, effect application, and reversal for one
/// transaction at a time. Apply and Rollback are not safe to interleave on
/// overlapping rows or the partition counter, so both run behind the
/// engine's writer lock; validation only reads and may run concurrently
/// across transactions.
pub struct Engine {
    store: Arc<dyn RowStore>,
    verifier: Arc<dyn SignatureVerifier>,
    contracts: Arc<dyn ContractLoader>,
    recorder: MutationRecorder,
    schema: SchemaRegistry,
    rollback_engine: RollbackEngine,
    queue: StoreQueue,
    write_lock: Mutex<()>,
}

impl Engine {
    /// Creates an engine over a store, bootstrapping the global tables and
    /// the partition counter if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if a global table cannot be created or the counter
    /// cannot be seeded.
    pub fn new(
        store: Arc<dyn RowStore>,
        verifier: Arc<dyn SignatureVerifier>,
        contracts: Arc<dyn ContractLoader>,
    ) -> Result<Self, SchemaError> {
        for table in [
            ROLLBACK_LOG_TABLE,
            PARTITIONS_TABLE,
            COUNTERS_TABLE,
            WALLETS_TABLE,
            QUEUE_TABLE,
        ] {
            if !store.has_table(table)? {
                store
                    .exec_ddl(&DdlOp::create_table(table))
                    .map_err(|err| SchemaError::ddl(table, err))?;
            }
        }
        let schema = SchemaRegistry::new(store.clone());
        schema.init_counter()?;

        Ok(Self {
            recorder: MutationRecorder::new(store.clone()),
            rollback_engine: RollbackEngine::new(store.clone()),
            queue: StoreQueue::new(store.clone()),
            schema,
            store,
            verifier,
            contracts,
            write_lock: Mutex::new(()),
        })
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn RowStore> {
        &self.store
    }

    /// Returns the pending-transaction intake queue.
    #[must_use]
    pub fn queue(&self) -> &StoreQueue {
        &self.queue
    }

    /// Returns the partition schema registry.
    #[must_use]
    pub fn schema(&self) -> &SchemaRegistry {
        &self.schema
    }

    /// Applies one transaction.
    ///
    /// Malformed payloads and validation failures reject the transaction
    /// with no side effects. Once application begins, any downstream error
    /// triggers the engine's own rollback of everything recorded under this
    /// transaction's hash before the error surfaces.
    ///
    /// # Errors
    ///
    /// Returns the rejection or application error; in the application case,
    /// partial work has already been reversed.
    pub fn apply(&self, tx: &Transaction) -> Result<Effect, LifecycleError> {
        let hash = tx.hash();
        let mut phase = Phase::Received;

        let payload = match tx.decode_payload() {
            Ok(payload) => payload,
            Err(err) => {
                let _ = transition(hash, phase, Phase::Rejected);
                return Err(err.into());
            }
        };
        phase = transition(hash, phase, Phase::Decoded);

        let TxPayload::NewState(body) = &payload;
        if let Err(err) = new_state::validate(&self.store, self.verifier.as_ref(), tx, body) {
            let _ = transition(hash, phase, Phase::Rejected);
            return Err(err.into());
        }
        phase = transition(hash, phase, Phase::Validated);

        let _writer = self.write_lock.lock();
        phase = transition(hash, phase, Phase::Applied);

        let run = NewStateRun {
            store: &self.store,
            recorder: &self.recorder,
            schema: &self.schema,
            contracts: self.contracts.as_ref(),
        };
        match run.apply(tx, body) {
            Ok(partition) => {
                if let Err(err) = self.queue.dequeue_by_hash(hash) {
                    warn!(%hash, %err, "failed to dequeue finalized transaction");
                }
                let _ = transition(hash, phase, Phase::Finalized);
                info!(%hash, %partition, "state partition created");
                Ok(Effect::PartitionCreated { partition })
            }
            Err(err) => {
                warn!(%hash, %err, "apply failed, reversing partial work");
                match self.rollback_engine.rollback(hash) {
                    Ok(()) => {
                        let _ = transition(hash, phase, Phase::RolledBack);
                    }
                    // Nothing was recorded before the failure.
                    Err(RollbackError::NotFound { .. }) => {}
                    Err(rollback_err) => {
                        warn!(%hash, %rollback_err, "reversal of failed apply did not complete");
                    }
                }
                Err(err.into())
            }
        }
    }

    /// Rolls back an applied or finalized transaction.
    ///
    /// # Errors
    ///
    /// See [`RollbackEngine::rollback`].
    pub fn rollback(&self, hash: TxHash) -> Result<(), RollbackError> {
        let _writer = self.write_lock.lock();
        self.rollback_engine.rollback(hash)
    }

    /// Prunes a finalized transaction's rollback entries, making it
    /// permanent.
    ///
    /// Returns the number of entries removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails; no entries are consumed then.
    pub fn prune(&self, hash: TxHash) -> Result<u64, RollbackError> {
        let _writer = self.write_lock.lock();
        Ok(self.rollback_engine.prune(hash)?)
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine").finish_non_exhaustive()
    }
}

fn transition(hash: TxHash, from: Phase, to: Phase) -> Phase {
    debug_assert!(from.permits(to), "illegal phase transition {from} -> {to}");
    debug!(%hash, %from, %to, "phase transition");
    to
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions_are_legal() {
        assert!(Phase::Received.permits(Phase::Decoded));
        assert!(Phase::Decoded.permits(Phase::Validated));
        assert!(Phase::Validated.permits(Phase::Applied));
        assert!(Phase::Applied.permits(Phase::Finalized));
    }

    #[test]
    fn rejection_is_only_reachable_before_apply() {
        assert!(Phase::Received.permits(Phase::Rejected));
        assert!(Phase::Decoded.permits(Phase::Rejected));
        assert!(Phase::Validated.permits(Phase::Rejected));
        assert!(!Phase::Applied.permits(Phase::Rejected));
        assert!(!Phase::Finalized.permits(Phase::Rejected));
    }

    #[test]
    fn rollback_is_reachable_from_applied_and_finalized() {
        assert!(Phase::Applied.permits(Phase::RolledBack));
        assert!(Phase::Finalized.permits(Phase::RolledBack));
        assert!(!Phase::Validated.permits(Phase::RolledBack));
    }

    #[test]
    fn terminal_phases_permit_nothing() {
        for phase in [Phase::Rejected, Phase::RolledBack] {
            assert!(phase.is_terminal());
            for next in [
                Phase::Received,
                Phase::Decoded,
                Phase::Validated,
                Phase::Applied,
                Phase::Finalized,
                Phase::RolledBack,
                Phase::Rejected,
            ] {
                assert!(!phase.permits(next));
            }
        }
    }

    #[test]
    fn no_skipping_forward() {
        assert!(!Phase::Received.permits(Phase::Validated));
        assert!(!Phase::Decoded.permits(Phase::Applied));
        assert!(!Phase::Validated.permits(Phase::Finalized));
    }
}
