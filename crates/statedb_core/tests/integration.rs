//! End-to-end tests for the transaction lifecycle engine.

use statedb_core::{
    ContractError, ContractLoader, Ed25519Verifier, Effect, Engine, LifecycleError,
    MutationRecorder, PartitionId, PendingQueue, RollbackError, SchemaRegistry,
    StaticContractLoader, TableKind, Transaction, TxType, PARTITIONS_TABLE, PERMISSIONS_COLUMN,
    ROLLBACK_LOG_TABLE,
};
use statedb_core::{BlockId, TxHash, WalletId};
use statedb_storage::{ColumnValue, MemoryStore, RowStore};
use statedb_testkit::{new_state_tx, test_engine, FaultStore, TestWallet};
use std::sync::Arc;

fn apply_states(engine: &Engine, wallet: &TestWallet, count: u64) -> Vec<Transaction> {
    (1..=count)
        .map(|i| {
            let tx = new_state_tx(wallet, i, &format!("State{i}"), &format!("S{i}"));
            engine.apply(&tx).unwrap();
            tx
        })
        .collect()
}

#[test]
fn wonderland_scenario() {
    let (store, engine) = test_engine();
    let wallet = TestWallet::new(42, 7);

    // Six earlier states, then Wonderland lands on identifier 7.
    apply_states(&engine, &wallet, 6);
    let tx = new_state_tx(&wallet, 7, "Wonderland", "WON");
    let effect = engine.apply(&tx).unwrap();
    assert_eq!(
        effect,
        Effect::PartitionCreated {
            partition: PartitionId::new(7)
        }
    );

    let seven = PartitionId::new(7);
    for kind in TableKind::ALL {
        assert!(store.has_table(&kind.qualified(seven)).unwrap());
    }
    let member = store.get(&TableKind::Members.qualified(seven), "42").unwrap();
    assert_eq!(
        member.unwrap()["public_key"].as_bytes(),
        Some(wallet.public_key().as_slice())
    );
    let registry = store.get(PARTITIONS_TABLE, "7").unwrap().unwrap();
    assert_eq!(registry["name"].as_text(), Some("Wonderland"));

    // Reversal drops every "7_*" table, deletes the registry row, and
    // rewinds the counter so the identifier is reused.
    engine.rollback(tx.hash()).unwrap();
    for kind in TableKind::ALL {
        assert!(!store.has_table(&kind.qualified(seven)).unwrap());
    }
    assert_eq!(store.get(PARTITIONS_TABLE, "7").unwrap(), None);
    assert_eq!(engine.schema().last_allocated().unwrap(), 6);

    let again = new_state_tx(&wallet, 8, "Wonderland", "WON");
    let effect = engine.apply(&again).unwrap();
    assert_eq!(
        effect,
        Effect::PartitionCreated {
            partition: PartitionId::new(7)
        }
    );
}

#[test]
fn rollback_is_idempotent_failure() {
    let (store, engine) = test_engine();
    let wallet = TestWallet::new(1, 1);
    let tx = new_state_tx(&wallet, 1, "Alpha", "ALP");
    engine.apply(&tx).unwrap();

    engine.rollback(tx.hash()).unwrap();
    let result = engine.rollback(tx.hash());
    assert!(matches!(result, Err(RollbackError::NotFound { .. })));
    assert_eq!(store.row_count(ROLLBACK_LOG_TABLE), Some(0));
}

#[test]
fn non_newest_partition_cannot_be_rolled_back() {
    let (_store, engine) = test_engine();
    let wallet = TestWallet::new(1, 1);
    let txs = apply_states(&engine, &wallet, 5);

    let result = engine.rollback(txs[2].hash());
    assert!(matches!(
        result,
        Err(RollbackError::PartitionOrder { id: 3, max: 5 })
    ));
    // The failed attempt consumed nothing: the newest can still go, and a
    // fresh creation reuses its identifier.
    engine.rollback(txs[4].hash()).unwrap();
    assert_eq!(engine.schema().last_allocated().unwrap(), 4);

    let tx = new_state_tx(&wallet, 9, "Replacement", "RPL");
    let effect = engine.apply(&tx).unwrap();
    assert_eq!(
        effect,
        Effect::PartitionCreated {
            partition: PartitionId::new(5)
        }
    );
}

#[test]
fn partition_creation_failure_leaves_no_tables() {
    let mem = Arc::new(MemoryStore::new());
    let fault = Arc::new(FaultStore::new(mem.clone()));
    let engine = Engine::new(
        fault.clone() as Arc<dyn RowStore>,
        Arc::new(Ed25519Verifier::new()),
        Arc::new(StaticContractLoader::new()),
    )
    .unwrap();
    let wallet = TestWallet::new(1, 1);

    // Three of the nine partition tables are created, then DDL fails.
    fault.arm_create_faults(3);
    let tx = new_state_tx(&wallet, 1, "Broken", "BRK");
    let result = engine.apply(&tx);
    assert!(matches!(result, Err(LifecycleError::Apply(_))));

    let one = PartitionId::new(1);
    for kind in TableKind::ALL {
        assert!(!mem.has_table(&kind.qualified(one)).unwrap());
    }
    assert_eq!(engine.schema().last_allocated().unwrap(), 0);
    assert_eq!(mem.row_count(ROLLBACK_LOG_TABLE), Some(0));
    assert_eq!(mem.boundary_depth(), 0);

    fault.disarm();
    let retry = new_state_tx(&wallet, 2, "Fixed", "FIX");
    let effect = engine.apply(&retry).unwrap();
    assert_eq!(
        effect,
        Effect::PartitionCreated {
            partition: PartitionId::new(1)
        }
    );
}

struct FailingLoader;

impl ContractLoader for FailingLoader {
    fn load_default_contract(&self, _partition: PartitionId) -> Result<String, ContractError> {
        Err(ContractError::new("contract repository unavailable"))
    }
}

#[test]
fn failed_apply_reverses_recorded_work() {
    let store = Arc::new(MemoryStore::new());
    let engine = Engine::new(
        store.clone() as Arc<dyn RowStore>,
        Arc::new(Ed25519Verifier::new()),
        Arc::new(FailingLoader),
    )
    .unwrap();
    let wallet = TestWallet::new(1, 1);

    // The contract load fails after the partition, its registry row, and
    // the table-registry row have all been recorded and written.
    let tx = new_state_tx(&wallet, 1, "Doomed", "DMD");
    let result = engine.apply(&tx);
    assert!(matches!(result, Err(LifecycleError::Apply(_))));

    let one = PartitionId::new(1);
    for kind in TableKind::ALL {
        assert!(!store.has_table(&kind.qualified(one)).unwrap());
    }
    assert_eq!(store.get(PARTITIONS_TABLE, "1").unwrap(), None);
    assert_eq!(engine.schema().last_allocated().unwrap(), 0);
    assert_eq!(store.row_count(ROLLBACK_LOG_TABLE), Some(0));
    assert_eq!(store.boundary_depth(), 0);
}

#[test]
fn malformed_payload_is_rejected_without_side_effects() {
    let (store, engine) = test_engine();
    let tx = Transaction::new(
        bytes::Bytes::from_static(&[0xde, 0xad, 0xbe, 0xef]),
        TxType::NewState,
        WalletId::new(1),
        BlockId::new(1),
        vec![],
    );

    let result = engine.apply(&tx);
    assert!(matches!(result, Err(LifecycleError::Decode(_))));
    assert_eq!(engine.schema().last_allocated().unwrap(), 0);
    assert_eq!(store.row_count(ROLLBACK_LOG_TABLE), Some(0));
}

#[test]
fn bad_signature_is_rejected_without_side_effects() {
    let (store, engine) = test_engine();
    let wallet = TestWallet::new(1, 1);
    let honest = new_state_tx(&wallet, 1, "Alpha", "ALP");

    // Same payload, signature from a different key.
    let impostor = TestWallet::new(1, 99);
    let forged = Transaction::new(
        bytes::Bytes::copy_from_slice(honest.raw()),
        TxType::NewState,
        wallet.id,
        BlockId::new(1),
        vec![impostor.sign(&honest.signing_bytes())],
    );

    let result = engine.apply(&forged);
    assert!(matches!(result, Err(LifecycleError::Validation(_))));
    assert_eq!(engine.schema().last_allocated().unwrap(), 0);
    assert_eq!(store.row_count(ROLLBACK_LOG_TABLE), Some(0));
}

#[test]
fn duplicate_state_name_is_rejected() {
    let (_store, engine) = test_engine();
    let wallet = TestWallet::new(1, 1);
    engine.apply(&new_state_tx(&wallet, 1, "Alpha", "ALP")).unwrap();

    let dup = new_state_tx(&wallet, 2, "Alpha", "AL2");
    let result = engine.apply(&dup);
    assert!(matches!(result, Err(LifecycleError::Validation(_))));
    assert_eq!(engine.schema().last_allocated().unwrap(), 1);
}

#[test]
fn empty_state_name_is_rejected() {
    let (_store, engine) = test_engine();
    let wallet = TestWallet::new(1, 1);
    let tx = new_state_tx(&wallet, 1, "", "ALP");

    let result = engine.apply(&tx);
    assert!(matches!(result, Err(LifecycleError::Validation(_))));
}

#[test]
fn finalized_transaction_is_dequeued() {
    let (_store, engine) = test_engine();
    let wallet = TestWallet::new(1, 1);
    let tx = new_state_tx(&wallet, 1, "Alpha", "ALP");

    engine.queue().enqueue(tx.hash(), tx.raw(), 3).unwrap();
    assert_eq!(engine.queue().count(tx.hash()).unwrap(), 1);

    engine.apply(&tx).unwrap();
    assert_eq!(engine.queue().count(tx.hash()).unwrap(), 0);
}

#[test]
fn permission_update_rolls_back_to_exact_prior_document() {
    let (store, engine) = test_engine();
    let wallet = TestWallet::new(1, 1);
    let tx = new_state_tx(&wallet, 1, "Alpha", "ALP");
    engine.apply(&tx).unwrap();

    let table = TableKind::Tables.qualified(PartitionId::new(1));
    let before = store.get(&table, "members").unwrap().unwrap();
    let prior_doc = before[PERMISSIONS_COLUMN].as_text().unwrap().to_owned();

    // A later permission-change transaction: snapshot first, then the keyed
    // document update.
    let dyn_store = store.clone() as Arc<dyn RowStore>;
    let recorder = MutationRecorder::new(dyn_store.clone());
    let registry = SchemaRegistry::new(dyn_store.clone());
    let change = TxHash::digest(b"permission-change");
    recorder
        .record_update(change, BlockId::new(2), &table, "members", &before)
        .unwrap();
    let affected = registry
        .set_column_permission(&table, "members", "update.public_key_0", "false", 2)
        .unwrap();
    assert_eq!(affected, 1);

    let updated = store.get(&table, "members").unwrap().unwrap();
    assert_ne!(updated[PERMISSIONS_COLUMN].as_text().unwrap(), prior_doc);

    engine.rollback(change).unwrap();
    let restored = store.get(&table, "members").unwrap().unwrap();
    assert_eq!(restored[PERMISSIONS_COLUMN].as_text(), Some(prior_doc.as_str()));
}

#[test]
fn wallet_key_is_backfilled_and_reversed() {
    let (store, engine) = test_engine();
    let wallet = TestWallet::new(42, 7);
    let tx = new_state_tx(&wallet, 1, "Alpha", "ALP");

    engine.apply(&tx).unwrap();
    let row = store
        .get(statedb_core::WALLETS_TABLE, "42")
        .unwrap()
        .unwrap();
    assert_eq!(
        row["public_key"].as_bytes(),
        Some(wallet.public_key().as_slice())
    );

    engine.rollback(tx.hash()).unwrap();
    assert_eq!(store.get(statedb_core::WALLETS_TABLE, "42").unwrap(), None);
}

#[test]
fn prune_makes_transaction_permanent() {
    let (store, engine) = test_engine();
    let wallet = TestWallet::new(1, 1);
    let tx = new_state_tx(&wallet, 1, "Alpha", "ALP");
    engine.apply(&tx).unwrap();

    let pruned = engine.prune(tx.hash()).unwrap();
    assert!(pruned > 0);
    assert!(matches!(
        engine.rollback(tx.hash()),
        Err(RollbackError::NotFound { .. })
    ));
    // The state itself survives.
    assert!(store
        .has_table(&TableKind::Members.qualified(PartitionId::new(1)))
        .unwrap());
}

#[test]
fn binary_columns_roundtrip_through_rollback() {
    let (store, engine) = test_engine();
    let wallet = TestWallet::new(1, 1);
    let tx = new_state_tx(&wallet, 1, "Alpha", "ALP");
    engine.apply(&tx).unwrap();

    let members = TableKind::Members.qualified(PartitionId::new(1));
    let original = store.get(&members, "1").unwrap().unwrap();
    let original_key = original["public_key"].as_bytes().unwrap().to_vec();

    // Overwrite the key with every byte value, then reverse.
    let dyn_store = store.clone() as Arc<dyn RowStore>;
    let recorder = MutationRecorder::new(dyn_store);
    let change = TxHash::digest(b"key-rotation");
    let mut mutated = original.clone();
    mutated.insert(
        "public_key".into(),
        ColumnValue::Bytes((0..=255).collect()),
    );
    recorder
        .update_row(change, BlockId::new(2), &members, "1", mutated)
        .unwrap();

    engine.rollback(change).unwrap();
    let restored = store.get(&members, "1").unwrap().unwrap();
    assert_eq!(
        restored["public_key"].as_bytes(),
        Some(original_key.as_slice())
    );
    assert_eq!(restored, original);
}
