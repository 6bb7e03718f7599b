//! Deterministic fixtures for engine tests.

use bytes::Bytes;
use ed25519_dalek::{Signer, SigningKey};
use statedb_core::{
    BlockId, Ed25519Verifier, Engine, NewStatePayload, StaticContractLoader, Transaction,
    TxPayload, TxType, WalletId,
};
use statedb_storage::{MemoryStore, RowStore};
use std::sync::Arc;

/// A wallet with a deterministic ed25519 keypair.
///
/// Keys are derived from a fixed seed byte, so fixtures are reproducible
/// without any randomness.
pub struct TestWallet {
    /// The wallet identifier.
    pub id: WalletId,
    key: SigningKey,
}

impl TestWallet {
    /// Creates a wallet with the given id and key seed.
    #[must_use]
    pub fn new(id: i64, seed: u8) -> Self {
        Self {
            id: WalletId::new(id),
            key: SigningKey::from_bytes(&[seed; 32]),
        }
    }

    /// Returns the wallet's public key bytes.
    #[must_use]
    pub fn public_key(&self) -> Vec<u8> {
        self.key.verifying_key().to_bytes().to_vec()
    }

    /// Signs a message with the wallet's key.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.key.sign(message).to_bytes().to_vec()
    }
}

/// Encodes a payload the way transaction producers do.
#[must_use]
pub fn encode_payload(payload: &TxPayload) -> Vec<u8> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(payload, &mut buf).expect("payload encoding cannot fail");
    buf
}

/// Builds a signed state-creation transaction.
#[must_use]
pub fn new_state_tx(
    wallet: &TestWallet,
    block: u64,
    state_name: &str,
    currency_code: &str,
) -> Transaction {
    let payload = TxPayload::NewState(NewStatePayload {
        state_name: state_name.to_owned(),
        currency_code: currency_code.to_owned(),
        public_key: wallet.public_key(),
    });
    let raw = Bytes::from(encode_payload(&payload));

    let unsigned = Transaction::new(
        raw.clone(),
        TxType::NewState,
        wallet.id,
        BlockId::new(block),
        Vec::new(),
    );
    let signature = wallet.sign(&unsigned.signing_bytes());

    Transaction::new(
        raw,
        TxType::NewState,
        wallet.id,
        BlockId::new(block),
        vec![signature],
    )
}

/// Creates an engine over a fresh in-memory store.
///
/// The store handle is returned alongside so tests can inspect raw state.
#[must_use]
pub fn test_engine() -> (Arc<MemoryStore>, Engine) {
    let store = Arc::new(MemoryStore::new());
    let engine = Engine::new(
        store.clone() as Arc<dyn RowStore>,
        Arc::new(Ed25519Verifier::new()),
        Arc::new(StaticContractLoader::new()),
    )
    .expect("bootstrap over an empty in-memory store cannot fail");
    (store, engine)
}
