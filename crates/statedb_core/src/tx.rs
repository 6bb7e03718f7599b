//! Transaction envelope and payload types.

use crate::error::DecodeError;
use crate::types::{BlockId, TxHash, WalletId};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Declared type of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TxType {
    /// Creates a new state partition.
    NewState = 1,
}

impl TxType {
    /// Converts the type to its wire code.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// Body of a state-creation transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStatePayload {
    /// Name of the state to create.
    pub state_name: String,
    /// Currency code of the state.
    pub currency_code: String,
    /// Sender public key, used to bootstrap the wallet registry when the
    /// sender has no key on record yet.
    pub public_key: Vec<u8>,
}

/// Typed transaction payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxPayload {
    /// A state-creation transaction body.
    NewState(NewStatePayload),
}

impl TxPayload {
    /// Returns the transaction type this payload belongs to.
    #[must_use]
    pub const fn tx_type(&self) -> TxType {
        match self {
            Self::NewState(_) => TxType::NewState,
        }
    }
}

/// An accepted transaction.
///
/// Immutable once constructed; the hash is the SHA-256 digest of the raw
/// payload and is what every rollback entry the transaction produces refers
/// back to.
#[derive(Debug, Clone)]
pub struct Transaction {
    hash: TxHash,
    raw: Bytes,
    tx_type: TxType,
    sender: WalletId,
    block: BlockId,
    signatures: Vec<Vec<u8>>,
}

impl Transaction {
    /// Creates a transaction from its raw payload and envelope fields.
    #[must_use]
    pub fn new(
        raw: Bytes,
        tx_type: TxType,
        sender: WalletId,
        block: BlockId,
        signatures: Vec<Vec<u8>>,
    ) -> Self {
        let hash = TxHash::digest(&raw);
        Self {
            hash,
            raw,
            tx_type,
            sender,
            block,
            signatures,
        }
    }

    /// Returns the content hash.
    #[must_use]
    pub const fn hash(&self) -> TxHash {
        self.hash
    }

    /// Returns the raw payload bytes.
    #[must_use]
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Returns the declared transaction type.
    #[must_use]
    pub const fn tx_type(&self) -> TxType {
        self.tx_type
    }

    /// Returns the sender wallet.
    #[must_use]
    pub const fn sender(&self) -> WalletId {
        self.sender
    }

    /// Returns the block this transaction belongs to.
    #[must_use]
    pub const fn block(&self) -> BlockId {
        self.block
    }

    /// Returns the signature set.
    #[must_use]
    pub fn signatures(&self) -> &[Vec<u8>] {
        &self.signatures
    }

    /// Returns the bytes the sender signed.
    ///
    /// The signed message covers the declared type, sender, block, and the
    /// raw payload, so none of them can be swapped under an existing
    /// signature.
    #[must_use]
    pub fn signing_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(1 + 8 + 8 + self.raw.len());
        buf.push(self.tx_type.as_byte());
        buf.extend_from_slice(&self.sender.as_i64().to_le_bytes());
        buf.extend_from_slice(&self.block.as_u64().to_le_bytes());
        buf.extend_from_slice(&self.raw);
        buf
    }

    /// Decodes the raw payload into its typed body.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if the payload is not valid CBOR for
    /// [`TxPayload`], or if the decoded variant does not match the declared
    /// transaction type.
    pub fn decode_payload(&self) -> Result<TxPayload, DecodeError> {
        let payload: TxPayload = ciborium::de::from_reader(self.raw.as_ref())
            .map_err(|e| DecodeError::new(e.to_string()))?;
        if payload.tx_type() != self.tx_type {
            return Err(DecodeError::new(format!(
                "payload does not match declared type {:?}",
                self.tx_type
            )));
        }
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(payload: &TxPayload) -> Vec<u8> {
        let mut buf = Vec::new();
        ciborium::ser::into_writer(payload, &mut buf).unwrap();
        buf
    }

    fn new_state_tx() -> Transaction {
        let payload = TxPayload::NewState(NewStatePayload {
            state_name: "Wonderland".into(),
            currency_code: "WON".into(),
            public_key: vec![7; 32],
        });
        Transaction::new(
            Bytes::from(encode(&payload)),
            TxType::NewState,
            WalletId::new(42),
            BlockId::new(1),
            vec![vec![0; 64]],
        )
    }

    #[test]
    fn hash_is_digest_of_raw() {
        let tx = new_state_tx();
        assert_eq!(tx.hash(), TxHash::digest(tx.raw()));
    }

    #[test]
    fn decode_roundtrip() {
        let tx = new_state_tx();
        let TxPayload::NewState(body) = tx.decode_payload().unwrap();
        assert_eq!(body.state_name, "Wonderland");
        assert_eq!(body.currency_code, "WON");
    }

    #[test]
    fn decode_rejects_garbage() {
        let tx = Transaction::new(
            Bytes::from_static(&[0xff, 0x00, 0x01]),
            TxType::NewState,
            WalletId::new(1),
            BlockId::new(1),
            vec![],
        );
        assert!(tx.decode_payload().is_err());
    }

    #[test]
    fn signing_bytes_cover_envelope() {
        let tx = new_state_tx();
        let bytes = tx.signing_bytes();
        assert_eq!(bytes[0], TxType::NewState.as_byte());
        assert!(bytes.ends_with(tx.raw()));

        let other = Transaction::new(
            Bytes::copy_from_slice(tx.raw()),
            TxType::NewState,
            WalletId::new(43),
            BlockId::new(1),
            vec![],
        );
        assert_ne!(bytes, other.signing_bytes());
    }
}
