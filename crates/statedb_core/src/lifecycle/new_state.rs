//! Effect procedure and validation for state-creation transactions.

use crate::contract::ContractLoader;
use crate::error::{ApplyError, ValidationError};
use crate::lifecycle::content;
use crate::lifecycle::WALLETS_TABLE;
use crate::partition::{
    SchemaRegistry, TableKind, PARTITIONS_TABLE, PERMISSIONS_COLUMN, REVISION_COLUMN,
};
use crate::rollback::MutationRecorder;
use crate::tx::{NewStatePayload, Transaction};
use crate::types::PartitionId;
use crate::verify::SignatureVerifier;
use statedb_storage::{ColumnValue, Row, RowStore, StorageError};
use std::sync::Arc;
use tracing::debug;

const PUBLIC_KEY_COLUMN: &str = "public_key";
const NAME_COLUMN: &str = "name";
const CONDITIONS_COLUMN: &str = "conditions";
const CONTENT_COLUMN: &str = "content";

/// Validates a state-creation transaction.
///
/// Validation only reads: structural checks, signature verification against
/// the sender's registered key, and the domain rule that the target state
/// name is not already taken. Nothing is recorded and no side effects occur.
pub(crate) fn validate(
    store: &Arc<dyn RowStore>,
    verifier: &dyn SignatureVerifier,
    tx: &Transaction,
    body: &NewStatePayload,
) -> Result<(), ValidationError> {
    if body.state_name.is_empty() {
        return Err(ValidationError::MissingField {
            field: "state_name",
        });
    }
    if body.currency_code.is_empty() {
        return Err(ValidationError::MissingField {
            field: "currency_code",
        });
    }

    let keys = sender_keys(store, tx, body)?;
    if !verifier.verify(&keys, &tx.signing_bytes(), tx.signatures()) {
        return Err(ValidationError::BadSignature {
            wallet: tx.sender().as_i64(),
        });
    }

    for (_, row) in store.scan(PARTITIONS_TABLE, "")? {
        if row.get(NAME_COLUMN).and_then(ColumnValue::as_text) == Some(body.state_name.as_str()) {
            return Err(ValidationError::StateExists {
                name: body.state_name.clone(),
            });
        }
    }
    Ok(())
}

/// Resolves the public keys to verify the sender's signatures against.
///
/// The wallet registry wins; the payload key is accepted only when the
/// sender has no key on record yet.
fn sender_keys(
    store: &Arc<dyn RowStore>,
    tx: &Transaction,
    body: &NewStatePayload,
) -> Result<Vec<Vec<u8>>, ValidationError> {
    let wallet_id = tx.sender().as_i64().to_string();
    let stored = store
        .get(WALLETS_TABLE, &wallet_id)?
        .and_then(|row| {
            row.get(PUBLIC_KEY_COLUMN)
                .and_then(ColumnValue::as_bytes)
                .filter(|key| !key.is_empty())
                .map(<[u8]>::to_vec)
        });
    match stored {
        Some(key) => Ok(vec![key]),
        None if !body.public_key.is_empty() => Ok(vec![body.public_key.clone()]),
        None => Err(ValidationError::UnknownSender {
            wallet: tx.sender().as_i64(),
        }),
    }
}

/// Executes the effect of a state-creation transaction.
///
/// Every row write goes through the mutation recorder first, so a failure
/// at any step leaves a fully reversible trail for the engine's rollback.
pub(crate) struct NewStateRun<'a> {
    pub store: &'a Arc<dyn RowStore>,
    pub recorder: &'a MutationRecorder,
    pub schema: &'a SchemaRegistry,
    pub contracts: &'a dyn ContractLoader,
}

impl NewStateRun<'_> {
    pub fn apply(
        &self,
        tx: &Transaction,
        body: &NewStatePayload,
    ) -> Result<PartitionId, ApplyError> {
        let hash = tx.hash();
        let block = tx.block();
        let owner = tx.sender();
        let cond = content::MAIN_CONDITION;

        let id = self.schema.create_partition(owner, block)?;
        debug!(%hash, %id, state = %body.state_name, "bootstrapping partition");

        // Registry row; its insertion entry is what later marks this
        // transaction as a partition creator during rollback.
        let mut registry = Row::new();
        registry.insert(NAME_COLUMN.into(), ColumnValue::text(&body.state_name));
        registry.insert("currency".into(), ColumnValue::text(&body.currency_code));
        registry.insert("owner".into(), ColumnValue::Int(owner.as_i64()));
        registry.insert("block".into(), ColumnValue::Int(block.as_u64() as i64));
        registry.insert(
            "tx_hash".into(),
            ColumnValue::Bytes(hash.as_bytes().to_vec()),
        );
        self.recorder
            .insert_row(hash, block, PARTITIONS_TABLE, &id.to_string(), registry)?;

        // Member-table permission registry row. The per-column update grant
        // is added afterwards through the keyed document update so the
        // bootstrap exercises the same path later permission changes take.
        let tables_table = TableKind::Tables.qualified(id);
        let doc = serde_json::json!({
            "general_update": cond,
            "insert": cond,
            "new_column": cond,
        });
        let mut members_registry = Row::new();
        members_registry.insert(
            PERMISSIONS_COLUMN.into(),
            ColumnValue::Text(doc.to_string()),
        );
        members_registry.insert(CONDITIONS_COLUMN.into(), ColumnValue::text(cond));
        members_registry.insert(REVISION_COLUMN.into(), ColumnValue::Int(0));
        self.recorder
            .insert_row(hash, block, &tables_table, "members", members_registry)?;

        self.seed_contract(tx, id)?;
        self.seed_pages(tx, id)?;
        self.seed_menus(tx, id)?;
        self.seed_languages(tx, id)?;
        self.seed_member(tx, body, id)?;
        self.backfill_wallet_key(tx, body)?;

        // Grant the owner-controlled update permission on the member
        // registry's key column, logging the prior document snapshot.
        let before = self.store.get(&tables_table, "members")?.ok_or_else(|| {
            StorageError::failure("member table registry row vanished during bootstrap")
        })?;
        self.recorder
            .record_update(hash, block, &tables_table, "members", &before)?;
        self.schema
            .set_column_permission(&tables_table, "members", "update.public_key_0", cond, 1)?;

        Ok(id)
    }

    fn seed_contract(&self, tx: &Transaction, id: PartitionId) -> Result<(), ApplyError> {
        let source = self.contracts.load_default_contract(id)?;
        let table = TableKind::Contracts.qualified(id);

        let mut row = Row::new();
        row.insert(NAME_COLUMN.into(), ColumnValue::text("MainCondition"));
        row.insert("source".into(), ColumnValue::Text(source));
        row.insert("owner".into(), ColumnValue::Int(tx.sender().as_i64()));
        row.insert("active".into(), ColumnValue::Int(1));
        row.insert(CONDITIONS_COLUMN.into(), ColumnValue::text(""));
        self.recorder
            .insert_row(tx.hash(), tx.block(), &table, "main_condition", row.clone())?;

        // The contract guards itself once it exists.
        row.insert(
            CONDITIONS_COLUMN.into(),
            ColumnValue::text(content::MAIN_CONDITION),
        );
        self.recorder
            .update_row(tx.hash(), tx.block(), &table, "main_condition", row)?;
        Ok(())
    }

    fn seed_pages(&self, tx: &Transaction, id: PartitionId) -> Result<(), ApplyError> {
        let table = TableKind::Pages.qualified(id);
        let pages = [
            (
                content::DASHBOARD_PAGE_NAME,
                content::DASHBOARD_PAGE,
                content::DEFAULT_MENU_NAME,
            ),
            (
                content::GOVERNMENT_PAGE_NAME,
                content::GOVERNMENT_PAGE,
                content::GOVERNMENT_MENU_NAME,
            ),
        ];
        for (name, markup, menu) in pages {
            let mut row = Row::new();
            row.insert(CONTENT_COLUMN.into(), ColumnValue::text(markup));
            row.insert("menu".into(), ColumnValue::text(menu));
            row.insert(
                CONDITIONS_COLUMN.into(),
                ColumnValue::text(content::MAIN_CONDITION),
            );
            self.recorder
                .insert_row(tx.hash(), tx.block(), &table, name, row)?;
        }
        Ok(())
    }

    fn seed_menus(&self, tx: &Transaction, id: PartitionId) -> Result<(), ApplyError> {
        let table = TableKind::Menus.qualified(id);
        let menus = [
            (content::DEFAULT_MENU_NAME, content::DEFAULT_MENU),
            (content::GOVERNMENT_MENU_NAME, content::GOVERNMENT_MENU),
        ];
        for (name, entries) in menus {
            let mut row = Row::new();
            row.insert(CONTENT_COLUMN.into(), ColumnValue::text(entries));
            row.insert(
                CONDITIONS_COLUMN.into(),
                ColumnValue::text(content::MAIN_CONDITION),
            );
            self.recorder
                .insert_row(tx.hash(), tx.block(), &table, name, row)?;
        }
        Ok(())
    }

    fn seed_languages(&self, tx: &Transaction, id: PartitionId) -> Result<(), ApplyError> {
        let table = TableKind::Languages.qualified(id);
        for (code, name) in content::DEFAULT_LANGUAGES {
            let mut row = Row::new();
            row.insert(NAME_COLUMN.into(), ColumnValue::text(name));
            row.insert(
                CONDITIONS_COLUMN.into(),
                ColumnValue::text(content::MAIN_CONDITION),
            );
            self.recorder
                .insert_row(tx.hash(), tx.block(), &table, code, row)?;
        }
        Ok(())
    }

    fn seed_member(
        &self,
        tx: &Transaction,
        body: &NewStatePayload,
        id: PartitionId,
    ) -> Result<(), ApplyError> {
        let wallet_id = tx.sender().as_i64().to_string();
        let member_key = self
            .store
            .get(WALLETS_TABLE, &wallet_id)?
            .and_then(|row| {
                row.get(PUBLIC_KEY_COLUMN)
                    .and_then(ColumnValue::as_bytes)
                    .filter(|key| !key.is_empty())
                    .map(<[u8]>::to_vec)
            })
            .unwrap_or_else(|| body.public_key.clone());

        let table = TableKind::Members.qualified(id);
        let mut row = Row::new();
        row.insert(PUBLIC_KEY_COLUMN.into(), ColumnValue::Bytes(member_key));
        self.recorder
            .insert_row(tx.hash(), tx.block(), &table, &wallet_id, row)?;
        Ok(())
    }

    /// Registers the payload key for senders with no key on record.
    fn backfill_wallet_key(
        &self,
        tx: &Transaction,
        body: &NewStatePayload,
    ) -> Result<(), ApplyError> {
        if body.public_key.is_empty() {
            return Ok(());
        }
        let wallet_id = tx.sender().as_i64().to_string();
        let mut row = Row::new();
        row.insert(
            PUBLIC_KEY_COLUMN.into(),
            ColumnValue::Bytes(body.public_key.clone()),
        );
        match self.store.get(WALLETS_TABLE, &wallet_id)? {
            None => {
                self.recorder
                    .insert_row(tx.hash(), tx.block(), WALLETS_TABLE, &wallet_id, row)?;
            }
            Some(existing) => {
                let has_key = existing
                    .get(PUBLIC_KEY_COLUMN)
                    .and_then(ColumnValue::as_bytes)
                    .is_some_and(|key| !key.is_empty());
                if !has_key {
                    self.recorder
                        .update_row(tx.hash(), tx.block(), WALLETS_TABLE, &wallet_id, row)?;
                }
            }
        }
        Ok(())
    }
}
