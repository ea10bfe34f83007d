//! The append-only transaction log.

use crate::StoreError;
use chama_types::{
    Amount, GroupId, Timestamp, TransactionId, TransactionKind, TransactionStatus, UserId, WalletId,
};
use serde::{Deserialize, Serialize};

/// Immutable ledger entry. `from_wallet`/`to_wallet` name the core wallets
/// whose balances moved; `None` on a side means the counterparty is external.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: TransactionId,
    pub kind: TransactionKind,
    pub amount: Amount,
    pub currency: String,
    pub group: Option<GroupId>,
    pub initiator: UserId,
    pub recipient: Option<UserId>,
    pub from_wallet: Option<WalletId>,
    pub to_wallet: Option<WalletId>,
    pub status: TransactionStatus,
    pub metadata: serde_json::Value,
    pub created_at: Timestamp,
}

pub trait TransactionLog {
    /// Entries are never updated or deleted once appended.
    fn append_transaction(&mut self, tx: &TransactionRecord) -> Result<(), StoreError>;

    fn get_transaction(&mut self, id: &TransactionId) -> Result<TransactionRecord, StoreError>;

    /// Entries touching `wallet` on either side, oldest first.
    fn transactions_for_wallet(
        &mut self,
        wallet: &WalletId,
    ) -> Result<Vec<TransactionRecord>, StoreError>;

    fn transactions_for_group(
        &mut self,
        group: &GroupId,
    ) -> Result<Vec<TransactionRecord>, StoreError>;
}
