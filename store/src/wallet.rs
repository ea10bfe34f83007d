//! Wallets: one personal wallet per user, at most one group wallet per group.

use crate::StoreError;
use chama_types::{Amount, Timestamp, WalletId, WalletOwner};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletRecord {
    pub id: WalletId,
    pub owner: WalletOwner,
    pub balance: Amount,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl WalletRecord {
    pub fn open(owner: WalletOwner, at: Timestamp) -> Self {
        Self {
            id: WalletId::new(),
            owner,
            balance: Amount::ZERO,
            created_at: at,
            updated_at: at,
        }
    }
}

pub trait WalletStore {
    /// Fails with `Duplicate` if the owner already has a wallet.
    fn insert_wallet(&mut self, wallet: &WalletRecord) -> Result<(), StoreError>;

    fn get_wallet(&mut self, id: &WalletId) -> Result<WalletRecord, StoreError>;

    fn wallet_for_owner(&mut self, owner: &WalletOwner) -> Result<Option<WalletRecord>, StoreError>;

    /// Add `amount` to the balance and return the new balance.
    fn credit(&mut self, id: &WalletId, amount: Amount, at: Timestamp)
        -> Result<Amount, StoreError>;

    /// Subtract `amount` and return the new balance. Fails with
    /// `InsufficientFunds` rather than letting the balance go negative.
    fn debit(&mut self, id: &WalletId, amount: Amount, at: Timestamp) -> Result<Amount, StoreError>;

    fn list_wallets(&mut self) -> Result<Vec<WalletRecord>, StoreError>;
}
