//! Settlement primitives, called inside an open store transaction.

use chama_store::{LedgerTxn, TransactionRecord, WalletRecord};
use chama_types::{
    Amount, CoreError, Currency, GroupId, Timestamp, TransactionId, TransactionKind,
    TransactionStatus, UserId, WalletId, WalletOwner,
};

/// One balance movement and its ledger entry.
///
/// `from` is debited and `to` credited by `amount`. Either side may be absent
/// when the counterparty lives outside the core (a mobile-money top-up has no
/// `from`, a withdrawal has no `to`).
#[derive(Clone, Debug)]
pub struct Posting {
    pub kind: TransactionKind,
    pub amount: Amount,
    pub group: Option<GroupId>,
    pub initiator: UserId,
    pub recipient: Option<UserId>,
    pub from: Option<WalletId>,
    pub to: Option<WalletId>,
    pub metadata: serde_json::Value,
}

impl Posting {
    pub fn new(kind: TransactionKind, amount: Amount, initiator: UserId) -> Self {
        Self {
            kind,
            amount,
            group: None,
            initiator,
            recipient: None,
            from: None,
            to: None,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn in_group(mut self, group: GroupId) -> Self {
        self.group = Some(group);
        self
    }

    pub fn to_recipient(mut self, recipient: UserId) -> Self {
        self.recipient = Some(recipient);
        self
    }

    pub fn between(mut self, from: Option<WalletId>, to: Option<WalletId>) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Apply the wallet deltas and append a completed ledger entry.
///
/// Debit happens first so an underfunded source fails with
/// `InsufficientFunds` before anything is credited. The caller's transaction
/// rolls back every partial effect on error.
pub fn post(
    txn: &mut dyn LedgerTxn,
    currency: &Currency,
    posting: Posting,
    at: Timestamp,
) -> Result<TransactionRecord, CoreError> {
    if posting.amount.is_zero() {
        return Err(CoreError::Validation("amount must be positive".into()));
    }
    posting.amount.ensure_in_range()?;
    if posting.from.is_some() && posting.from == posting.to {
        return Err(CoreError::Validation("cannot move funds within one wallet".into()));
    }
    if let Some(from) = &posting.from {
        txn.debit(from, posting.amount, at)?;
    }
    if let Some(to) = &posting.to {
        txn.credit(to, posting.amount, at)?;
    }
    let record = TransactionRecord {
        id: TransactionId::new(),
        kind: posting.kind,
        amount: posting.amount,
        currency: currency.code.clone(),
        group: posting.group,
        initiator: posting.initiator,
        recipient: posting.recipient,
        from_wallet: posting.from,
        to_wallet: posting.to,
        status: TransactionStatus::Completed,
        metadata: posting.metadata,
        created_at: at,
    };
    txn.append_transaction(&record)?;
    Ok(record)
}

/// The user's personal wallet.
pub fn personal_wallet(txn: &mut dyn LedgerTxn, user: &UserId) -> Result<WalletRecord, CoreError> {
    txn.wallet_for_owner(&WalletOwner::User(*user))?
        .ok_or_else(|| CoreError::not_found("wallet", format!("personal wallet of {user}")))
}

/// The group wallet, opened on first use.
pub fn group_wallet(txn: &mut dyn LedgerTxn, group: &GroupId, at: Timestamp) -> Result<WalletRecord, CoreError> {
    let owner = WalletOwner::Group(*group);
    if let Some(wallet) = txn.wallet_for_owner(&owner)? {
        return Ok(wallet);
    }
    let wallet = WalletRecord::open(owner, at);
    txn.insert_wallet(&wallet)?;
    Ok(wallet)
}
