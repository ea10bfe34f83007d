//! Member-facing wallet operations.

use std::sync::Arc;

use chama_groups::resolve_membership;
use chama_store::{LedgerStore, TransactionRecord, WalletRecord};
use chama_types::{
    Amount, Clock, CoreError, Currency, Deadline, GroupId, TransactionKind, UserId, WalletOwner,
};
use serde_json::json;
use tracing::info;

use crate::settle::{group_wallet, personal_wallet, post, Posting};

pub struct WalletLedger<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    currency: Currency,
}

impl<S: LedgerStore> WalletLedger<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, currency: Currency) -> Self {
        Self {
            store,
            clock,
            currency,
        }
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    /// The user's personal wallet, opening it if absent.
    pub fn open_personal_wallet(
        &self,
        user: &UserId,
        deadline: &Deadline,
    ) -> Result<WalletRecord, CoreError> {
        let now = self.clock.now();
        self.store.with_transaction(|txn| {
            txn.get_user(user)?;
            let owner = WalletOwner::User(*user);
            let wallet = match txn.wallet_for_owner(&owner)? {
                Some(existing) => existing,
                None => {
                    let wallet = WalletRecord::open(owner, now);
                    txn.insert_wallet(&wallet)?;
                    info!(user = %user, wallet = %wallet.id, "personal wallet opened");
                    wallet
                }
            };
            deadline.check()?;
            Ok(wallet)
        })
    }

    pub fn balance(&self, user: &UserId) -> Result<Amount, CoreError> {
        self.store
            .read(|txn| personal_wallet(txn, user).map(|wallet| wallet.balance))
    }

    /// Balance of the group wallet, visible to members only.
    pub fn group_balance(&self, group: &GroupId, requester: &UserId) -> Result<Amount, CoreError> {
        self.store.read(|txn| {
            resolve_membership(txn, requester, group)?;
            let owner = WalletOwner::Group(*group);
            Ok(txn
                .wallet_for_owner(&owner)?
                .map(|wallet| wallet.balance)
                .unwrap_or(Amount::ZERO))
        })
    }

    /// Record an external top-up (mobile money, bank, cash) into the user's
    /// own wallet.
    pub fn deposit(
        &self,
        user: &UserId,
        amount: Amount,
        reference: &str,
        deadline: &Deadline,
    ) -> Result<TransactionRecord, CoreError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(CoreError::Validation("deposit reference must not be empty".into()));
        }
        let now = self.clock.now();
        let record = self.store.with_transaction(|txn| {
            let wallet = personal_wallet(txn, user)?;
            let posting = Posting::new(TransactionKind::Contribution, amount, *user)
                .to_recipient(*user)
                .between(None, Some(wallet.id))
                .with_metadata(json!({ "source": "deposit", "reference": reference }));
            let record = post(txn, &self.currency, posting, now)?;
            deadline.check()?;
            Ok::<_, CoreError>(record)
        })?;
        info!(user = %user, amount = %self.currency.format(amount), "deposit recorded");
        Ok(record)
    }

    /// Move `amount` from the member's wallet into the group wallet.
    pub fn contribute(
        &self,
        group: &GroupId,
        member: &UserId,
        amount: Amount,
        deadline: &Deadline,
    ) -> Result<TransactionRecord, CoreError> {
        let now = self.clock.now();
        let record = self.store.with_transaction(|txn| {
            resolve_membership(txn, member, group)?;
            let from = personal_wallet(txn, member)?;
            let to = group_wallet(txn, group, now)?;
            let posting = Posting::new(TransactionKind::Contribution, amount, *member)
                .in_group(*group)
                .between(Some(from.id), Some(to.id));
            let record = post(txn, &self.currency, posting, now)?;
            deadline.check()?;
            Ok::<_, CoreError>(record)
        })?;
        info!(group = %group, member = %member, amount = %self.currency.format(amount), "contribution committed");
        Ok(record)
    }

    /// Member-to-member transfer within a group both belong to.
    pub fn transfer(
        &self,
        group: &GroupId,
        from: &UserId,
        to: &UserId,
        amount: Amount,
        deadline: &Deadline,
    ) -> Result<TransactionRecord, CoreError> {
        if from == to {
            return Err(CoreError::Validation("cannot transfer to yourself".into()));
        }
        let now = self.clock.now();
        let record = self.store.with_transaction(|txn| {
            resolve_membership(txn, from, group)?;
            resolve_membership(txn, to, group)?;
            let source = personal_wallet(txn, from)?;
            let target = personal_wallet(txn, to)?;
            let posting = Posting::new(TransactionKind::Transfer, amount, *from)
                .in_group(*group)
                .to_recipient(*to)
                .between(Some(source.id), Some(target.id));
            let record = post(txn, &self.currency, posting, now)?;
            deadline.check()?;
            Ok::<_, CoreError>(record)
        })?;
        info!(group = %group, from = %from, to = %to, "transfer committed");
        Ok(record)
    }

    /// Pay `amount` out of the user's wallet to an external destination.
    pub fn withdraw(
        &self,
        user: &UserId,
        amount: Amount,
        destination: &str,
        deadline: &Deadline,
    ) -> Result<TransactionRecord, CoreError> {
        let destination = destination.trim();
        if destination.is_empty() {
            return Err(CoreError::Validation("withdrawal destination must not be empty".into()));
        }
        let now = self.clock.now();
        let record = self.store.with_transaction(|txn| {
            let wallet = personal_wallet(txn, user)?;
            let posting = Posting::new(TransactionKind::Withdrawal, amount, *user)
                .between(Some(wallet.id), None)
                .with_metadata(json!({ "destination": destination }));
            let record = post(txn, &self.currency, posting, now)?;
            deadline.check()?;
            Ok::<_, CoreError>(record)
        })?;
        info!(user = %user, amount = %self.currency.format(amount), "withdrawal committed");
        Ok(record)
    }

    /// Ledger entries touching the user's wallet, oldest first.
    pub fn history(&self, user: &UserId) -> Result<Vec<TransactionRecord>, CoreError> {
        self.store.read(|txn| {
            let wallet = personal_wallet(txn, user)?;
            Ok(txn.transactions_for_wallet(&wallet.id)?)
        })
    }

    /// Ledger entries of a group, visible to its members.
    pub fn group_history(
        &self,
        group: &GroupId,
        requester: &UserId,
    ) -> Result<Vec<TransactionRecord>, CoreError> {
        self.store.read(|txn| {
            resolve_membership(txn, requester, group)?;
            Ok(txn.transactions_for_group(group)?)
        })
    }
}
