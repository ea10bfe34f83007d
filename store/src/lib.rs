//! Abstract storage traits for the chama ledger.
//!
//! Every storage backend (SQLite, in-memory for testing) implements these
//! traits. The engines depend only on the traits.
//!
//! All access goes through a [`LedgerTxn`] handle obtained from a
//! [`LedgerStore`]. Mutations made through the handle commit together when the
//! closure returns `Ok` and roll back together when it returns `Err`.

pub mod error;
pub mod ledger;
pub mod meeting;
pub mod membership;
pub mod poll;
pub mod retry;
pub mod shares;
pub mod wallet;

pub use error::StoreError;
pub use ledger::{TransactionLog, TransactionRecord};
pub use meeting::{AttendanceRecord, MeetingRecord, MeetingStore};
pub use membership::{GroupRecord, MembershipRecord, MembershipStore, RoleChangeRecord, UserRecord};
pub use poll::{PollOptionRecord, PollRecord, PollStore, RoleEscalationRecord, VoteRecord};
pub use retry::{RetryPolicy, Retryable};
pub use shares::{
    DividendDeclarationRecord, ShareHoldingRecord, ShareOfferingRecord, ShareStore,
    ShareTransactionRecord,
};
pub use wallet::{WalletRecord, WalletStore};

use std::fmt::Display;

/// A transactional handle over every entity store.
pub trait LedgerTxn:
    MembershipStore + WalletStore + TransactionLog + PollStore + ShareStore + MeetingStore
{
}

impl<T> LedgerTxn for T where
    T: MembershipStore + WalletStore + TransactionLog + PollStore + ShareStore + MeetingStore
{
}

/// A store that hands out transactional handles.
pub trait LedgerStore: Send + Sync + 'static {
    /// Run `f` in a single transaction with serializable isolation.
    /// Commits when `f` returns `Ok`, rolls back when it returns `Err`.
    fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn LedgerTxn) -> Result<T, E>,
        E: From<StoreError>;

    /// Run `f` against a consistent snapshot. Writes made by `f` are discarded.
    fn read<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn LedgerTxn) -> Result<T, E>,
        E: From<StoreError>;

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
    }

    /// [`LedgerStore::transaction`], re-run from scratch when it fails with a
    /// serialization conflict, up to the store's retry budget.
    fn with_transaction<T, E, F>(&self, mut f: F) -> Result<T, E>
    where
        F: FnMut(&mut dyn LedgerTxn) -> Result<T, E>,
        E: From<StoreError> + Retryable + Display,
    {
        self.retry_policy().run(|_| self.transaction(&mut f))
    }
}
