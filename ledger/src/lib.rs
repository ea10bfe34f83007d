//! Wallet ledger.
//!
//! [`settle`] holds the primitives every monetary flow uses inside its store
//! transaction: wallet lookup and a double-entry [`post`](settle::post) that
//! moves balances and appends the matching ledger entry in one step.
//! [`WalletLedger`] exposes the member-facing wallet operations on top.

pub mod settle;
pub mod wallets;

pub use settle::{group_wallet, personal_wallet, post, Posting};
pub use wallets::WalletLedger;
