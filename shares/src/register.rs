//! Holdings and the share register.

use std::collections::BTreeMap;

use chama_groups::{list_members, resolve_membership};
use chama_store::{LedgerStore, ShareHoldingRecord, ShareTransactionRecord};
use chama_types::{Amount, CoreError, GroupId, HoldingStatus, UserId};
use serde::Serialize;

use crate::engine::SharesEngine;

/// One member's line in the share register.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RegisterEntry {
    pub member: UserId,
    pub display_name: String,
    pub shares: u64,
    pub value: Amount,
    pub holdings: usize,
}

impl<S: LedgerStore> SharesEngine<S> {
    /// Holdings of `member` in `group`, including transferred ones.
    pub fn holdings_for_member(
        &self,
        group: &GroupId,
        member: &UserId,
        requester: &UserId,
    ) -> Result<Vec<ShareHoldingRecord>, CoreError> {
        self.store.read(|txn| {
            resolve_membership(txn, requester, group)?;
            Ok(txn.holdings_for_member(group, member)?)
        })
    }

    /// Active holdings summed per member, largest holder first.
    pub fn share_register(
        &self,
        group: &GroupId,
        requester: &UserId,
    ) -> Result<Vec<RegisterEntry>, CoreError> {
        self.store.read(|txn| {
            resolve_membership(txn, requester, group)?;
            let mut totals: BTreeMap<UserId, (u64, Amount, usize)> = BTreeMap::new();
            for holding in txn.holdings_for_group(group)? {
                if holding.status != HoldingStatus::Active {
                    continue;
                }
                let entry = totals.entry(holding.member).or_insert((0, Amount::ZERO, 0));
                entry.0 = entry.0.checked_add(holding.shares_owned).ok_or_else(|| {
                    CoreError::internal(format!("share count overflow for {}", holding.member))
                })?;
                entry.1 = entry.1.checked_add(holding.total_value).ok_or_else(|| {
                    CoreError::internal(format!("share value overflow for {}", holding.member))
                })?;
                entry.2 += 1;
            }

            // Former members keep their holdings; name them from the user record.
            let names: BTreeMap<UserId, String> = list_members(txn, group)?
                .into_iter()
                .map(|m| (m.user, m.display_name))
                .collect();
            let mut register = Vec::with_capacity(totals.len());
            for (member, (shares, value, holdings)) in totals {
                let display_name = match names.get(&member) {
                    Some(name) => name.clone(),
                    None => txn.get_user(&member)?.display_name,
                };
                register.push(RegisterEntry {
                    member,
                    display_name,
                    shares,
                    value,
                    holdings,
                });
            }
            register.sort_by(|a, b| {
                b.shares
                    .cmp(&a.shares)
                    .then_with(|| a.display_name.cmp(&b.display_name))
            });
            Ok(register)
        })
    }

    /// Share movements of a group, oldest first.
    pub fn share_history(
        &self,
        group: &GroupId,
        requester: &UserId,
    ) -> Result<Vec<ShareTransactionRecord>, CoreError> {
        self.store.read(|txn| {
            resolve_membership(txn, requester, group)?;
            Ok(txn.share_transactions(group)?)
        })
    }
}
