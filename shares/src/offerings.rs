//! Share offerings.

use chama_groups::resolve_membership;
use chama_store::{LedgerStore, ShareOfferingRecord};
use chama_types::{
    Amount, CoreError, Deadline, GroupId, OfferingId, OfferingStatus, Role, ShareKind, UserId,
};
use tracing::info;

use crate::engine::SharesEngine;

#[derive(Clone, Debug)]
pub struct NewOffering {
    pub group: GroupId,
    pub name: String,
    pub kind: ShareKind,
    pub total_shares: u64,
    pub price_per_share: Amount,
    pub minimum_purchase: u64,
}

impl<S: LedgerStore> SharesEngine<S> {
    /// Any active member may open an offering; it is active immediately.
    pub fn create_offering(
        &self,
        creator: &UserId,
        new: NewOffering,
        deadline: &Deadline,
    ) -> Result<ShareOfferingRecord, CoreError> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(CoreError::Validation("offering name must not be empty".into()));
        }
        if new.total_shares == 0 {
            return Err(CoreError::Validation("an offering needs at least one share".into()));
        }
        if new.price_per_share.is_zero() {
            return Err(CoreError::Validation("price per share must be positive".into()));
        }
        if new.minimum_purchase == 0 || new.minimum_purchase > new.total_shares {
            return Err(CoreError::Validation(format!(
                "minimum purchase must be between 1 and {}",
                new.total_shares
            )));
        }
        // The whole offering must be priceable without overflow.
        new.price_per_share.total_for(new.total_shares)?;

        let now = self.clock.now();
        let offering = ShareOfferingRecord {
            id: OfferingId::new(),
            group: new.group,
            name: name.to_string(),
            kind: new.kind,
            total_shares: new.total_shares,
            original_shares: new.total_shares,
            price_per_share: new.price_per_share,
            minimum_purchase: new.minimum_purchase,
            status: OfferingStatus::Active,
            created_by: *creator,
            created_at: now,
            updated_at: now,
        };
        self.store.with_transaction(|txn| {
            resolve_membership(txn, creator, &new.group)?;
            txn.insert_offering(&offering)?;
            deadline.check()
        })?;
        info!(offering = %offering.id, group = %offering.group, shares = offering.total_shares, "share offering opened");
        Ok(offering)
    }

    /// Withdraw an active offering. Creator or chairperson only.
    pub fn cancel_offering(
        &self,
        offering_id: &OfferingId,
        requester: &UserId,
        deadline: &Deadline,
    ) -> Result<ShareOfferingRecord, CoreError> {
        let now = self.clock.now();
        let offering = self.store.with_transaction(|txn| {
            let mut offering = txn.get_offering(offering_id)?;
            let membership = resolve_membership(txn, requester, &offering.group)?;
            if offering.created_by != *requester && membership.role != Role::Chairperson {
                return Err(CoreError::InsufficientRole {
                    actual: membership.role.to_string(),
                    action: "cancel share offering".into(),
                });
            }
            if offering.status != OfferingStatus::Active {
                return Err(CoreError::InvalidState(format!(
                    "offering is {}, only active offerings can be cancelled",
                    offering.status
                )));
            }
            txn.set_offering_status(offering_id, OfferingStatus::Cancelled, now)?;
            offering.status = OfferingStatus::Cancelled;
            offering.updated_at = now;
            deadline.check()?;
            Ok::<_, CoreError>(offering)
        })?;
        info!(offering = %offering_id, by = %requester, "share offering cancelled");
        Ok(offering)
    }

    pub fn get_offering(
        &self,
        offering_id: &OfferingId,
        requester: &UserId,
    ) -> Result<ShareOfferingRecord, CoreError> {
        self.store.read(|txn| {
            let offering = txn.get_offering(offering_id)?;
            resolve_membership(txn, requester, &offering.group)?;
            Ok(offering)
        })
    }

    pub fn list_offerings(
        &self,
        group: &GroupId,
        requester: &UserId,
        status: Option<OfferingStatus>,
    ) -> Result<Vec<ShareOfferingRecord>, CoreError> {
        self.store.read(|txn| {
            resolve_membership(txn, requester, group)?;
            Ok(txn.list_offerings(group, status)?)
        })
    }
}
