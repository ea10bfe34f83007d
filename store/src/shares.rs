//! Share offerings, holdings, the share register and dividend declarations.

use crate::StoreError;
use chama_types::{
    Amount, CoreError, DividendId, DividendStatus, GroupId, HoldingId, HoldingStatus, OfferingId,
    OfferingStatus, ShareKind, ShareTxId, ShareTxKind, Timestamp, TransactionStatus, UserId,
};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareOfferingRecord {
    pub id: OfferingId,
    pub group: GroupId,
    pub name: String,
    pub kind: ShareKind,
    /// Shares still available. Only ever decreases.
    pub total_shares: u64,
    /// `total_shares` at creation.
    pub original_shares: u64,
    pub price_per_share: Amount,
    pub minimum_purchase: u64,
    pub status: OfferingStatus,
    pub created_by: UserId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Shares owned by one member under one offering.
///
/// `total_value` is always `shares_owned × share_value`; use [`ShareHoldingRecord::issue`]
/// and [`ShareHoldingRecord::set_shares`] rather than assigning the fields directly.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareHoldingRecord {
    pub id: HoldingId,
    pub group: GroupId,
    pub member: UserId,
    pub offering: Option<OfferingId>,
    pub offering_name: String,
    pub kind: ShareKind,
    pub shares_owned: u64,
    pub share_value: Amount,
    pub total_value: Amount,
    pub certificate_number: String,
    pub purchase_date: Timestamp,
    pub status: HoldingStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ShareHoldingRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn issue(
        group: GroupId,
        member: UserId,
        offering: Option<OfferingId>,
        offering_name: impl Into<String>,
        kind: ShareKind,
        shares: u64,
        share_value: Amount,
        certificate_number: String,
        purchase_date: Timestamp,
        at: Timestamp,
    ) -> Result<Self, CoreError> {
        Ok(Self {
            id: HoldingId::new(),
            group,
            member,
            offering,
            offering_name: offering_name.into(),
            kind,
            shares_owned: shares,
            share_value,
            total_value: share_value.total_for(shares)?,
            certificate_number,
            purchase_date,
            status: HoldingStatus::Active,
            created_at: at,
            updated_at: at,
        })
    }

    /// Change the share count, recomputing `total_value`.
    pub fn set_shares(&mut self, shares: u64, at: Timestamp) -> Result<(), CoreError> {
        self.total_value = self.share_value.total_for(shares)?;
        self.shares_owned = shares;
        self.updated_at = at;
        Ok(())
    }

    pub fn is_consistent(&self) -> bool {
        self.share_value.checked_mul(self.shares_owned) == Some(self.total_value)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareTransactionRecord {
    pub id: ShareTxId,
    pub group: GroupId,
    pub from_member: Option<UserId>,
    pub to_member: Option<UserId>,
    pub holding: Option<HoldingId>,
    pub kind: ShareTxKind,
    pub shares_count: u64,
    pub unit_value: Amount,
    pub total_amount: Amount,
    pub date: Timestamp,
    pub status: TransactionStatus,
    pub created_at: Timestamp,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DividendDeclarationRecord {
    pub id: DividendId,
    pub group: GroupId,
    pub declaration_date: Timestamp,
    pub per_share_amount: Amount,
    pub total_amount: Amount,
    pub status: DividendStatus,
    pub declared_by: UserId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

pub trait ShareStore {
    fn insert_offering(&mut self, offering: &ShareOfferingRecord) -> Result<(), StoreError>;

    fn get_offering(&mut self, id: &OfferingId) -> Result<ShareOfferingRecord, StoreError>;

    fn list_offerings(
        &mut self,
        group: &GroupId,
        status: Option<OfferingStatus>,
    ) -> Result<Vec<ShareOfferingRecord>, StoreError>;

    /// Atomically take `quantity` shares from an offering. Fails with
    /// `InsufficientShares` when fewer remain; marks the offering exhausted
    /// when the last share goes. Returns the updated offering.
    fn take_offering_shares(
        &mut self,
        id: &OfferingId,
        quantity: u64,
        at: Timestamp,
    ) -> Result<ShareOfferingRecord, StoreError>;

    fn set_offering_status(
        &mut self,
        id: &OfferingId,
        status: OfferingStatus,
        at: Timestamp,
    ) -> Result<(), StoreError>;

    fn insert_holding(&mut self, holding: &ShareHoldingRecord) -> Result<(), StoreError>;

    fn get_holding(&mut self, id: &HoldingId) -> Result<ShareHoldingRecord, StoreError>;

    /// Persist share count, value and status of a holding.
    fn update_holding(&mut self, holding: &ShareHoldingRecord) -> Result<(), StoreError>;

    fn holdings_for_member(
        &mut self,
        group: &GroupId,
        member: &UserId,
    ) -> Result<Vec<ShareHoldingRecord>, StoreError>;

    fn holdings_for_group(&mut self, group: &GroupId)
        -> Result<Vec<ShareHoldingRecord>, StoreError>;

    fn append_share_transaction(&mut self, tx: &ShareTransactionRecord) -> Result<(), StoreError>;

    fn share_transactions(
        &mut self,
        group: &GroupId,
    ) -> Result<Vec<ShareTransactionRecord>, StoreError>;

    fn insert_dividend(&mut self, dividend: &DividendDeclarationRecord) -> Result<(), StoreError>;

    fn get_dividend(&mut self, id: &DividendId) -> Result<DividendDeclarationRecord, StoreError>;

    fn set_dividend_status(
        &mut self,
        id: &DividendId,
        status: DividendStatus,
        at: Timestamp,
    ) -> Result<(), StoreError>;

    fn list_dividends(
        &mut self,
        group: &GroupId,
    ) -> Result<Vec<DividendDeclarationRecord>, StoreError>;
}
