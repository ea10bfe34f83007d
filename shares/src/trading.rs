//! Share purchases from an offering and member-to-member transfers.

use chama_crypto::certificate_number;
use chama_groups::resolve_membership;
use chama_ledger::{personal_wallet, post, Posting};
use chama_store::{LedgerStore, ShareHoldingRecord, ShareTransactionRecord, TransactionRecord};
use chama_types::{
    Amount, CoreError, Deadline, GroupId, HoldingId, HoldingStatus, OfferingId, OfferingStatus,
    PaymentMethod, ShareTxId, ShareTxKind, Timestamp, TransactionKind, TransactionStatus, UserId,
};
use serde_json::json;
use tracing::info;

use crate::engine::{check_declared, pay_group, SharesEngine};

/// A purchase as declared by the buyer. `unit_price` and `total` are checked
/// against the offering rather than trusted.
#[derive(Clone, Debug)]
pub struct SharePurchase {
    pub group: GroupId,
    pub offering: OfferingId,
    pub quantity: u64,
    pub unit_price: Amount,
    pub total: Amount,
    pub payment_method: PaymentMethod,
    pub purchase_date: Timestamp,
}

#[derive(Clone, Debug)]
pub struct ShareTransfer {
    pub group: GroupId,
    pub holding: HoldingId,
    pub buyer: UserId,
    pub shares_count: u64,
    pub transfer_price: Amount,
    pub total: Amount,
    pub transfer_date: Timestamp,
}

impl<S: LedgerStore> SharesEngine<S> {
    /// Buy shares from an active offering.
    ///
    /// Returns the new holding and the `share_purchase` ledger entry.
    pub fn buy_shares(
        &self,
        buyer: &UserId,
        purchase: SharePurchase,
        deadline: &Deadline,
    ) -> Result<(ShareHoldingRecord, TransactionRecord), CoreError> {
        if purchase.quantity == 0 {
            return Err(CoreError::Validation("quantity must be positive".into()));
        }
        let now = self.clock.now();
        let (holding, entry) = self.store.with_transaction(|txn| {
            let offering = txn.get_offering(&purchase.offering)?;
            if offering.group != purchase.group {
                return Err(CoreError::not_found("share offering", purchase.offering));
            }
            match offering.status {
                OfferingStatus::Active => {}
                OfferingStatus::Exhausted => return Err(CoreError::OfferingExhausted),
                OfferingStatus::Cancelled => {
                    return Err(CoreError::InvalidState("offering has been cancelled".into()))
                }
            }
            resolve_membership(txn, buyer, &purchase.group)?;
            if purchase.quantity < offering.minimum_purchase {
                return Err(CoreError::Validation(format!(
                    "minimum purchase is {} shares",
                    offering.minimum_purchase
                )));
            }
            if purchase.quantity > offering.total_shares {
                return Err(CoreError::InsufficientShares {
                    requested: purchase.quantity,
                    available: offering.total_shares,
                });
            }
            let total = check_declared(
                purchase.unit_price,
                offering.price_per_share,
                purchase.quantity,
                purchase.total,
            )?;

            let entry = pay_group(
                txn,
                &self.currency,
                TransactionKind::SharePurchase,
                &purchase.group,
                buyer,
                total,
                purchase.payment_method,
                json!({
                    "offering_id": offering.id.to_string(),
                    "shares": purchase.quantity,
                    "payment_method": purchase.payment_method.as_str(),
                }),
                now,
            )?;
            txn.take_offering_shares(&offering.id, purchase.quantity, now)?;

            let holding = ShareHoldingRecord::issue(
                purchase.group,
                *buyer,
                Some(offering.id),
                offering.name.clone(),
                offering.kind,
                purchase.quantity,
                offering.price_per_share,
                certificate_number(now),
                purchase.purchase_date,
                now,
            )?;
            txn.insert_holding(&holding)?;
            txn.append_share_transaction(&ShareTransactionRecord {
                id: ShareTxId::new(),
                group: purchase.group,
                from_member: None,
                to_member: Some(*buyer),
                holding: Some(holding.id),
                kind: ShareTxKind::Purchase,
                shares_count: purchase.quantity,
                unit_value: offering.price_per_share,
                total_amount: total,
                date: purchase.purchase_date,
                status: TransactionStatus::Completed,
                created_at: now,
            })?;
            deadline.check()?;
            Ok::<_, CoreError>((holding, entry))
        })?;

        info!(
            group = %purchase.group,
            buyer = %buyer,
            offering = %purchase.offering,
            shares = purchase.quantity,
            total = %self.currency.format(entry.amount),
            "share purchase committed"
        );
        Ok((holding, entry))
    }

    /// Sell part or all of a holding to another member, settled
    /// wallet-to-wallet.
    ///
    /// Returns the buyer's new holding and the `share_transfer` ledger entry.
    pub fn transfer_shares(
        &self,
        seller: &UserId,
        transfer: ShareTransfer,
        deadline: &Deadline,
    ) -> Result<(ShareHoldingRecord, TransactionRecord), CoreError> {
        if transfer.shares_count == 0 {
            return Err(CoreError::Validation("shares_count must be positive".into()));
        }
        if transfer.transfer_price.is_zero() {
            return Err(CoreError::Validation("transfer price must be positive".into()));
        }
        if transfer.buyer == *seller {
            return Err(CoreError::Validation("cannot transfer shares to yourself".into()));
        }
        let now = self.clock.now();
        let (bought, entry) = self.store.with_transaction(|txn| {
            let mut holding = txn.get_holding(&transfer.holding)?;
            if holding.member != *seller || holding.group != transfer.group {
                return Err(CoreError::AccessDenied(
                    "holding does not belong to the seller in this group".into(),
                ));
            }
            if holding.status != HoldingStatus::Active {
                return Err(CoreError::InvalidState(format!("holding is {}", holding.status)));
            }
            resolve_membership(txn, seller, &transfer.group)?;
            resolve_membership(txn, &transfer.buyer, &transfer.group)?;
            if transfer.shares_count > holding.shares_owned {
                return Err(CoreError::InsufficientShares {
                    requested: transfer.shares_count,
                    available: holding.shares_owned,
                });
            }
            let total = transfer.transfer_price.total_for(transfer.shares_count)?;
            if total != transfer.total {
                return Err(CoreError::Validation(format!(
                    "total {} does not equal {} x {}",
                    transfer.total, transfer.shares_count, transfer.transfer_price
                )));
            }

            let from = personal_wallet(txn, &transfer.buyer)?;
            let to = personal_wallet(txn, seller)?;
            let posting = Posting::new(TransactionKind::ShareTransfer, total, transfer.buyer)
                .in_group(transfer.group)
                .to_recipient(*seller)
                .between(Some(from.id), Some(to.id))
                .with_metadata(json!({
                    "holding_id": holding.id.to_string(),
                    "shares": transfer.shares_count,
                }));
            let entry = post(txn, &self.currency, posting, now)?;

            let whole = transfer.shares_count == holding.shares_owned;
            let certificate = if whole {
                holding.status = HoldingStatus::Transferred;
                holding.updated_at = now;
                holding.certificate_number.clone()
            } else {
                holding.set_shares(holding.shares_owned - transfer.shares_count, now)?;
                certificate_number(now)
            };
            txn.update_holding(&holding)?;

            let bought = ShareHoldingRecord::issue(
                transfer.group,
                transfer.buyer,
                holding.offering,
                holding.offering_name.clone(),
                holding.kind,
                transfer.shares_count,
                transfer.transfer_price,
                certificate,
                transfer.transfer_date,
                now,
            )?;
            txn.insert_holding(&bought)?;
            txn.append_share_transaction(&ShareTransactionRecord {
                id: ShareTxId::new(),
                group: transfer.group,
                from_member: Some(*seller),
                to_member: Some(transfer.buyer),
                holding: Some(holding.id),
                kind: ShareTxKind::Transfer,
                shares_count: transfer.shares_count,
                unit_value: transfer.transfer_price,
                total_amount: total,
                date: transfer.transfer_date,
                status: TransactionStatus::Completed,
                created_at: now,
            })?;
            deadline.check()?;
            Ok::<_, CoreError>((bought, entry))
        })?;

        info!(
            group = %transfer.group,
            seller = %seller,
            buyer = %transfer.buyer,
            shares = transfer.shares_count,
            "share transfer committed"
        );
        Ok((bought, entry))
    }
}
