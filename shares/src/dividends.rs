//! Dividend declarations and dividend certificate purchases.

use chama_crypto::certificate_number;
use chama_groups::{require_role, resolve_membership};
use chama_store::{
    DividendDeclarationRecord, LedgerStore, LedgerTxn, ShareHoldingRecord, ShareTransactionRecord,
    TransactionRecord,
};
use chama_types::{
    Amount, CoreError, Deadline, DividendId, DividendStatus, GroupId, PaymentMethod, Role,
    ShareKind, ShareTxId, ShareTxKind, Timestamp, TransactionKind, TransactionStatus, UserId,
};
use serde_json::json;
use tracing::info;

use crate::engine::{check_declared, pay_group, SharesEngine};

const DECLARERS: &[Role] = &[Role::Chairperson, Role::Treasurer];

#[derive(Clone, Debug)]
pub struct NewDividend {
    pub group: GroupId,
    pub per_share_amount: Amount,
    /// Upper bound on certificates sold against this declaration.
    pub total_amount: Amount,
    pub declaration_date: Timestamp,
}

#[derive(Clone, Debug)]
pub struct DividendCertificatePurchase {
    pub group: GroupId,
    pub dividend: DividendId,
    pub quantity: u64,
    pub unit_price: Amount,
    pub total: Amount,
    pub payment_method: PaymentMethod,
    pub purchase_date: Timestamp,
}

impl<S: LedgerStore> SharesEngine<S> {
    /// Draft a dividend declaration. Treasurer or chairperson only.
    pub fn declare_dividend(
        &self,
        declarer: &UserId,
        new: NewDividend,
        deadline: &Deadline,
    ) -> Result<DividendDeclarationRecord, CoreError> {
        if new.per_share_amount.is_zero() {
            return Err(CoreError::Validation("per-share amount must be positive".into()));
        }
        if new.total_amount < new.per_share_amount {
            return Err(CoreError::Validation(
                "total amount must cover at least one share".into(),
            ));
        }
        let now = self.clock.now();
        let dividend = DividendDeclarationRecord {
            id: DividendId::new(),
            group: new.group,
            declaration_date: new.declaration_date,
            per_share_amount: new.per_share_amount,
            total_amount: new.total_amount,
            status: DividendStatus::Draft,
            declared_by: *declarer,
            created_at: now,
            updated_at: now,
        };
        self.store.with_transaction(|txn| {
            require_role(txn, declarer, &new.group, DECLARERS, "declare dividend")?;
            txn.insert_dividend(&dividend)?;
            deadline.check()
        })?;
        info!(dividend = %dividend.id, group = %dividend.group, "dividend declared");
        Ok(dividend)
    }

    /// `draft → approved`. Chairperson only.
    pub fn approve_dividend(
        &self,
        dividend_id: &DividendId,
        approver: &UserId,
        deadline: &Deadline,
    ) -> Result<DividendDeclarationRecord, CoreError> {
        self.advance_dividend(
            dividend_id,
            approver,
            &[Role::Chairperson],
            "approve dividend",
            deadline,
            DividendStatus::approve,
        )
    }

    /// `approved → paid`. Treasurer or chairperson.
    pub fn mark_dividend_paid(
        &self,
        dividend_id: &DividendId,
        requester: &UserId,
        deadline: &Deadline,
    ) -> Result<DividendDeclarationRecord, CoreError> {
        self.advance_dividend(
            dividend_id,
            requester,
            DECLARERS,
            "mark dividend paid",
            deadline,
            DividendStatus::mark_paid,
        )
    }

    fn advance_dividend(
        &self,
        dividend_id: &DividendId,
        requester: &UserId,
        allowed: &[Role],
        action: &str,
        deadline: &Deadline,
        next: fn(DividendStatus) -> Result<DividendStatus, CoreError>,
    ) -> Result<DividendDeclarationRecord, CoreError> {
        let now = self.clock.now();
        let dividend = self.store.with_transaction(|txn| {
            let mut dividend = txn.get_dividend(dividend_id)?;
            require_role(txn, requester, &dividend.group, allowed, action)?;
            dividend.status = next(dividend.status)?;
            dividend.updated_at = now;
            txn.set_dividend_status(dividend_id, dividend.status, now)?;
            deadline.check()?;
            Ok::<_, CoreError>(dividend)
        })?;
        info!(dividend = %dividend_id, status = %dividend.status, "dividend updated");
        Ok(dividend)
    }

    pub fn list_dividends(
        &self,
        group: &GroupId,
        requester: &UserId,
    ) -> Result<Vec<DividendDeclarationRecord>, CoreError> {
        self.store.read(|txn| {
            resolve_membership(txn, requester, group)?;
            Ok(txn.list_dividends(group)?)
        })
    }

    /// Buy certificates against an approved declaration at its per-share
    /// amount. Sales are capped by the declaration's total amount.
    pub fn buy_dividend_certificates(
        &self,
        buyer: &UserId,
        purchase: DividendCertificatePurchase,
        deadline: &Deadline,
    ) -> Result<(ShareHoldingRecord, TransactionRecord), CoreError> {
        if purchase.quantity == 0 {
            return Err(CoreError::Validation("quantity must be positive".into()));
        }
        let now = self.clock.now();
        let (holding, entry) = self.store.with_transaction(|txn| {
            let dividend = txn.get_dividend(&purchase.dividend)?;
            if dividend.group != purchase.group {
                return Err(CoreError::not_found("dividend declaration", purchase.dividend));
            }
            if dividend.status != DividendStatus::Approved {
                return Err(CoreError::InvalidState(format!(
                    "dividend is {}, certificates are sold only while approved",
                    dividend.status
                )));
            }
            resolve_membership(txn, buyer, &purchase.group)?;
            let total = check_declared(
                purchase.unit_price,
                dividend.per_share_amount,
                purchase.quantity,
                purchase.total,
            )?;
            let remaining = dividend
                .total_amount
                .saturating_sub(sold_against(txn, &dividend)?);
            if total > remaining {
                return Err(CoreError::InsufficientShares {
                    requested: purchase.quantity,
                    available: remaining.minor() / dividend.per_share_amount.minor(),
                });
            }

            let entry = pay_group(
                txn,
                &self.currency,
                TransactionKind::DividendPurchase,
                &purchase.group,
                buyer,
                total,
                purchase.payment_method,
                json!({
                    "dividend_id": dividend.id.to_string(),
                    "shares": purchase.quantity,
                    "payment_method": purchase.payment_method.as_str(),
                }),
                now,
            )?;
            let holding = ShareHoldingRecord::issue(
                purchase.group,
                *buyer,
                None,
                format!("Dividend declared {}", dividend.declaration_date),
                ShareKind::Dividend,
                purchase.quantity,
                dividend.per_share_amount,
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
                kind: ShareTxKind::DividendIssue,
                shares_count: purchase.quantity,
                unit_value: dividend.per_share_amount,
                total_amount: total,
                date: purchase.purchase_date,
                status: TransactionStatus::Completed,
                created_at: now,
            })?;
            deadline.check()?;
            Ok::<_, CoreError>((holding, entry))
        })?;
        info!(
            dividend = %purchase.dividend,
            buyer = %buyer,
            shares = purchase.quantity,
            "dividend certificates purchased"
        );
        Ok((holding, entry))
    }
}

/// Amount already sold against a declaration.
fn sold_against(
    txn: &mut dyn LedgerTxn,
    dividend: &DividendDeclarationRecord,
) -> Result<Amount, CoreError> {
    let id = dividend.id.to_string();
    let mut sold = Amount::ZERO;
    for entry in txn.transactions_for_group(&dividend.group)? {
        if entry.kind == TransactionKind::DividendPurchase
            && entry.metadata.get("dividend_id").and_then(|v| v.as_str()) == Some(id.as_str())
        {
            sold = sold
                .checked_add(entry.amount)
                .ok_or_else(|| CoreError::internal(format!("dividend {id} sales overflow")))?;
        }
    }
    Ok(sold)
}
