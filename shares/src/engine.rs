use std::sync::Arc;

use chama_ledger::{group_wallet, personal_wallet, post, Posting};
use chama_store::{LedgerStore, LedgerTxn, TransactionRecord};
use chama_types::{
    Amount, Clock, CoreError, Currency, GroupId, PaymentMethod, Timestamp, TransactionKind, UserId,
};

pub struct SharesEngine<S> {
    pub(crate) store: Arc<S>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) currency: Currency,
}

impl<S: LedgerStore> SharesEngine<S> {
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
}

/// Declared totals must match the server-side price exactly.
pub(crate) fn check_declared(
    unit_price: Amount,
    expected_unit: Amount,
    quantity: u64,
    total: Amount,
) -> Result<Amount, CoreError> {
    if unit_price != expected_unit {
        return Err(CoreError::Validation(format!(
            "unit price {unit_price} does not match {expected_unit}"
        )));
    }
    let computed = expected_unit.total_for(quantity)?;
    if total != computed {
        return Err(CoreError::Validation(format!(
            "total {total} does not equal {quantity} x {expected_unit}"
        )));
    }
    Ok(computed)
}

/// Pay `total` from a member into the group. Wallet payments move balances;
/// other methods only record the ledger entry.
#[allow(clippy::too_many_arguments)]
pub(crate) fn pay_group(
    txn: &mut dyn LedgerTxn,
    currency: &Currency,
    kind: TransactionKind,
    group: &GroupId,
    payer: &UserId,
    total: Amount,
    method: PaymentMethod,
    metadata: serde_json::Value,
    at: Timestamp,
) -> Result<TransactionRecord, CoreError> {
    let posting = Posting::new(kind, total, *payer)
        .in_group(*group)
        .with_metadata(metadata);
    let posting = if method.settles_in_ledger() {
        let from = personal_wallet(txn, payer)?;
        let to = group_wallet(txn, group, at)?;
        posting.between(Some(from.id), Some(to.id))
    } else {
        posting
    };
    post(txn, currency, posting, at)
}
