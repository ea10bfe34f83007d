use std::sync::Arc;
use std::time::Duration;

use chama_crypto::is_certificate_number;
use chama_groups::{GroupAdmin, NewUser};
use chama_ledger::WalletLedger;
use chama_nullables::{MemoryStore, NullClock};
use chama_shares::{
    DividendCertificatePurchase, NewDividend, NewOffering, SharePurchase, SharesEngine,
    ShareTransfer,
};
use chama_store::ShareOfferingRecord;
use chama_types::{
    Amount, CoreError, Currency, Deadline, DividendStatus, GroupId, HoldingStatus,
    OfferingStatus, PaymentMethod, ShareKind, ShareTxKind, Timestamp, TransactionKind, UserId,
};

const T0: u64 = 1_700_000_000;

struct Fixture {
    shares: SharesEngine<MemoryStore>,
    wallets: WalletLedger<MemoryStore>,
    group: GroupId,
    chair: UserId,
    member: UserId,
    buyer: UserId,
    seller: UserId,
}

fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(NullClock::new(T0));
    let admin = GroupAdmin::new(store.clone(), clock.clone());
    let d = Deadline::unbounded();
    let user = |email: &str| {
        admin
            .register_user(
                NewUser {
                    email: Some(email.into()),
                    phone: None,
                    display_name: email.into(),
                    credential_digest: "x".into(),
                },
                &d,
            )
            .unwrap()
            .id
    };
    let chair = user("chair@example.com");
    let member = user("member@example.com");
    let buyer = user("buyer@example.com");
    let seller = user("seller@example.com");
    let group = admin.create_group("Upendo", &chair, &d).unwrap().id;
    for m in [member, buyer, seller] {
        admin.join_group(&group, &m, &d).unwrap();
    }
    Fixture {
        shares: SharesEngine::new(store.clone(), clock.clone(), Currency::kes()),
        wallets: WalletLedger::new(store, clock, Currency::kes()),
        group,
        chair,
        member,
        buyer,
        seller,
    }
}

fn amount(minor: u64) -> Amount {
    Amount::new(minor)
}

fn offering(f: &Fixture, total: u64, price: u64) -> ShareOfferingRecord {
    f.shares
        .create_offering(
            &f.chair,
            NewOffering {
                group: f.group,
                name: "2024 ordinary shares".into(),
                kind: ShareKind::Ordinary,
                total_shares: total,
                price_per_share: amount(price),
                minimum_purchase: 1,
            },
            &Deadline::unbounded(),
        )
        .unwrap()
}

fn purchase(f: &Fixture, o: &ShareOfferingRecord, quantity: u64, method: PaymentMethod) -> SharePurchase {
    SharePurchase {
        group: f.group,
        offering: o.id,
        quantity,
        unit_price: o.price_per_share,
        total: amount(o.price_per_share.minor() * quantity),
        payment_method: method,
        purchase_date: Timestamp::new(T0),
    }
}

fn fund(f: &Fixture, user: &UserId, minor: u64) {
    f.wallets
        .deposit(user, amount(minor), "seed", &Deadline::unbounded())
        .unwrap();
}

#[test]
fn share_purchase_happy_path() {
    let f = fixture();
    let d = Deadline::unbounded();
    let o = offering(&f, 100, 10);
    fund(&f, &f.buyer, 500);

    let (holding, entry) = f
        .shares
        .buy_shares(&f.buyer, purchase(&f, &o, 5, PaymentMethod::Wallet), &d)
        .unwrap();

    assert_eq!(f.wallets.balance(&f.buyer).unwrap(), amount(450));
    assert_eq!(f.wallets.group_balance(&f.group, &f.chair).unwrap(), amount(50));
    let after = f.shares.get_offering(&o.id, &f.buyer).unwrap();
    assert_eq!(after.total_shares, 95);
    assert_eq!(after.original_shares, 100);
    assert_eq!(holding.shares_owned, 5);
    assert_eq!(holding.total_value, amount(50));
    assert_eq!(holding.status, HoldingStatus::Active);
    assert!(is_certificate_number(&holding.certificate_number));
    assert_eq!(entry.kind, TransactionKind::SharePurchase);
    assert_eq!(entry.amount, amount(50));
    let purchases: Vec<_> = f
        .wallets
        .group_history(&f.group, &f.chair)
        .unwrap()
        .into_iter()
        .filter(|t| t.kind == TransactionKind::SharePurchase)
        .collect();
    assert_eq!(purchases.len(), 1);
}

#[test]
fn insufficient_funds_leaves_everything_untouched() {
    let f = fixture();
    let o = offering(&f, 100, 10);
    fund(&f, &f.buyer, 30);

    let err = f
        .shares
        .buy_shares(&f.buyer, purchase(&f, &o, 5, PaymentMethod::Wallet), &Deadline::unbounded())
        .unwrap_err();
    assert!(matches!(err, CoreError::InsufficientFunds { needed: 50, available: 30 }));
    assert_eq!(f.wallets.balance(&f.buyer).unwrap(), amount(30));
    assert_eq!(f.shares.get_offering(&o.id, &f.buyer).unwrap().total_shares, 100);
    assert!(f.shares.holdings_for_member(&f.group, &f.buyer, &f.buyer).unwrap().is_empty());
    assert!(f.shares.share_history(&f.group, &f.chair).unwrap().is_empty());
}

#[test]
fn declared_price_and_total_are_checked() {
    let f = fixture();
    let d = Deadline::unbounded();
    let o = offering(&f, 100, 10);
    fund(&f, &f.buyer, 500);
    let wrong_price = SharePurchase {
        unit_price: amount(9),
        total: amount(45),
        ..purchase(&f, &o, 5, PaymentMethod::Wallet)
    };
    assert!(matches!(f.shares.buy_shares(&f.buyer, wrong_price, &d), Err(CoreError::Validation(_))));
    let wrong_total = SharePurchase {
        total: amount(49),
        ..purchase(&f, &o, 5, PaymentMethod::Wallet)
    };
    assert!(matches!(f.shares.buy_shares(&f.buyer, wrong_total, &d), Err(CoreError::Validation(_))));
}

#[test]
fn last_shares_exhaust_the_offering() {
    let f = fixture();
    let d = Deadline::unbounded();
    let o = offering(&f, 3, 10);
    assert!(matches!(
        f.shares.buy_shares(&f.buyer, purchase(&f, &o, 4, PaymentMethod::Cash), &d),
        Err(CoreError::InsufficientShares { requested: 4, available: 3 })
    ));
    f.shares
        .buy_shares(&f.buyer, purchase(&f, &o, 3, PaymentMethod::Cash), &d)
        .unwrap();
    let after = f.shares.get_offering(&o.id, &f.chair).unwrap();
    assert_eq!(after.status, OfferingStatus::Exhausted);
    assert!(matches!(
        f.shares.buy_shares(&f.seller, purchase(&f, &o, 1, PaymentMethod::Cash), &d),
        Err(CoreError::OfferingExhausted)
    ));
}

#[test]
fn external_payments_record_without_moving_balances() {
    let f = fixture();
    let o = offering(&f, 100, 10);
    let (_, entry) = f
        .shares
        .buy_shares(&f.buyer, purchase(&f, &o, 2, PaymentMethod::Mpesa), &Deadline::unbounded())
        .unwrap();
    assert!(entry.from_wallet.is_none());
    assert!(entry.to_wallet.is_none());
    assert_eq!(entry.metadata["payment_method"], "mpesa");
    assert_eq!(f.wallets.group_balance(&f.group, &f.chair).unwrap(), Amount::ZERO);
}

#[test]
fn partial_transfer_splits_the_holding() {
    let f = fixture();
    let d = Deadline::unbounded();
    let o = offering(&f, 100, 7);
    fund(&f, &f.seller, 70);
    let (held, _) = f
        .shares
        .buy_shares(&f.seller, purchase(&f, &o, 10, PaymentMethod::Wallet), &d)
        .unwrap();
    fund(&f, &f.buyer, 30);
    assert_eq!(f.wallets.balance(&f.seller).unwrap(), Amount::ZERO);

    let (bought, entry) = f
        .shares
        .transfer_shares(
            &f.seller,
            ShareTransfer {
                group: f.group,
                holding: held.id,
                buyer: f.buyer,
                shares_count: 3,
                transfer_price: amount(8),
                total: amount(24),
                transfer_date: Timestamp::new(T0),
            },
            &d,
        )
        .unwrap();

    assert_eq!(f.wallets.balance(&f.buyer).unwrap(), amount(6));
    assert_eq!(f.wallets.balance(&f.seller).unwrap(), amount(24));
    let remaining = f.shares.holdings_for_member(&f.group, &f.seller, &f.seller).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].shares_owned, 7);
    assert_eq!(remaining[0].total_value, amount(49));
    assert_eq!(remaining[0].status, HoldingStatus::Active);
    assert_eq!(bought.shares_owned, 3);
    assert_eq!(bought.share_value, amount(8));
    assert_eq!(bought.total_value, amount(24));
    assert_eq!(bought.status, HoldingStatus::Active);
    assert_eq!(entry.kind, TransactionKind::ShareTransfer);
    assert_eq!(entry.amount, amount(24));
    assert_eq!(entry.recipient, Some(f.seller));
}

#[test]
fn whole_transfer_retires_the_holding() {
    let f = fixture();
    let d = Deadline::unbounded();
    let o = offering(&f, 100, 5);
    let (held, _) = f
        .shares
        .buy_shares(&f.seller, purchase(&f, &o, 4, PaymentMethod::Cash), &d)
        .unwrap();
    fund(&f, &f.buyer, 100);
    let transfer = ShareTransfer {
        group: f.group,
        holding: held.id,
        buyer: f.buyer,
        shares_count: 4,
        transfer_price: amount(6),
        total: amount(24),
        transfer_date: Timestamp::new(T0),
    };
    assert!(matches!(
        f.shares.transfer_shares(&f.buyer, transfer.clone(), &d),
        Err(CoreError::Validation(_))
    ));
    let (bought, _) = f.shares.transfer_shares(&f.seller, transfer.clone(), &d).unwrap();
    assert_eq!(bought.certificate_number, held.certificate_number);
    let old = f.shares.holdings_for_member(&f.group, &f.seller, &f.chair).unwrap();
    assert_eq!(old[0].status, HoldingStatus::Transferred);
    assert!(matches!(
        f.shares.transfer_shares(&f.seller, transfer, &d),
        Err(CoreError::InvalidState(_))
    ));

    let register = f.shares.share_register(&f.group, &f.chair).unwrap();
    assert_eq!(register.len(), 1);
    assert_eq!(register[0].member, f.buyer);
    assert_eq!(register[0].shares, 4);
    assert_eq!(register[0].value, amount(24));
}

#[test]
fn expired_deadline_rolls_back_purchase() {
    let f = fixture();
    let o = offering(&f, 100, 10);
    fund(&f, &f.buyer, 500);
    let expired = Deadline::after(Duration::ZERO);

    assert!(matches!(
        f.shares.buy_shares(&f.buyer, purchase(&f, &o, 5, PaymentMethod::Wallet), &expired),
        Err(CoreError::DeadlineExceeded)
    ));
    assert_eq!(f.wallets.balance(&f.buyer).unwrap(), amount(500));
    assert_eq!(f.wallets.group_balance(&f.group, &f.chair).unwrap(), Amount::ZERO);
    let after = f.shares.get_offering(&o.id, &f.buyer).unwrap();
    assert_eq!(after.total_shares, 100);
    assert_eq!(after.status, OfferingStatus::Active);
    assert!(f.shares.holdings_for_member(&f.group, &f.buyer, &f.buyer).unwrap().is_empty());
    assert!(f.shares.share_history(&f.group, &f.chair).unwrap().is_empty());
}

#[test]
fn expired_deadline_rolls_back_transfer() {
    let f = fixture();
    let d = Deadline::unbounded();
    let o = offering(&f, 100, 5);
    let (held, _) = f
        .shares
        .buy_shares(&f.seller, purchase(&f, &o, 4, PaymentMethod::Cash), &d)
        .unwrap();
    fund(&f, &f.buyer, 100);
    let transfer = ShareTransfer {
        group: f.group,
        holding: held.id,
        buyer: f.buyer,
        shares_count: 2,
        transfer_price: amount(6),
        total: amount(12),
        transfer_date: Timestamp::new(T0),
    };

    assert!(matches!(
        f.shares.transfer_shares(&f.seller, transfer, &Deadline::after(Duration::ZERO)),
        Err(CoreError::DeadlineExceeded)
    ));
    assert_eq!(f.wallets.balance(&f.buyer).unwrap(), amount(100));
    assert_eq!(f.wallets.balance(&f.seller).unwrap(), Amount::ZERO);
    let kept = f.shares.holdings_for_member(&f.group, &f.seller, &f.seller).unwrap();
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].shares_owned, 4);
    assert_eq!(kept[0].status, HoldingStatus::Active);
    assert!(f.shares.holdings_for_member(&f.group, &f.buyer, &f.buyer).unwrap().is_empty());
    let history = f.shares.share_history(&f.group, &f.chair).unwrap();
    assert!(history.iter().all(|t| t.kind != ShareTxKind::Transfer));
}

#[test]
fn offerings_beyond_the_persisted_range_are_rejected() {
    let f = fixture();
    let huge = |total: u64, price: u64| NewOffering {
        group: f.group,
        name: "oversized".into(),
        kind: ShareKind::Ordinary,
        total_shares: total,
        price_per_share: amount(price),
        minimum_purchase: 1,
    };
    let d = Deadline::unbounded();
    assert!(matches!(
        f.shares.create_offering(&f.chair, huge(1 << 63, 1), &d),
        Err(CoreError::Validation(_))
    ));
    assert!(matches!(
        f.shares.create_offering(&f.chair, huge(1 << 32, 1 << 31), &d),
        Err(CoreError::Validation(_))
    ));
    assert!(f.shares.list_offerings(&f.group, &f.chair, None).unwrap().is_empty());
}

#[test]
fn offering_cancellation_rules() {
    let f = fixture();
    let d = Deadline::unbounded();
    let o = offering(&f, 10, 10);
    assert!(matches!(
        f.shares.cancel_offering(&o.id, &f.buyer, &d),
        Err(CoreError::InsufficientRole { .. })
    ));
    let cancelled = f.shares.cancel_offering(&o.id, &f.chair, &d).unwrap();
    assert_eq!(cancelled.status, OfferingStatus::Cancelled);
    assert!(matches!(
        f.shares.buy_shares(&f.buyer, purchase(&f, &o, 1, PaymentMethod::Cash), &d),
        Err(CoreError::InvalidState(_))
    ));
    let active = f
        .shares
        .list_offerings(&f.group, &f.buyer, Some(OfferingStatus::Active))
        .unwrap();
    assert!(active.is_empty());
}

#[test]
fn dividend_lifecycle_and_certificates() {
    let f = fixture();
    let d = Deadline::unbounded();
    assert!(matches!(
        f.shares.declare_dividend(
            &f.member,
            NewDividend {
                group: f.group,
                per_share_amount: amount(20),
                total_amount: amount(100),
                declaration_date: Timestamp::new(T0),
            },
            &d,
        ),
        Err(CoreError::InsufficientRole { .. })
    ));
    let dividend = f
        .shares
        .declare_dividend(
            &f.chair,
            NewDividend {
                group: f.group,
                per_share_amount: amount(20),
                total_amount: amount(100),
                declaration_date: Timestamp::new(T0),
            },
            &d,
        )
        .unwrap();
    assert_eq!(dividend.status, DividendStatus::Draft);

    let certificates = |quantity: u64| DividendCertificatePurchase {
        group: f.group,
        dividend: dividend.id,
        quantity,
        unit_price: amount(20),
        total: amount(20 * quantity),
        payment_method: PaymentMethod::Wallet,
        purchase_date: Timestamp::new(T0),
    };
    fund(&f, &f.buyer, 200);
    assert!(matches!(
        f.shares.buy_dividend_certificates(&f.buyer, certificates(1), &d),
        Err(CoreError::InvalidState(_))
    ));

    f.shares.approve_dividend(&dividend.id, &f.chair, &d).unwrap();
    let (holding, entry) = f
        .shares
        .buy_dividend_certificates(&f.buyer, certificates(3), &d)
        .unwrap();
    assert_eq!(holding.kind, ShareKind::Dividend);
    assert_eq!(holding.total_value, amount(60));
    assert_eq!(entry.kind, TransactionKind::DividendPurchase);
    assert!(matches!(
        f.shares.buy_dividend_certificates(&f.buyer, certificates(3), &d),
        Err(CoreError::InsufficientShares { requested: 3, available: 2 })
    ));
    f.shares.buy_dividend_certificates(&f.buyer, certificates(2), &d).unwrap();
    assert_eq!(f.wallets.balance(&f.buyer).unwrap(), amount(100));

    let paid = f.shares.mark_dividend_paid(&dividend.id, &f.chair, &d).unwrap();
    assert_eq!(paid.status, DividendStatus::Paid);
    assert!(matches!(
        f.shares.approve_dividend(&dividend.id, &f.chair, &d),
        Err(CoreError::InvalidState(_))
    ));
    assert_eq!(f.shares.list_dividends(&f.group, &f.buyer).unwrap().len(), 1);
}
