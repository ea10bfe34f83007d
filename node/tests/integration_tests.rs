//! End-to-end scenarios through the node's wiring.
//!
//! Every scenario runs twice: against the in-memory store and against an
//! on-disk SQLite database, which must also pass its integrity check
//! afterwards.

use std::sync::Arc;

use chama_governance::{EscalationRequest, NewPoll, APPROVE};
use chama_groups::NewUser;
use chama_meetings::NewMeeting;
use chama_node::{ChamaConfig, ChamaNode, Collaborators};
use chama_nullables::{MemoryStore, NullClock, NullConferencing, NullNotifier};
use chama_shares::{NewOffering, SharePurchase, ShareTransfer};
use chama_store::{LedgerStore, ShareOfferingRecord};
use chama_store_sqlite::SqliteStore;
use chama_types::time::{DAY, MINUTE};
use chama_types::{
    Amount, CoreError, Deadline, EscalationStatus, GroupId, HoldingStatus, MeetingKind,
    MeetingStatus, PaymentMethod, PollKind, PollResult, PollStatus, Role, ShareKind, Timestamp,
    TransactionKind, UserId,
};

const T0: u64 = 1_700_000_000;

struct Harness<S: LedgerStore> {
    node: ChamaNode<S>,
    clock: Arc<NullClock>,
    conferencing: Arc<NullConferencing>,
    notifier: Arc<NullNotifier>,
}

fn harness<S: LedgerStore>(store: S) -> Harness<S> {
    let clock = Arc::new(NullClock::new(T0 - 60 * MINUTE));
    let conferencing = Arc::new(NullConferencing::new());
    let notifier = Arc::new(NullNotifier::new());
    let node = ChamaNode::new(
        ChamaConfig::default(),
        Arc::new(store),
        Collaborators {
            clock: clock.clone(),
            conferencing: conferencing.clone(),
            notifier: notifier.clone(),
            calendar: None,
        },
    )
    .expect("node wiring");
    Harness {
        node,
        clock,
        conferencing,
        notifier,
    }
}

fn on_memory() -> Harness<MemoryStore> {
    harness(MemoryStore::new())
}

fn on_sqlite() -> (tempfile::TempDir, Harness<SqliteStore>) {
    let dir = tempfile::tempdir().expect("temp dir");
    let store = SqliteStore::open(&dir.path().join("chama.db")).expect("open sqlite");
    (dir, harness(store))
}

macro_rules! on_both_stores {
    ($scenario:ident) => {
        mod $scenario {
            use super::*;

            #[tokio::test]
            async fn memory() {
                super::$scenario(&on_memory()).await;
            }

            #[tokio::test]
            async fn sqlite() {
                let (_dir, h) = on_sqlite();
                super::$scenario(&h).await;
                let report = h.node.check_integrity().unwrap();
                assert!(report.is_healthy(), "{:?}", report.errors);
            }
        }
    };
}

fn user<S: LedgerStore>(h: &Harness<S>, name: &str) -> UserId {
    h.node
        .admin()
        .register_user(
            NewUser {
                email: Some(format!("{name}@example.com")),
                phone: None,
                display_name: name.into(),
                credential_digest: "x".into(),
            },
            &Deadline::unbounded(),
        )
        .unwrap()
        .id
}

/// A group founded by `founder` with everyone in `others` joined as members.
fn group<S: LedgerStore>(h: &Harness<S>, founder: &UserId, others: &[UserId]) -> GroupId {
    let d = Deadline::unbounded();
    let group = h.node.admin().create_group("Harambee", founder, &d).unwrap().id;
    for m in others {
        h.node.admin().join_group(&group, m, &d).unwrap();
    }
    group
}

fn fund<S: LedgerStore>(h: &Harness<S>, user: &UserId, minor: u64) {
    h.node
        .wallets()
        .deposit(user, Amount::new(minor), "mpesa-topup", &Deadline::unbounded())
        .unwrap();
}

fn offering<S: LedgerStore>(h: &Harness<S>, group: GroupId, chair: &UserId, total: u64, price: u64) -> ShareOfferingRecord {
    h.node
        .shares()
        .create_offering(
            chair,
            NewOffering {
                group,
                name: "Founding shares".into(),
                kind: ShareKind::Ordinary,
                total_shares: total,
                price_per_share: Amount::new(price),
                minimum_purchase: 1,
            },
            &Deadline::unbounded(),
        )
        .unwrap()
}

fn purchase(group: GroupId, o: &ShareOfferingRecord, quantity: u64) -> SharePurchase {
    SharePurchase {
        group,
        offering: o.id,
        quantity,
        unit_price: o.price_per_share,
        total: Amount::new(o.price_per_share.minor() * quantity),
        payment_method: PaymentMethod::Wallet,
        purchase_date: Timestamp::new(T0),
    }
}

// ── Scenarios ───────────────────────────────────────────────────────────

async fn share_purchase<S: LedgerStore>(h: &Harness<S>) {
    let chair = user(h, "chair");
    let buyer = user(h, "buyer");
    let group = group(h, &chair, &[buyer]);
    let o = offering(h, group, &chair, 100, 10);
    fund(h, &buyer, 500);

    let (holding, entry) = h.node.buy_shares(&buyer, purchase(group, &o, 5)).unwrap();

    assert_eq!(h.node.wallets().balance(&buyer).unwrap(), Amount::new(450));
    assert_eq!(h.node.wallets().group_balance(&group, &chair).unwrap(), Amount::new(50));
    assert_eq!(h.node.shares().get_offering(&o.id, &buyer).unwrap().total_shares, 95);
    assert_eq!(holding.shares_owned, 5);
    assert_eq!(holding.status, HoldingStatus::Active);
    assert_eq!(entry.kind, TransactionKind::SharePurchase);
    assert_eq!(entry.amount, Amount::new(50));
    assert_eq!(h.node.metrics().share_purchases.get(), 1);
}
on_both_stores!(share_purchase);

async fn share_purchase_without_funds<S: LedgerStore>(h: &Harness<S>) {
    let chair = user(h, "chair");
    let buyer = user(h, "buyer");
    let group = group(h, &chair, &[buyer]);
    let o = offering(h, group, &chair, 100, 10);
    fund(h, &buyer, 30);

    assert!(matches!(
        h.node.buy_shares(&buyer, purchase(group, &o, 5)),
        Err(CoreError::InsufficientFunds { .. })
    ));
    assert_eq!(h.node.wallets().balance(&buyer).unwrap(), Amount::new(30));
    assert_eq!(h.node.wallets().group_balance(&group, &chair).unwrap(), Amount::ZERO);
    assert_eq!(h.node.shares().get_offering(&o.id, &buyer).unwrap().total_shares, 100);
    assert!(h
        .node
        .shares()
        .holdings_for_member(&group, &buyer, &buyer)
        .unwrap()
        .is_empty());
    assert_eq!(h.node.metrics().share_purchases.get(), 0);
}
on_both_stores!(share_purchase_without_funds);

async fn poll_passes_on_threshold<S: LedgerStore>(h: &Harness<S>) {
    let members: Vec<UserId> = ["a", "b", "c", "d"].iter().map(|n| user(h, n)).collect();
    let group = group(h, &members[0], &members[1..]);
    let poll = h
        .node
        .polls()
        .create_poll(
            &members[0],
            NewPoll {
                group,
                title: "Buy a water tank".into(),
                description: String::new(),
                kind: PollKind::FinancialDecision,
                end_at: Timestamp::new(T0 + DAY),
                options: vec!["A".into(), "B".into()],
                anonymous: true,
                requires_majority: false,
                threshold: None,
            },
            &Deadline::unbounded(),
        )
        .unwrap();

    assert!(h.node.cast_vote(&poll.id, &members[0], 0).await.unwrap().declared.is_none());
    let outcome = h.node.cast_vote(&poll.id, &members[1], 0).await.unwrap();
    let event = outcome.declared.expect("2 of 4 reaches one half");
    assert_eq!(event.result, PollResult::Passed);
    assert_eq!(event.winning_option, Some(0));
    assert_eq!(outcome.poll.status, PollStatus::Completed);

    assert!(matches!(
        h.node.cast_vote(&poll.id, &members[2], 0).await,
        Err(CoreError::PollSealed)
    ));
    assert_eq!(h.notifier.titles(), vec!["Poll result declared"]);
    assert_eq!(h.node.metrics().votes_cast.get(), 2);
    assert_eq!(h.node.metrics().polls_sealed.get(), 1);
}
on_both_stores!(poll_passes_on_threshold);

async fn role_escalation<S: LedgerStore>(h: &Harness<S>) {
    let chair = user(h, "chair");
    let candidate = user(h, "candidate");
    let voters = [user(h, "v1"), user(h, "v2")];
    let group = group(h, &chair, &[candidate, voters[0], voters[1]]);

    let (request, poll) = h
        .node
        .escalations()
        .request_role_escalation(
            &voters[0],
            EscalationRequest {
                group,
                candidate,
                requested_role: Role::Chairperson,
                justification: "Annual rotation".into(),
            },
            &Deadline::unbounded(),
        )
        .unwrap();
    h.node.cast_vote(&poll.id, &voters[0], APPROVE).await.unwrap();
    h.node.cast_vote(&poll.id, &voters[1], APPROVE).await.unwrap();

    let directory = h.node.directory();
    assert_eq!(directory.resolve_membership(&chair, &group).unwrap().role, Role::Member);
    assert_eq!(
        directory.resolve_membership(&candidate, &group).unwrap().role,
        Role::Chairperson
    );
    let changes = h.node.escalations().list_role_changes(&group, &candidate).unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(
        h.node.escalations().get_request(&request.id, &chair).unwrap().status,
        EscalationStatus::Approved
    );
    assert_eq!(h.node.metrics().role_changes.get(), 1);
}
on_both_stores!(role_escalation);

async fn escalation_for_departed_candidate<S: LedgerStore>(h: &Harness<S>) {
    let d = Deadline::unbounded();
    let chair = user(h, "chair");
    let candidate = user(h, "candidate");
    let voters = [user(h, "v1"), user(h, "v2")];
    let group = group(h, &chair, &[candidate, voters[0], voters[1]]);

    let (request, poll) = h
        .node
        .escalations()
        .request_role_escalation(
            &voters[0],
            EscalationRequest {
                group,
                candidate,
                requested_role: Role::Treasurer,
                justification: String::new(),
            },
            &d,
        )
        .unwrap();
    h.node.admin().leave_group(&group, &candidate, &d).unwrap();
    h.node.cast_vote(&poll.id, &voters[0], APPROVE).await.unwrap();
    h.node.cast_vote(&poll.id, &voters[1], APPROVE).await.unwrap();

    assert!(h.node.escalations().list_role_changes(&group, &chair).unwrap().is_empty());
    assert_eq!(
        h.node.escalations().get_request(&request.id, &chair).unwrap().status,
        EscalationStatus::Rejected
    );
    assert_eq!(h.node.metrics().polls_sealed.get(), 1);
    assert_eq!(h.node.metrics().role_changes.get(), 0);
}
on_both_stores!(escalation_for_departed_candidate);

async fn meeting_lifecycle<S: LedgerStore>(h: &Harness<S>) {
    let d = Deadline::unbounded();
    let chair = user(h, "chair");
    let member = user(h, "member");
    let group = group(h, &chair, &[member]);
    let meeting = h
        .node
        .meetings()
        .create_meeting(
            &chair,
            NewMeeting {
                group,
                title: "Monthly sitting".into(),
                description: String::new(),
                scheduled_at: Timestamp::new(T0),
                duration_minutes: 60,
                kind: MeetingKind::Virtual,
                location: None,
                recording_enabled: false,
            },
            &d,
        )
        .await
        .unwrap();

    h.clock.set(T0 - 4 * MINUTE);
    assert_eq!(h.node.tick().await.meetings_readied, 1);
    assert_eq!(
        h.node.meetings().get_meeting(&meeting.id, &member).unwrap().status,
        MeetingStatus::Ready
    );
    let token = h.node.meetings().issue_join_token(&meeting.id, &chair, &d).await.unwrap();
    assert!(token.capabilities.room_admin);

    h.clock.set(T0 + MINUTE);
    let started = h.node.start_meeting(&meeting.id, &chair).await.unwrap();
    assert_eq!(started.status, MeetingStatus::Active);
    assert_eq!(started.started_at, Some(Timestamp::new(T0 + MINUTE)));
    h.node.start_meeting(&meeting.id, &chair).await.unwrap();
    assert_eq!(h.node.metrics().meetings_started.get(), 1);

    h.clock.set(T0 + 91 * MINUTE);
    let report = h.node.tick().await;
    assert_eq!(report.meetings_ended, 1);
    assert_eq!(report.failed_passes, 0);
    assert_eq!(
        h.node.meetings().get_meeting(&meeting.id, &member).unwrap().status,
        MeetingStatus::Ended
    );
    assert_eq!(h.conferencing.deleted_rooms().len(), 1);
    assert_eq!(h.node.metrics().meetings_ended.get(), 1);

    // Ending an ended meeting in the same second is not counted again.
    let ended = h.node.end_meeting(&meeting.id, &chair).await.unwrap();
    assert_eq!(ended.status, MeetingStatus::Ended);
    assert_eq!(h.node.metrics().meetings_ended.get(), 1);
}
on_both_stores!(meeting_lifecycle);

async fn partial_share_transfer<S: LedgerStore>(h: &Harness<S>) {
    let chair = user(h, "chair");
    let seller = user(h, "seller");
    let buyer = user(h, "buyer");
    let group = group(h, &chair, &[seller, buyer]);
    let o = offering(h, group, &chair, 100, 7);
    fund(h, &seller, 70);
    let (held, _) = h.node.buy_shares(&seller, purchase(group, &o, 10)).unwrap();
    fund(h, &buyer, 30);

    let (bought, entry) = h
        .node
        .transfer_shares(
            &seller,
            ShareTransfer {
                group,
                holding: held.id,
                buyer,
                shares_count: 3,
                transfer_price: Amount::new(8),
                total: Amount::new(24),
                transfer_date: Timestamp::new(T0),
            },
        )
        .unwrap();

    assert_eq!(h.node.wallets().balance(&buyer).unwrap(), Amount::new(6));
    assert_eq!(h.node.wallets().balance(&seller).unwrap(), Amount::new(24));
    let remaining = h.node.shares().holdings_for_member(&group, &seller, &seller).unwrap();
    assert_eq!(remaining[0].shares_owned, 7);
    assert_eq!(remaining[0].total_value, Amount::new(49));
    assert_eq!(bought.shares_owned, 3);
    assert_eq!(bought.share_value, Amount::new(8));
    assert_eq!(bought.total_value, Amount::new(24));
    assert_eq!(entry.kind, TransactionKind::ShareTransfer);
    assert_eq!(h.node.metrics().share_transfers.get(), 1);
}
on_both_stores!(partial_share_transfer);

async fn overdue_poll_closed_by_scheduler<S: LedgerStore>(h: &Harness<S>) {
    let members: Vec<UserId> = ["a", "b", "c"].iter().map(|n| user(h, n)).collect();
    let group = group(h, &members[0], &members[1..]);
    let poll = h
        .node
        .polls()
        .create_poll(
            &members[0],
            NewPoll {
                group,
                title: "Change meeting day".into(),
                description: String::new(),
                kind: PollKind::General,
                end_at: Timestamp::new(T0),
                options: vec!["Saturday".into(), "Sunday".into()],
                anonymous: false,
                requires_majority: false,
                threshold: None,
            },
            &Deadline::unbounded(),
        )
        .unwrap();
    h.node.cast_vote(&poll.id, &members[1], 1).await.unwrap();

    assert_eq!(h.node.tick().await.polls_closed, 0);
    h.clock.set(T0);
    let report = h.node.tick().await;
    assert_eq!(report.polls_closed, 1);

    let sealed = h.node.polls().get_poll(&poll.id, &members[0]).unwrap();
    assert_eq!(sealed.status, PollStatus::Completed);
    assert_eq!(sealed.result, PollResult::Passed);
    assert_eq!(sealed.winning_option, Some(1));
    assert_eq!(h.notifier.titles(), vec!["Poll result declared"]);
    assert_eq!(h.node.metrics().scheduler_ticks.get(), 2);

    // Closed polls are not picked up again.
    assert_eq!(h.node.tick().await.polls_closed, 0);
}
on_both_stores!(overdue_poll_closed_by_scheduler);

#[tokio::test]
async fn background_scheduler_stops_on_shutdown() {
    let mut h = on_memory();
    h.node.start();
    h.node.stop().await.unwrap();
    assert!(h.node.metrics().encode().unwrap().contains("chama_scheduler_ticks_total"));
}

#[test]
fn database_check_reads_an_existing_file_only() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = ChamaConfig::default();
    config.store.path = dir.path().join("chama.db");
    assert!(matches!(
        chama_node::check_database(&config),
        Err(chama_node::NodeError::Config(_))
    ));

    drop(SqliteStore::open(&config.store.path).unwrap());
    let report = chama_node::check_database(&config).unwrap();
    assert!(report.is_healthy());
}
