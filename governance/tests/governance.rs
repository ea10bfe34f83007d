use std::sync::Arc;

use chama_governance::{
    announce_result, EscalationRequest, NewPoll, PollEngine, PollSettings,
    RoleEscalationCoordinator, APPROVE, REJECT,
};
use chama_groups::{GroupAdmin, MembershipDirectory, NewUser};
use chama_nullables::{MemoryStore, NullClock, NullNotifier};
use chama_types::time::DAY;
use chama_types::{
    Clock, CoreError, Deadline, EscalationStatus, GroupId, PollKind, PollResult, PollStatus, Role,
    Timestamp, UserId,
};

const T0: u64 = 1_700_000_000;

struct Fixture {
    clock: Arc<NullClock>,
    polls: PollEngine<MemoryStore>,
    escalations: Arc<RoleEscalationCoordinator<MemoryStore>>,
    directory: MembershipDirectory<MemoryStore>,
    group: GroupId,
    /// `members[0]` founded the group and is chairperson.
    members: Vec<UserId>,
}

fn fixture(member_count: usize) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(NullClock::new(T0));
    let admin = GroupAdmin::new(store.clone(), clock.clone());
    let d = Deadline::unbounded();
    let members: Vec<UserId> = (0..member_count)
        .map(|n| {
            admin
                .register_user(
                    NewUser {
                        email: None,
                        phone: Some(format!("+2547000000{n:02}")),
                        display_name: format!("Member {n}"),
                        credential_digest: "x".into(),
                    },
                    &d,
                )
                .unwrap()
                .id
        })
        .collect();
    let group = admin.create_group("Tujijenge", &members[0], &d).unwrap().id;
    for m in &members[1..] {
        admin.join_group(&group, m, &d).unwrap();
    }

    let settings = PollSettings::default();
    let escalations = Arc::new(RoleEscalationCoordinator::new(
        store.clone(),
        clock.clone(),
        settings,
    ));
    let polls = PollEngine::new(store.clone(), clock.clone(), settings).subscribe(escalations.clone());
    Fixture {
        clock,
        polls,
        escalations,
        directory: MembershipDirectory::new(store),
        group,
        members,
    }
}

fn role_of(f: &Fixture, user: &UserId) -> Role {
    f.directory.resolve_membership(user, &f.group).unwrap().role
}

#[test]
fn threshold_reached_seals_poll_immediately() {
    let f = fixture(4);
    let d = Deadline::unbounded();
    let poll = f
        .polls
        .create_poll(
            &f.members[0],
            NewPoll {
                group: f.group,
                title: "Adopt new constitution".into(),
                description: String::new(),
                kind: PollKind::RuleChange,
                end_at: Timestamp::new(T0 + DAY),
                options: vec!["A".into(), "B".into()],
                anonymous: true,
                requires_majority: false,
                threshold: None,
            },
            &d,
        )
        .unwrap();

    let first = f.polls.cast_vote(&poll.id, &f.members[0], 0, &d).unwrap();
    assert!(first.declared.is_none());
    let second = f.polls.cast_vote(&poll.id, &f.members[1], 0, &d).unwrap();
    let event = second.declared.expect("second vote reaches 2/4");
    assert_eq!(event.result, PollResult::Passed);
    assert_eq!(event.winning_option, Some(0));
    assert_eq!(second.poll.status, PollStatus::Completed);

    assert!(matches!(
        f.polls.cast_vote(&poll.id, &f.members[2], 0, &d),
        Err(CoreError::PollSealed)
    ));
    let tally = f.polls.get_tally(&poll.id, &f.members[3]).unwrap();
    assert_eq!(tally.votes_cast, 2);
    assert_eq!(tally.options[0].votes, 2);
}

#[test]
fn passed_escalation_displaces_the_current_holder() {
    let f = fixture(4);
    let d = Deadline::unbounded();
    let chair = f.members[0];
    let candidate = f.members[1];
    let (request, poll) = f
        .escalations
        .request_role_escalation(
            &f.members[2],
            EscalationRequest {
                group: f.group,
                candidate,
                requested_role: Role::Chairperson,
                justification: "Rotation after two years".into(),
            },
            &d,
        )
        .unwrap();
    assert_eq!(poll.kind, PollKind::RoleEscalation);
    assert_eq!(poll.end_at, Timestamp::new(T0 + 7 * DAY));
    assert_eq!(request.current_role, Role::Member);

    f.polls.cast_vote(&poll.id, &f.members[2], APPROVE, &d).unwrap();
    let outcome = f.polls.cast_vote(&poll.id, &f.members[3], APPROVE, &d).unwrap();
    assert_eq!(outcome.declared.unwrap().result, PollResult::Passed);

    assert_eq!(role_of(&f, &chair), Role::Member);
    assert_eq!(role_of(&f, &candidate), Role::Chairperson);
    let changes = f.escalations.list_role_changes(&f.group, &chair).unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].user, candidate);
    assert_eq!(changes[0].old_role, Role::Member);
    assert_eq!(changes[0].new_role, Role::Chairperson);
    assert_eq!(changes[0].changed_by, f.members[2]);
    assert!(changes[0].reason.contains(&chair.to_string()));
    let settled = f.escalations.get_request(&request.id, &chair).unwrap();
    assert_eq!(settled.status, EscalationStatus::Approved);
}

#[test]
fn rejected_escalation_changes_no_roles() {
    let f = fixture(4);
    let d = Deadline::unbounded();
    let (request, poll) = f
        .escalations
        .request_role_escalation(
            &f.members[1],
            EscalationRequest {
                group: f.group,
                candidate: f.members[1],
                requested_role: Role::Treasurer,
                justification: String::new(),
            },
            &d,
        )
        .unwrap();
    f.polls.cast_vote(&poll.id, &f.members[0], REJECT, &d).unwrap();
    f.polls.cast_vote(&poll.id, &f.members[2], REJECT, &d).unwrap();

    assert_eq!(role_of(&f, &f.members[1]), Role::Member);
    assert!(f.escalations.list_role_changes(&f.group, &f.members[0]).unwrap().is_empty());
    let settled = f.escalations.get_request(&request.id, &f.members[0]).unwrap();
    assert_eq!(settled.status, EscalationStatus::Rejected);
}

#[test]
fn escalation_tied_at_close_is_rejected() {
    let f = fixture(6);
    let d = Deadline::unbounded();
    let (request, poll) = f
        .escalations
        .request_role_escalation(
            &f.members[0],
            EscalationRequest {
                group: f.group,
                candidate: f.members[1],
                requested_role: Role::Secretary,
                justification: "Keeps the minutes already".into(),
            },
            &d,
        )
        .unwrap();
    f.polls.cast_vote(&poll.id, &f.members[2], APPROVE, &d).unwrap();
    f.polls.cast_vote(&poll.id, &f.members[3], REJECT, &d).unwrap();

    f.clock.advance(7 * DAY);
    let closed = f.polls.close_overdue(f.clock.now()).unwrap();
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].result, PollResult::Tied);
    assert_eq!(role_of(&f, &f.members[1]), Role::Member);
    let settled = f.escalations.get_request(&request.id, &f.members[0]).unwrap();
    assert_eq!(settled.status, EscalationStatus::Rejected);
}

#[test]
fn duplicate_and_no_op_requests_are_refused() {
    let f = fixture(3);
    let d = Deadline::unbounded();
    let request = |candidate: UserId, role: Role| EscalationRequest {
        group: f.group,
        candidate,
        requested_role: role,
        justification: String::new(),
    };
    assert!(matches!(
        f.escalations
            .request_role_escalation(&f.members[1], request(f.members[0], Role::Chairperson), &d),
        Err(CoreError::Validation(_))
    ));
    f.escalations
        .request_role_escalation(&f.members[1], request(f.members[2], Role::Treasurer), &d)
        .unwrap();
    assert!(matches!(
        f.escalations
            .request_role_escalation(&f.members[0], request(f.members[2], Role::Treasurer), &d),
        Err(CoreError::InvalidState(_))
    ));
}

#[test]
fn cancelling_the_poll_rejects_the_request() {
    let f = fixture(3);
    let d = Deadline::unbounded();
    let (request, poll) = f
        .escalations
        .request_role_escalation(
            &f.members[1],
            EscalationRequest {
                group: f.group,
                candidate: f.members[2],
                requested_role: Role::Treasurer,
                justification: String::new(),
            },
            &d,
        )
        .unwrap();
    f.polls.cancel_poll(&poll.id, &f.members[0], &d).unwrap();
    let settled = f.escalations.get_request(&request.id, &f.members[1]).unwrap();
    assert_eq!(settled.status, EscalationStatus::Rejected);
    // A new request for the same role may now be opened.
    f.escalations
        .request_role_escalation(
            &f.members[1],
            EscalationRequest {
                group: f.group,
                candidate: f.members[2],
                requested_role: Role::Treasurer,
                justification: String::new(),
            },
            &d,
        )
        .unwrap();
}

#[tokio::test]
async fn declared_results_are_announced_to_the_group() {
    let f = fixture(2);
    let d = Deadline::unbounded();
    let poll = f
        .polls
        .create_poll(
            &f.members[0],
            NewPoll {
                group: f.group,
                title: "Annual retreat venue".into(),
                description: String::new(),
                kind: PollKind::General,
                end_at: Timestamp::new(T0 + DAY),
                options: vec!["Naivasha".into(), "Mombasa".into()],
                anonymous: false,
                requires_majority: false,
                threshold: None,
            },
            &d,
        )
        .unwrap();
    let event = f
        .polls
        .cast_vote(&poll.id, &f.members[1], 1, &d)
        .unwrap()
        .declared
        .unwrap();

    let notifier = NullNotifier::new();
    announce_result(&notifier, &event).await;
    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].group, f.group);
    assert_eq!(sent[0].title, "Poll result declared");
    assert!(sent[0].body.contains("option 2"));
}
