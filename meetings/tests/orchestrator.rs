use std::sync::Arc;
use std::time::Duration;

use chama_groups::{GroupAdmin, NewUser};
use chama_meetings::{MeetingOrchestrator, MeetingSettings, NewMeeting};
use chama_nullables::{MemoryStore, NullCalendar, NullClock, NullConferencing, NullNotifier};
use chama_types::time::{DAY, MINUTE};
use chama_types::{
    AttendanceKind, Clock, CoreError, Deadline, GroupId, MeetingKind, MeetingStatus, UserId,
};

const T0: u64 = 1_700_000_000;

struct Fixture {
    clock: Arc<NullClock>,
    conferencing: Arc<NullConferencing>,
    notifier: Arc<NullNotifier>,
    calendar: Arc<NullCalendar>,
    orchestrator: MeetingOrchestrator<MemoryStore>,
    group: GroupId,
    chair: UserId,
    member: UserId,
    outsider: UserId,
}

fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(NullClock::new(T0 - 60 * MINUTE));
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
    let outsider = user("outsider@example.com");
    let group = admin.create_group("Umoja", &chair, &d).unwrap().id;
    admin.join_group(&group, &member, &d).unwrap();

    let conferencing = Arc::new(NullConferencing::new());
    let notifier = Arc::new(NullNotifier::new());
    let calendar = Arc::new(NullCalendar::new());
    let orchestrator = MeetingOrchestrator::new(
        store,
        clock.clone(),
        conferencing.clone(),
        notifier.clone(),
        MeetingSettings::default(),
    )
    .with_calendar(calendar.clone());

    Fixture {
        clock,
        conferencing,
        notifier,
        calendar,
        orchestrator,
        group,
        chair,
        member,
        outsider,
    }
}

fn virtual_meeting(group: GroupId) -> NewMeeting {
    NewMeeting {
        group,
        title: "Monthly AGM".into(),
        description: "Contributions and loans".into(),
        scheduled_at: chama_types::Timestamp::new(T0),
        duration_minutes: 60,
        kind: MeetingKind::Virtual,
        location: None,
        recording_enabled: false,
    }
}

#[tokio::test]
async fn virtual_meeting_lifecycle() {
    let f = fixture();
    let d = Deadline::unbounded();
    let meeting = f
        .orchestrator
        .create_meeting(&f.chair, virtual_meeting(f.group), &d)
        .await
        .unwrap();
    assert_eq!(meeting.status, MeetingStatus::Scheduled);
    assert!(meeting.conference_room_id.is_some());
    assert_eq!(f.calendar.created(), vec![meeting.id]);

    // t0 - 4 min: the scheduler readies it.
    f.clock.set(T0 - 4 * MINUTE);
    let ready = f.orchestrator.advance_ready(f.clock.now()).await.unwrap();
    assert_eq!(ready.len(), 1);
    assert_eq!(ready[0].status, MeetingStatus::Ready);

    let token = f.orchestrator.issue_join_token(&meeting.id, &f.chair, &d).await.unwrap();
    assert!(token.capabilities.room_admin);
    assert_eq!(token.identity, f.chair.to_string());
    // Token validity follows the injected clock, not wall time.
    let grant = f.conferencing.grants().pop().unwrap();
    assert_eq!(grant.issued_at, chama_types::Timestamp::new(T0 - 4 * MINUTE));
    assert_eq!(token.expires_at, grant.expires_at());
    assert_eq!(token.expires_at, chama_types::Timestamp::new(T0 - 4 * MINUTE + DAY));
    let member_token = f.orchestrator.issue_join_token(&meeting.id, &f.member, &d).await.unwrap();
    assert!(!member_token.capabilities.room_admin);
    assert!(!member_token.capabilities.can_publish_data);

    // t0 + 1 min: the chair starts it; starting twice changes nothing.
    f.clock.set(T0 + MINUTE);
    let started = f.orchestrator.start_meeting(&meeting.id, &f.chair, &d).await.unwrap();
    assert!(started.changed);
    assert_eq!(started.meeting.status, MeetingStatus::Active);
    assert_eq!(started.meeting.started_at, Some(chama_types::Timestamp::new(T0 + MINUTE)));
    let same_second = f.orchestrator.start_meeting(&meeting.id, &f.chair, &d).await.unwrap();
    assert!(!same_second.changed);
    f.clock.advance(MINUTE);
    let again = f.orchestrator.start_meeting(&meeting.id, &f.chair, &d).await.unwrap();
    assert!(!again.changed);
    assert_eq!(again.meeting, started.meeting);

    // Not yet overrunning at t0 + 90 min.
    f.clock.set(T0 + 90 * MINUTE);
    assert!(f.orchestrator.end_overrunning(f.clock.now()).await.unwrap().is_empty());

    // t0 + 91 min: started + 60 + 30 grace has passed.
    f.clock.set(T0 + 91 * MINUTE);
    let ended = f.orchestrator.end_overrunning(f.clock.now()).await.unwrap();
    assert_eq!(ended.len(), 1);
    assert_eq!(ended[0].status, MeetingStatus::Ended);
    assert_eq!(
        f.conferencing.deleted_rooms(),
        vec![meeting.conference_room_name.clone().unwrap()]
    );

    // Ending again is a no-op, and no second release happens.
    let still = f.orchestrator.end_meeting(&meeting.id, &f.chair, &d).await.unwrap();
    assert!(!still.changed);
    assert_eq!(still.meeting.ended_at, ended[0].ended_at);
    assert_eq!(f.conferencing.deleted_rooms().len(), 1);

    assert!(matches!(
        f.orchestrator.issue_join_token(&meeting.id, &f.chair, &d).await,
        Err(CoreError::MeetingAlreadyEnded)
    ));
    assert_eq!(
        f.notifier.titles(),
        vec!["Meeting starting soon", "Meeting started", "Meeting ended"]
    );
}

#[tokio::test]
async fn tokens_require_active_membership() {
    let f = fixture();
    let d = Deadline::unbounded();
    let meeting = f
        .orchestrator
        .create_meeting(&f.chair, virtual_meeting(f.group), &d)
        .await
        .unwrap();
    assert!(matches!(
        f.orchestrator.issue_join_token(&meeting.id, &f.outsider, &d).await,
        Err(CoreError::AccessDenied(_))
    ));
    assert!(matches!(
        f.orchestrator.issue_preview_token(&meeting.id, &f.member, &d).await,
        Err(CoreError::AccessDenied(_))
    ));
    let preview = f.orchestrator.issue_preview_token(&meeting.id, &f.chair, &d).await.unwrap();
    assert!(!preview.capabilities.can_publish_av);
    assert!(preview.capabilities.can_subscribe);
}

#[tokio::test]
async fn failed_reservation_is_retried_on_first_join() {
    let f = fixture();
    let d = Deadline::unbounded();
    f.conferencing.fail_room_creation(true);
    let meeting = f
        .orchestrator
        .create_meeting(&f.chair, virtual_meeting(f.group), &d)
        .await
        .unwrap();
    assert!(meeting.room_pending());

    f.conferencing.fail_room_creation(false);
    let token = f.orchestrator.issue_join_token(&meeting.id, &f.member, &d).await.unwrap();
    assert_eq!(Some(token.room.clone()), meeting.conference_room_name);

    let stored = f.orchestrator.get_meeting(&meeting.id, &f.member).unwrap();
    assert!(stored.conference_room_id.is_some());
    assert_eq!(f.conferencing.rooms().len(), 1);
}

#[tokio::test]
async fn conferencing_timeout_surfaces_as_upstream_unavailable() {
    let f = fixture();
    let meeting = f
        .orchestrator
        .create_meeting(&f.chair, virtual_meeting(f.group), &Deadline::unbounded())
        .await
        .unwrap();
    f.conferencing.hang(true);
    let short = Deadline::after(Duration::from_millis(50));
    let err = f
        .orchestrator
        .issue_join_token(&meeting.id, &f.chair, &short)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::UpstreamUnavailable(_) | CoreError::DeadlineExceeded));
    assert!(f.conferencing.grants().is_empty());
}

#[tokio::test]
async fn physical_meetings_get_no_room() {
    let f = fixture();
    let d = Deadline::unbounded();
    let meeting = f
        .orchestrator
        .create_meeting(
            &f.chair,
            NewMeeting {
                kind: MeetingKind::Physical,
                location: Some("Community hall".into()),
                ..virtual_meeting(f.group)
            },
            &d,
        )
        .await
        .unwrap();
    assert!(meeting.conference_room_name.is_none());
    assert!(f.conferencing.rooms().is_empty());
    assert!(matches!(
        f.orchestrator.issue_join_token(&meeting.id, &f.chair, &d).await,
        Err(CoreError::InvalidState(_))
    ));
}

#[tokio::test]
async fn cancel_releases_room_and_blocks_start() {
    let f = fixture();
    let d = Deadline::unbounded();
    let meeting = f
        .orchestrator
        .create_meeting(&f.chair, virtual_meeting(f.group), &d)
        .await
        .unwrap();
    assert!(matches!(
        f.orchestrator.cancel_meeting(&meeting.id, &f.member, &d).await,
        Err(CoreError::InsufficientRole { .. })
    ));
    let cancelled = f.orchestrator.cancel_meeting(&meeting.id, &f.chair, &d).await.unwrap();
    assert_eq!(cancelled.status, MeetingStatus::Cancelled);
    assert_eq!(f.conferencing.deleted_rooms().len(), 1);
    assert_eq!(f.calendar.cancelled(), vec![meeting.id]);
    assert!(matches!(
        f.orchestrator.start_meeting(&meeting.id, &f.chair, &d).await,
        Err(CoreError::MeetingCancelled)
    ));
}

#[tokio::test]
async fn attendance_is_upserted_per_member() {
    let f = fixture();
    let d = Deadline::unbounded();
    let meeting = f
        .orchestrator
        .create_meeting(&f.chair, virtual_meeting(f.group), &d)
        .await
        .unwrap();
    f.clock.set(T0);
    f.orchestrator.start_meeting(&meeting.id, &f.chair, &d).await.unwrap();

    let joined = f
        .orchestrator
        .mark_attendance(&meeting.id, &f.member, AttendanceKind::Virtual, true, &d)
        .unwrap();
    assert_eq!(joined.joined_at, Some(chama_types::Timestamp::new(T0)));

    f.clock.set(T0 + 45 * MINUTE);
    let left = f
        .orchestrator
        .mark_attendance(&meeting.id, &f.member, AttendanceKind::Virtual, false, &d)
        .unwrap();
    assert!(!left.present);
    assert_eq!(left.joined_at, Some(chama_types::Timestamp::new(T0)));
    assert_eq!(left.duration_minutes, 45);

    let rows = f.orchestrator.get_attendance(&meeting.id, &f.chair).unwrap();
    assert_eq!(rows.len(), 1);
    assert!(matches!(
        f.orchestrator.mark_attendance(&meeting.id, &f.outsider, AttendanceKind::Virtual, true, &d),
        Err(CoreError::NotAMember { .. })
    ));
}
