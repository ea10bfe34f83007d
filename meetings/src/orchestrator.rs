//! The meeting orchestrator.
//!
//! Store mutations run inside one store transaction each; calls to the
//! conferencing service happen outside any transaction and are bounded by
//! the caller's deadline. Room reservation failures after a meeting is
//! persisted leave the room pending; it is created on the first token
//! request instead.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chama_groups::{
    notify_best_effort, require_role, resolve_membership, Membership, Notification, NotificationSink,
};
use chama_store::{AttendanceRecord, LedgerStore, LedgerTxn, MeetingRecord};
use chama_types::time::{DAY, MINUTE};
use chama_types::{
    AttendanceKind, Clock, CoreError, Deadline, GroupId, MeetingId, MeetingKind, MeetingStatus,
    Role, Timestamp, Transition, UserId,
};
use serde_json::json;
use tracing::{info, warn};

use crate::calendar::CalendarMirror;
use crate::capabilities::Capabilities;
use crate::conferencing::{ConferencingClient, ConferencingError, TokenGrant};
use crate::room::room_name;

const OFFICERS: &[Role] = &[Role::Chairperson, Role::Secretary, Role::Treasurer];

#[derive(Clone, Debug)]
pub struct MeetingSettings {
    pub room_prefix: String,
    pub max_participants: u32,
    pub token_ttl: Duration,
    /// Bound on each conferencing call, further limited by the request deadline.
    pub conferencing_timeout: Duration,
    /// How long before `scheduled_at` a meeting becomes ready.
    pub ready_lead_secs: u64,
    /// How long past `started_at + duration` an active meeting is ended.
    pub end_grace_secs: u64,
}

impl Default for MeetingSettings {
    fn default() -> Self {
        Self {
            room_prefix: "chama".into(),
            max_participants: 50,
            token_ttl: Duration::from_secs(DAY),
            conferencing_timeout: Duration::from_secs(5),
            ready_lead_secs: 5 * MINUTE,
            end_grace_secs: 30 * MINUTE,
        }
    }
}

/// A meeting after a lifecycle call, and whether the call moved it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MeetingChange {
    pub meeting: MeetingRecord,
    pub changed: bool,
}

#[derive(Clone, Debug)]
pub struct NewMeeting {
    pub group: GroupId,
    pub title: String,
    pub description: String,
    pub scheduled_at: Timestamp,
    pub duration_minutes: u32,
    pub kind: MeetingKind,
    pub location: Option<String>,
    pub recording_enabled: bool,
}

/// A bearer credential for one participant in one room.
#[derive(Clone, PartialEq, Eq)]
pub struct JoinToken {
    pub token: String,
    pub room: String,
    pub identity: String,
    pub capabilities: Capabilities,
    pub expires_at: Timestamp,
}

impl std::fmt::Debug for JoinToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JoinToken")
            .field("token", &"<redacted>")
            .field("room", &self.room)
            .field("identity", &self.identity)
            .field("capabilities", &self.capabilities)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

pub struct MeetingOrchestrator<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    conferencing: Arc<dyn ConferencingClient>,
    notifier: Arc<dyn NotificationSink>,
    calendar: Option<Arc<dyn CalendarMirror>>,
    settings: MeetingSettings,
}

impl<S: LedgerStore> MeetingOrchestrator<S> {
    pub fn new(
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        conferencing: Arc<dyn ConferencingClient>,
        notifier: Arc<dyn NotificationSink>,
        settings: MeetingSettings,
    ) -> Self {
        Self {
            store,
            clock,
            conferencing,
            notifier,
            calendar: None,
            settings,
        }
    }

    pub fn with_calendar(mut self, calendar: Arc<dyn CalendarMirror>) -> Self {
        self.calendar = Some(calendar);
        self
    }

    pub fn settings(&self) -> &MeetingSettings {
        &self.settings
    }

    /// Run a conferencing call bounded by the tighter of the configured
    /// timeout and the request deadline.
    async fn upstream<T>(
        &self,
        deadline: &Deadline,
        call: impl Future<Output = Result<T, ConferencingError>>,
    ) -> Result<T, CoreError> {
        let budget = deadline.min_timeout(self.settings.conferencing_timeout);
        if budget.is_zero() {
            return Err(CoreError::DeadlineExceeded);
        }
        match tokio::time::timeout(budget, call).await {
            Ok(result) => result.map_err(CoreError::from),
            Err(_) => Err(ConferencingError::Timeout(budget).into()),
        }
    }

    pub async fn create_meeting(
        &self,
        creator: &UserId,
        new: NewMeeting,
        deadline: &Deadline,
    ) -> Result<MeetingRecord, CoreError> {
        let title = new.title.trim();
        if title.is_empty() {
            return Err(CoreError::Validation("meeting title must not be empty".into()));
        }
        if new.duration_minutes == 0 {
            return Err(CoreError::Validation("meeting duration must be positive".into()));
        }
        let now = self.clock.now();
        if new.scheduled_at <= now {
            return Err(CoreError::Validation("meeting must be scheduled in the future".into()));
        }
        if new.kind != MeetingKind::Virtual && new.location.as_deref().map_or(true, |l| l.trim().is_empty()) {
            return Err(CoreError::Validation(format!(
                "a {} meeting needs a location",
                new.kind
            )));
        }

        let id = MeetingId::new();
        let room = new
            .kind
            .needs_room()
            .then(|| room_name(&self.settings.room_prefix, &new.group.to_string(), &id.to_string()));
        let mut meeting = MeetingRecord {
            id,
            group: new.group,
            title: title.to_string(),
            description: new.description,
            scheduled_at: new.scheduled_at,
            duration_minutes: new.duration_minutes,
            kind: new.kind,
            location: new.location,
            conference_room_id: None,
            conference_room_name: room,
            status: MeetingStatus::Scheduled,
            started_at: None,
            ended_at: None,
            recording_enabled: new.recording_enabled,
            created_by: *creator,
            created_at: now,
            updated_at: now,
        };

        self.store.with_transaction(|txn| {
            resolve_membership(txn, creator, &meeting.group)?;
            txn.insert_meeting(&meeting)?;
            deadline.check()
        })?;
        info!(meeting = %meeting.id, group = %meeting.group, kind = %meeting.kind, "meeting created");

        if meeting.room_pending() {
            match self.reserve_room(&meeting, deadline).await {
                Ok(updated) => meeting = updated,
                Err(e) => warn!(meeting = %meeting.id, error = %e, "room reservation failed, will retry on first join"),
            }
        }

        if let Some(calendar) = &self.calendar {
            if let Err(e) = calendar.meeting_created(&meeting).await {
                warn!(meeting = %meeting.id, error = %e, "calendar mirror failed");
            }
        }
        Ok(meeting)
    }

    /// Create the room with the conferencing service and record its id.
    async fn reserve_room(&self, meeting: &MeetingRecord, deadline: &Deadline) -> Result<MeetingRecord, CoreError> {
        let Some(name) = meeting.conference_room_name.clone() else {
            return Err(CoreError::InvalidState(format!("meeting {} has no room", meeting.id)));
        };
        let room_id = self
            .upstream(deadline, self.conferencing.create_room(&name, self.settings.max_participants))
            .await?;
        let now = self.clock.now();
        self.store.with_transaction(|txn| {
            let mut current = txn.get_meeting(&meeting.id)?;
            if current.conference_room_id.is_none() {
                current.conference_room_id = Some(room_id.clone());
                current.updated_at = now;
                txn.update_meeting(&current)?;
            }
            Ok(current)
        })
    }

    /// Release the room after the meeting is over. Failures are logged, not retried.
    async fn release_room(&self, meeting: &MeetingRecord) {
        let Some(name) = meeting.conference_room_name.as_deref() else {
            return;
        };
        if meeting.conference_room_id.is_none() {
            return;
        }
        if let Err(e) = self
            .upstream(&Deadline::unbounded(), self.conferencing.delete_room(name))
            .await
        {
            warn!(meeting = %meeting.id, room = %name, error = %e, "room release failed");
        }
    }

    async fn announce(&self, meeting: &MeetingRecord, title: &str) {
        let body = format!("{}: {}", meeting.title, title);
        let notification = Notification::new(meeting.group, title, body).with_data(json!({
            "meeting_id": meeting.id.to_string(),
            "status": meeting.status.as_str(),
        }));
        notify_best_effort(self.notifier.as_ref(), &notification).await;
    }

    /// Officers and the meeting's creator may drive its lifecycle.
    fn authorize_host(
        txn: &mut dyn LedgerTxn,
        user: &UserId,
        meeting: &MeetingRecord,
        action: &str,
    ) -> Result<Membership, CoreError> {
        if meeting.created_by == *user {
            return resolve_membership(txn, user, &meeting.group);
        }
        require_role(txn, user, &meeting.group, OFFICERS, action)
    }

    /// `scheduled | ready → active`. Starting an active or ended meeting is a
    /// no-op, reported with `changed == false`.
    pub async fn start_meeting(
        &self,
        meeting: &MeetingId,
        user: &UserId,
        deadline: &Deadline,
    ) -> Result<MeetingChange, CoreError> {
        let now = self.clock.now();
        let (record, changed) = self.store.with_transaction(|txn| {
            let mut record = txn.get_meeting(meeting)?;
            Self::authorize_host(txn, user, &record, "start a meeting")?;
            let Transition::Changed(status) = record.status.start()? else {
                return Ok::<_, CoreError>((record, false));
            };
            record.status = status;
            record.started_at = Some(now);
            record.updated_at = now;
            txn.update_meeting(&record)?;
            deadline.check()?;
            Ok((record, true))
        })?;

        if changed {
            info!(meeting = %record.id, "meeting started");
            self.announce(&record, "Meeting started").await;
        }
        Ok(MeetingChange {
            meeting: record,
            changed,
        })
    }

    /// `active → ended`. Ending an ended meeting is a no-op.
    pub async fn end_meeting(
        &self,
        meeting: &MeetingId,
        user: &UserId,
        deadline: &Deadline,
    ) -> Result<MeetingChange, CoreError> {
        let now = self.clock.now();
        let (record, changed) = self.store.with_transaction(|txn| {
            let record = txn.get_meeting(meeting)?;
            Self::authorize_host(txn, user, &record, "end a meeting")?;
            let ended = end_in_txn(txn, record, now)?;
            deadline.check()?;
            Ok::<_, CoreError>(ended)
        })?;

        if changed {
            self.after_end(&record).await;
        }
        Ok(MeetingChange {
            meeting: record,
            changed,
        })
    }

    async fn after_end(&self, meeting: &MeetingRecord) {
        info!(meeting = %meeting.id, "meeting ended");
        self.release_room(meeting).await;
        self.announce(meeting, "Meeting ended").await;
    }

    /// `scheduled | ready → cancelled`, releasing any reserved room.
    pub async fn cancel_meeting(
        &self,
        meeting: &MeetingId,
        user: &UserId,
        deadline: &Deadline,
    ) -> Result<MeetingRecord, CoreError> {
        let now = self.clock.now();
        let (record, changed) = self.store.with_transaction(|txn| {
            let mut record = txn.get_meeting(meeting)?;
            Self::authorize_host(txn, user, &record, "cancel a meeting")?;
            let Transition::Changed(status) = record.status.cancel()? else {
                return Ok::<_, CoreError>((record, false));
            };
            record.status = status;
            record.updated_at = now;
            txn.update_meeting(&record)?;
            deadline.check()?;
            Ok((record, true))
        })?;

        if changed {
            info!(meeting = %record.id, "meeting cancelled");
            self.release_room(&record).await;
            if let Some(calendar) = &self.calendar {
                if let Err(e) = calendar.meeting_cancelled(&record).await {
                    warn!(meeting = %record.id, error = %e, "calendar mirror failed");
                }
            }
            self.announce(&record, "Meeting cancelled").await;
        }
        Ok(record)
    }

    /// A join token whose capabilities follow the caller's role.
    pub async fn issue_join_token(
        &self,
        meeting: &MeetingId,
        user: &UserId,
        deadline: &Deadline,
    ) -> Result<JoinToken, CoreError> {
        let (record, membership, display_name) = self.store.read(|txn| {
            let record = txn.get_meeting(meeting)?;
            let membership = member_or_denied(txn, user, &record.group)?;
            let display_name = txn.get_user(user)?.email;
            Ok::<_, CoreError>((record, membership, display_name))
        })?;
        self.mint(record, user, display_name, Capabilities::for_role(membership.role), deadline)
            .await
    }

    /// A subscriber-only token letting an officer look into the room before
    /// the meeting goes live.
    pub async fn issue_preview_token(
        &self,
        meeting: &MeetingId,
        user: &UserId,
        deadline: &Deadline,
    ) -> Result<JoinToken, CoreError> {
        let (record, display_name) = self.store.read(|txn| {
            let record = txn.get_meeting(meeting)?;
            let membership = member_or_denied(txn, user, &record.group)?;
            if !membership.role.is_officer() {
                return Err(CoreError::AccessDenied(
                    "preview tokens are issued to officers only".into(),
                ));
            }
            let display_name = txn.get_user(user)?.email;
            Ok::<_, CoreError>((record, display_name))
        })?;
        self.mint(record, user, display_name, Capabilities::SUBSCRIBER, deadline)
            .await
    }

    async fn mint(
        &self,
        mut meeting: MeetingRecord,
        user: &UserId,
        display_name: Option<String>,
        capabilities: Capabilities,
        deadline: &Deadline,
    ) -> Result<JoinToken, CoreError> {
        if !meeting.kind.needs_room() {
            return Err(CoreError::InvalidState(format!(
                "{} meetings have no conference room",
                meeting.kind
            )));
        }
        match meeting.status {
            MeetingStatus::Ended => return Err(CoreError::MeetingAlreadyEnded),
            MeetingStatus::Cancelled => return Err(CoreError::MeetingCancelled),
            _ => {}
        }
        if meeting.room_pending() {
            meeting = self.reserve_room(&meeting, deadline).await?;
            info!(meeting = %meeting.id, "room reserved on first join");
        }
        let Some(room) = meeting.conference_room_name.clone() else {
            return Err(CoreError::InvalidState(format!("meeting {} has no room", meeting.id)));
        };

        let grant = TokenGrant {
            room: room.clone(),
            identity: user.to_string(),
            display_name,
            capabilities,
            issued_at: self.clock.now(),
            ttl: self.settings.token_ttl,
        };
        let token = self
            .upstream(deadline, self.conferencing.mint_token(&grant))
            .await?;
        deadline.check()?;
        Ok(JoinToken {
            token,
            room,
            expires_at: grant.expires_at(),
            identity: grant.identity,
            capabilities,
        })
    }

    /// Upsert the caller's attendance. The first positive mark records
    /// `joined_at`; a negative mark records `left_at`. Duration is recomputed
    /// on every mark.
    pub fn mark_attendance(
        &self,
        meeting: &MeetingId,
        user: &UserId,
        kind: AttendanceKind,
        present: bool,
        deadline: &Deadline,
    ) -> Result<AttendanceRecord, CoreError> {
        let now = self.clock.now();
        self.store.with_transaction(|txn| {
            let record = txn.get_meeting(meeting)?;
            resolve_membership(txn, user, &record.group)?;
            if record.status == MeetingStatus::Cancelled {
                return Err(CoreError::MeetingCancelled);
            }
            let mut attendance = txn.get_attendance(meeting, user)?.unwrap_or(AttendanceRecord {
                meeting: *meeting,
                user: *user,
                kind,
                joined_at: None,
                left_at: None,
                duration_minutes: 0,
                present: false,
                created_at: now,
                updated_at: now,
            });
            attendance.kind = kind;
            attendance.present = present;
            if present {
                attendance.joined_at.get_or_insert(now);
                attendance.left_at = None;
            } else {
                attendance.left_at = Some(now);
            }
            attendance.duration_minutes = attended_minutes(&attendance, now);
            attendance.updated_at = now;
            txn.put_attendance(&attendance)?;
            deadline.check()?;
            Ok(attendance)
        })
    }

    pub fn get_attendance(&self, meeting: &MeetingId, requester: &UserId) -> Result<Vec<AttendanceRecord>, CoreError> {
        self.store.read(|txn| {
            let record = txn.get_meeting(meeting)?;
            resolve_membership(txn, requester, &record.group)?;
            Ok(txn.list_attendance(meeting)?)
        })
    }

    pub fn get_meeting(&self, meeting: &MeetingId, requester: &UserId) -> Result<MeetingRecord, CoreError> {
        self.store.read(|txn| {
            let record = txn.get_meeting(meeting)?;
            resolve_membership(txn, requester, &record.group)?;
            Ok(record)
        })
    }

    pub fn list_meetings(
        &self,
        group: &GroupId,
        requester: &UserId,
        status: Option<MeetingStatus>,
    ) -> Result<Vec<MeetingRecord>, CoreError> {
        self.store.read(|txn| {
            resolve_membership(txn, requester, group)?;
            Ok(txn.list_meetings(group, status)?)
        })
    }

    /// `scheduled → ready` for meetings starting within the lead time.
    /// Returns the meetings that changed.
    pub async fn advance_ready(&self, now: Timestamp) -> Result<Vec<MeetingRecord>, CoreError> {
        let until = now.plus_secs(self.settings.ready_lead_secs);
        let due = self
            .store
            .read(|txn| txn.meetings_scheduled_between(MeetingStatus::Scheduled, now, until))?;

        let mut changed = Vec::with_capacity(due.len());
        for candidate in due {
            let updated = self.store.with_transaction(|txn| {
                let mut record = txn.get_meeting(&candidate.id)?;
                // Re-check: a concurrent start or cancel wins.
                if record.status != MeetingStatus::Scheduled {
                    return Ok(None);
                }
                let Transition::Changed(status) = record.status.mark_ready()? else {
                    return Ok(None);
                };
                record.status = status;
                record.updated_at = now;
                txn.update_meeting(&record)?;
                Ok::<_, CoreError>(Some(record))
            })?;
            if let Some(record) = updated {
                info!(meeting = %record.id, "meeting ready");
                self.announce(&record, "Meeting starting soon").await;
                changed.push(record);
            }
        }
        Ok(changed)
    }

    /// `active → ended` for meetings past `started_at + duration + grace`.
    pub async fn end_overrunning(&self, now: Timestamp) -> Result<Vec<MeetingRecord>, CoreError> {
        let due = self
            .store
            .read(|txn| txn.meetings_overrunning(now, self.settings.end_grace_secs))?;

        let mut ended = Vec::with_capacity(due.len());
        for candidate in due {
            let (record, changed) = self.store.with_transaction(|txn| {
                let record = txn.get_meeting(&candidate.id)?;
                end_in_txn(txn, record, now)
            })?;
            if changed {
                self.after_end(&record).await;
                ended.push(record);
            }
        }
        Ok(ended)
    }
}

/// Token issuance reports every authorization failure as `AccessDenied`.
fn member_or_denied(txn: &mut dyn LedgerTxn, user: &UserId, group: &GroupId) -> Result<Membership, CoreError> {
    resolve_membership(txn, user, group).map_err(|e| match e {
        CoreError::NotAMember { .. } => {
            CoreError::AccessDenied(format!("user {user} is not an active member of this group"))
        }
        other => other,
    })
}

fn end_in_txn(
    txn: &mut dyn LedgerTxn,
    mut record: MeetingRecord,
    now: Timestamp,
) -> Result<(MeetingRecord, bool), CoreError> {
    let Transition::Changed(status) = record.status.end()? else {
        return Ok((record, false));
    };
    record.status = status;
    record.ended_at = Some(now);
    record.updated_at = now;
    txn.update_meeting(&record)?;
    Ok((record, true))
}

fn attended_minutes(attendance: &AttendanceRecord, now: Timestamp) -> u32 {
    let Some(joined) = attendance.joined_at else {
        return 0;
    };
    let until = attendance.left_at.unwrap_or(now);
    u32::try_from(joined.elapsed_since(until) / MINUTE).unwrap_or(u32::MAX)
}

