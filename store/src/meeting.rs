//! Meetings and attendance.

use crate::StoreError;
use chama_types::{
    AttendanceKind, GroupId, MeetingId, MeetingKind, MeetingStatus, Timestamp, UserId,
};
use chama_types::time::MINUTE;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingRecord {
    pub id: MeetingId,
    pub group: GroupId,
    pub title: String,
    pub description: String,
    pub scheduled_at: Timestamp,
    pub duration_minutes: u32,
    pub kind: MeetingKind,
    pub location: Option<String>,
    pub conference_room_id: Option<String>,
    pub conference_room_name: Option<String>,
    pub status: MeetingStatus,
    pub started_at: Option<Timestamp>,
    pub ended_at: Option<Timestamp>,
    pub recording_enabled: bool,
    pub created_by: UserId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl MeetingRecord {
    /// A room was named but the conferencing service has not confirmed it yet.
    pub fn room_pending(&self) -> bool {
        self.kind.needs_room()
            && self.conference_room_name.is_some()
            && self.conference_room_id.is_none()
    }

    /// When the scheduler ends an active meeting: `started_at + duration + grace`.
    pub fn auto_end_at(&self, grace_secs: u64) -> Option<Timestamp> {
        self.started_at.map(|started| {
            started
                .plus_secs(u64::from(self.duration_minutes) * MINUTE)
                .plus_secs(grace_secs)
        })
    }
}

/// One row per (meeting, user).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub meeting: MeetingId,
    pub user: UserId,
    pub kind: AttendanceKind,
    pub joined_at: Option<Timestamp>,
    pub left_at: Option<Timestamp>,
    pub duration_minutes: u32,
    pub present: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

pub trait MeetingStore {
    fn insert_meeting(&mut self, meeting: &MeetingRecord) -> Result<(), StoreError>;

    fn get_meeting(&mut self, id: &MeetingId) -> Result<MeetingRecord, StoreError>;

    /// Persist room, status and start/end fields.
    fn update_meeting(&mut self, meeting: &MeetingRecord) -> Result<(), StoreError>;

    /// Meetings of a group ordered by `scheduled_at`, optionally filtered by status.
    fn list_meetings(
        &mut self,
        group: &GroupId,
        status: Option<MeetingStatus>,
    ) -> Result<Vec<MeetingRecord>, StoreError>;

    /// Meetings in `status` with `after < scheduled_at <= until`.
    fn meetings_scheduled_between(
        &mut self,
        status: MeetingStatus,
        after: Timestamp,
        until: Timestamp,
    ) -> Result<Vec<MeetingRecord>, StoreError>;

    /// Active meetings whose `started_at + duration + grace_secs <= now`.
    fn meetings_overrunning(
        &mut self,
        now: Timestamp,
        grace_secs: u64,
    ) -> Result<Vec<MeetingRecord>, StoreError>;

    fn get_attendance(
        &mut self,
        meeting: &MeetingId,
        user: &UserId,
    ) -> Result<Option<AttendanceRecord>, StoreError>;

    /// Insert or replace by (meeting, user).
    fn put_attendance(&mut self, attendance: &AttendanceRecord) -> Result<(), StoreError>;

    fn list_attendance(&mut self, meeting: &MeetingId) -> Result<Vec<AttendanceRecord>, StoreError>;
}
