use chama_store::{AttendanceRecord, MeetingRecord, MeetingStore, StoreError};
use chama_types::{GroupId, MeetingId, MeetingStatus, Timestamp, UserId};
use rusqlite::types::Value;
use rusqlite::{params, OptionalExtension, Row};

use crate::codec::{counter, parsed, parsed_opt, ts, ts_opt};
use crate::error::SqlResultExt;
use crate::query::{MeetingColumn, Update};
use crate::SqliteTxn;

fn meeting_from_row(row: &Row<'_>) -> rusqlite::Result<MeetingRecord> {
    Ok(MeetingRecord {
        id: parsed(row, "id")?,
        group: parsed(row, "group_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        scheduled_at: parsed(row, "scheduled_at")?,
        duration_minutes: counter(row, "duration_minutes")?,
        kind: parsed(row, "kind")?,
        location: row.get("location")?,
        conference_room_id: row.get("conference_room_id")?,
        conference_room_name: row.get("conference_room_name")?,
        status: parsed(row, "status")?,
        started_at: parsed_opt(row, "started_at")?,
        ended_at: parsed_opt(row, "ended_at")?,
        recording_enabled: row.get("recording_enabled")?,
        created_by: parsed(row, "created_by")?,
        created_at: parsed(row, "created_at")?,
        updated_at: parsed(row, "updated_at")?,
    })
}

fn attendance_from_row(row: &Row<'_>) -> rusqlite::Result<AttendanceRecord> {
    Ok(AttendanceRecord {
        meeting: parsed(row, "meeting_id")?,
        user: parsed(row, "user_id")?,
        kind: parsed(row, "kind")?,
        joined_at: parsed_opt(row, "joined_at")?,
        left_at: parsed_opt(row, "left_at")?,
        duration_minutes: counter(row, "duration_minutes")?,
        present: row.get("present")?,
        created_at: parsed(row, "created_at")?,
        updated_at: parsed(row, "updated_at")?,
    })
}

impl SqliteTxn<'_> {
    fn meetings_where(
        &self,
        sql: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<MeetingRecord>, StoreError> {
        let mut stmt = self.conn.prepare(sql).db()?;
        let rows = stmt.query_map(args, meeting_from_row).db()?;
        rows.collect::<rusqlite::Result<Vec<_>>>().db()
    }
}

impl MeetingStore for SqliteTxn<'_> {
    fn insert_meeting(&mut self, m: &MeetingRecord) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO meetings
                    (id, group_id, title, description, scheduled_at, duration_minutes, kind,
                     location, conference_room_id, conference_room_name, status, started_at,
                     ended_at, recording_enabled, created_by, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
                params![
                    m.id.to_string(),
                    m.group.to_string(),
                    m.title,
                    m.description,
                    ts(m.scheduled_at),
                    m.duration_minutes,
                    m.kind.as_str(),
                    m.location,
                    m.conference_room_id,
                    m.conference_room_name,
                    m.status.as_str(),
                    ts_opt(m.started_at),
                    ts_opt(m.ended_at),
                    m.recording_enabled,
                    m.created_by.to_string(),
                    ts(m.created_at),
                    ts(m.updated_at),
                ],
            )
            .db()?;
        Ok(())
    }

    fn get_meeting(&mut self, id: &MeetingId) -> Result<MeetingRecord, StoreError> {
        self.conn
            .query_row(
                "SELECT * FROM meetings WHERE id = ?1",
                params![id.to_string()],
                meeting_from_row,
            )
            .optional()
            .db()?
            .ok_or_else(|| StoreError::not_found("meeting", id))
    }

    fn update_meeting(&mut self, m: &MeetingRecord) -> Result<(), StoreError> {
        let changed = Update::new()
            .set(MeetingColumn::ConferenceRoomId, m.conference_room_id.clone())
            .set(MeetingColumn::ConferenceRoomName, m.conference_room_name.clone())
            .set(MeetingColumn::Status, m.status.as_str().to_string())
            .set(MeetingColumn::StartedAt, ts_opt(m.started_at))
            .set(MeetingColumn::EndedAt, ts_opt(m.ended_at))
            .set(MeetingColumn::UpdatedAt, ts(m.updated_at))
            .execute(self.conn, vec![Value::from(m.id.to_string())])
            .db()?;
        if changed == 0 {
            return Err(StoreError::not_found("meeting", m.id));
        }
        Ok(())
    }

    fn list_meetings(
        &mut self,
        group: &GroupId,
        status: Option<MeetingStatus>,
    ) -> Result<Vec<MeetingRecord>, StoreError> {
        self.meetings_where(
            "SELECT * FROM meetings WHERE group_id = ?1 AND (?2 IS NULL OR status = ?2)
             ORDER BY scheduled_at, rowid",
            &[&group.to_string(), &status.map(|s| s.as_str())],
        )
    }

    fn meetings_scheduled_between(
        &mut self,
        status: MeetingStatus,
        after: Timestamp,
        until: Timestamp,
    ) -> Result<Vec<MeetingRecord>, StoreError> {
        self.meetings_where(
            "SELECT * FROM meetings WHERE status = ?1 AND scheduled_at > ?2 AND scheduled_at <= ?3
             ORDER BY scheduled_at, rowid",
            &[&status.as_str(), &ts(after), &ts(until)],
        )
    }

    fn meetings_overrunning(
        &mut self,
        now: Timestamp,
        grace_secs: u64,
    ) -> Result<Vec<MeetingRecord>, StoreError> {
        // Per-row deadlines depend on duration; narrow by status in SQL, by time here.
        let active = self.meetings_where(
            "SELECT * FROM meetings WHERE status = ?1 AND started_at IS NOT NULL
             ORDER BY started_at, rowid",
            &[&MeetingStatus::Active.as_str()],
        )?;
        Ok(active
            .into_iter()
            .filter(|m| m.auto_end_at(grace_secs).is_some_and(|end| end <= now))
            .collect())
    }

    fn get_attendance(
        &mut self,
        meeting: &MeetingId,
        user: &UserId,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        self.conn
            .query_row(
                "SELECT * FROM attendance WHERE meeting_id = ?1 AND user_id = ?2",
                params![meeting.to_string(), user.to_string()],
                attendance_from_row,
            )
            .optional()
            .db()
    }

    fn put_attendance(&mut self, a: &AttendanceRecord) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO attendance
                    (meeting_id, user_id, kind, joined_at, left_at, duration_minutes, present,
                     created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT (meeting_id, user_id) DO UPDATE SET
                    kind = excluded.kind,
                    joined_at = excluded.joined_at,
                    left_at = excluded.left_at,
                    duration_minutes = excluded.duration_minutes,
                    present = excluded.present,
                    updated_at = excluded.updated_at",
                params![
                    a.meeting.to_string(),
                    a.user.to_string(),
                    a.kind.as_str(),
                    ts_opt(a.joined_at),
                    ts_opt(a.left_at),
                    a.duration_minutes,
                    a.present,
                    ts(a.created_at),
                    ts(a.updated_at),
                ],
            )
            .db()?;
        Ok(())
    }

    fn list_attendance(&mut self, meeting: &MeetingId) -> Result<Vec<AttendanceRecord>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM attendance WHERE meeting_id = ?1 ORDER BY created_at, user_id")
            .db()?;
        let rows = stmt
            .query_map(params![meeting.to_string()], attendance_from_row)
            .db()?;
        rows.collect::<rusqlite::Result<Vec<_>>>().db()
    }
}
