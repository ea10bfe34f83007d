//! Nullable calendar mirror.

use crate::lock;
use async_trait::async_trait;
use chama_meetings::{CalendarError, CalendarMirror};
use chama_store::MeetingRecord;
use chama_types::MeetingId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct NullCalendar {
    created: Mutex<Vec<MeetingId>>,
    cancelled: Mutex<Vec<MeetingId>>,
    failing: AtomicBool,
}

impl NullCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn created(&self) -> Vec<MeetingId> {
        lock(&self.created).clone()
    }

    pub fn cancelled(&self) -> Vec<MeetingId> {
        lock(&self.cancelled).clone()
    }

    fn outcome(&self) -> Result<(), CalendarError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(CalendarError("null calendar set to fail".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CalendarMirror for NullCalendar {
    async fn meeting_created(&self, meeting: &MeetingRecord) -> Result<(), CalendarError> {
        self.outcome()?;
        lock(&self.created).push(meeting.id);
        Ok(())
    }

    async fn meeting_cancelled(&self, meeting: &MeetingRecord) -> Result<(), CalendarError> {
        self.outcome()?;
        lock(&self.cancelled).push(meeting.id);
        Ok(())
    }
}
