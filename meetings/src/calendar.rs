//! Optional calendar mirror. Failures are logged and never abort the meeting
//! operation that triggered them.

use async_trait::async_trait;
use chama_store::MeetingRecord;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("calendar mirror failed: {0}")]
pub struct CalendarError(pub String);

#[async_trait]
pub trait CalendarMirror: Send + Sync {
    async fn meeting_created(&self, meeting: &MeetingRecord) -> Result<(), CalendarError>;

    async fn meeting_cancelled(&self, meeting: &MeetingRecord) -> Result<(), CalendarError>;
}
