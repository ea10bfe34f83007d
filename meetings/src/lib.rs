//! Virtual meeting lifecycle.
//!
//! The [`MeetingOrchestrator`] creates meetings, reserves conference rooms
//! with an external SFU, issues bearer tokens whose capabilities follow the
//! caller's role, and tracks attendance. Time-driven transitions
//! (`scheduled → ready`, `active → ended`) are exposed as advance functions
//! for the node's scheduler.

pub mod calendar;
pub mod capabilities;
pub mod conferencing;
pub mod livekit;
pub mod orchestrator;
pub mod room;

pub use calendar::{CalendarError, CalendarMirror};
pub use capabilities::Capabilities;
pub use conferencing::{ConferencingClient, ConferencingError, TokenGrant};
pub use livekit::{LiveKitClient, LiveKitConfig};
pub use orchestrator::{JoinToken, MeetingChange, MeetingOrchestrator, MeetingSettings, NewMeeting};
pub use room::room_name;
