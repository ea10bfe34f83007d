//! Fundamental types for the chama core.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! identifiers, fixed-point money, timestamps and the canonical time parser,
//! membership roles, closed status sets with their transition functions, and
//! the error taxonomy surfaced by the engines.

pub mod amount;
pub mod clock;
pub mod deadline;
pub mod error;
pub mod hash;
pub mod ids;
pub mod params;
pub mod role;
pub mod state;
pub mod time;

pub use amount::{Amount, Currency};
pub use clock::{Clock, SystemClock};
pub use deadline::Deadline;
pub use error::{CoreError, ErrorKind};
pub use hash::VoterHash;
pub use ids::{
    DividendId, EscalationId, GroupId, HoldingId, MeetingId, OfferingId, PollId, RoleChangeId,
    ShareTxId, TransactionId, UserId, WalletId,
};
pub use params::Threshold;
pub use role::Role;
pub use state::{
    AttendanceKind, DividendStatus, EscalationStatus, GroupStatus, HoldingStatus, MeetingKind,
    MeetingStatus, OfferingStatus, PaymentMethod, PollKind, PollResult, PollStatus, ShareKind,
    ShareTxKind, TransactionKind, TransactionStatus, Transition, UserStatus, WalletKind,
    WalletOwner,
};
pub use time::{parse_timestamp, Timestamp};
