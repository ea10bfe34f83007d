//! Group governance.
//!
//! - [`tally`]: the pure decision rule applied after each vote and at close
//! - [`PollEngine`]: poll creation, anonymous ballots, sealing and cancellation
//! - [`ResultDeclared`]: the typed event a sealed poll emits inside the
//!   sealing transaction
//! - [`RoleEscalationCoordinator`]: the subscriber that turns a passed
//!   role-escalation poll into a role change

pub mod escalation;
pub mod events;
pub mod polls;
pub mod tally;

pub use escalation::{EscalationRequest, RoleEscalationCoordinator, APPROVE, REJECT};
pub use events::{announce_result, ResultDeclared, ResultSubscriber};
pub use polls::{NewPoll, OptionTally, PollEngine, PollSettings, Tally, VoteOutcome};
pub use tally::{Decision, TallyRule};
