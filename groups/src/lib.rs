//! Identity and membership directory.
//!
//! Every engine asks this crate "is this user an active member of this group,
//! and in which role?" before touching group state. It also owns the admin
//! tooling that creates groups and moves users in and out of them, and the
//! notification sink that fans messages out to member devices.
//!
//! Role changes are not made here; they come from role escalation polls.

pub mod admin;
pub mod contact;
pub mod directory;
pub mod notify;

pub use admin::{GroupAdmin, NewUser};
pub use directory::{
    active_member_count, list_members, require_role, resolve_membership, MemberEntry, Membership,
    MembershipDirectory,
};
pub use notify::{notify_best_effort, LogNotifier, Notification, NotificationSink, NotifyError, WebhookNotifier};
