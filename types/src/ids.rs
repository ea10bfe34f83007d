//! Entity identifiers.
//!
//! Every entity is keyed by a random (v4) UUID wrapped in its own newtype so
//! that a poll id can never be passed where a meeting id is expected.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Parse the hyphenated textual form.
            pub fn parse(s: &str) -> Result<Self, CoreError> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|_| CoreError::Validation(format!("invalid {} id: {s}", $label)))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

define_id!(
    /// A registered user.
    UserId, "user"
);
define_id!(
    /// A chama (cooperative savings group).
    GroupId, "group"
);
define_id!(
    /// A personal or group wallet.
    WalletId, "wallet"
);
define_id!(
    /// An append-only ledger entry.
    TransactionId, "transaction"
);
define_id!(PollId, "poll");
define_id!(EscalationId, "role escalation request");
define_id!(RoleChangeId, "role change");
define_id!(OfferingId, "share offering");
define_id!(HoldingId, "share holding");
define_id!(ShareTxId, "share transaction");
define_id!(DividendId, "dividend declaration");
define_id!(MeetingId, "meeting");
