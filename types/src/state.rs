//! Closed status sets for every entity, and the transition functions that
//! move them.
//!
//! Each enum has a stable snake_case text form used by the relational store.
//! Transitions are explicit functions that reject invalid source states.

use crate::error::CoreError;
use crate::ids::{GroupId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(CoreError::Validation(format!(
                        concat!("unknown ", stringify!($name), ": {}"),
                        other
                    ))),
                }
            }
        }
    };
}

/// Outcome of applying a transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition<S> {
    /// The state moved to a new value.
    Changed(S),
    /// Already in the target state; nothing to do.
    Unchanged,
}

impl<S> Transition<S> {
    pub fn is_changed(&self) -> bool {
        matches!(self, Self::Changed(_))
    }
}

text_enum!(
    /// Account status of a user.
    UserStatus {
        Active => "active",
        Suspended => "suspended",
        Deleted => "deleted",
    }
);

text_enum!(
    GroupStatus {
        Active => "active",
        Suspended => "suspended",
        Dissolved => "dissolved",
    }
);

text_enum!(
    WalletKind {
        Personal => "personal",
        Group => "group",
    }
);

/// Who owns a wallet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum WalletOwner {
    User(UserId),
    Group(GroupId),
}

impl WalletOwner {
    pub fn kind(&self) -> WalletKind {
        match self {
            Self::User(_) => WalletKind::Personal,
            Self::Group(_) => WalletKind::Group,
        }
    }
}

text_enum!(
    /// Kind of an append-only ledger entry.
    TransactionKind {
        Contribution => "contribution",
        Transfer => "transfer",
        Withdrawal => "withdrawal",
        SharePurchase => "share_purchase",
        ShareTransfer => "share_transfer",
        DividendPurchase => "dividend_purchase",
    }
);

text_enum!(
    TransactionStatus {
        Pending => "pending",
        Completed => "completed",
        Failed => "failed",
    }
);

text_enum!(
    PollKind {
        General => "general",
        RoleEscalation => "role_escalation",
        FinancialDecision => "financial_decision",
        RuleChange => "rule_change",
        Membership => "membership",
    }
);

text_enum!(
    PollStatus {
        Active => "active",
        Completed => "completed",
        Cancelled => "cancelled",
    }
);

impl PollStatus {
    /// Seal an active poll once its result is declared.
    pub fn complete(self) -> Result<Self, CoreError> {
        match self {
            Self::Active => Ok(Self::Completed),
            Self::Completed | Self::Cancelled => Err(CoreError::PollSealed),
        }
    }

    pub fn cancel(self) -> Result<Self, CoreError> {
        match self {
            Self::Active => Ok(Self::Cancelled),
            Self::Completed | Self::Cancelled => Err(CoreError::PollSealed),
        }
    }
}

text_enum!(
    PollResult {
        Undeclared => "undeclared",
        Passed => "passed",
        Rejected => "rejected",
        Tied => "tied",
    }
);

impl PollResult {
    pub fn is_declared(&self) -> bool {
        !matches!(self, Self::Undeclared)
    }
}

text_enum!(
    EscalationStatus {
        Voting => "voting",
        Approved => "approved",
        Rejected => "rejected",
    }
);

impl EscalationStatus {
    /// Settle a request that is still being voted on.
    pub fn settle(self, approved: bool) -> Result<Self, CoreError> {
        match self {
            Self::Voting if approved => Ok(Self::Approved),
            Self::Voting => Ok(Self::Rejected),
            other => Err(CoreError::InvalidState(format!(
                "role escalation request already {other}"
            ))),
        }
    }
}

text_enum!(
    OfferingStatus {
        Active => "active",
        Exhausted => "exhausted",
        Cancelled => "cancelled",
    }
);

text_enum!(
    /// Class of shares held or offered.
    ShareKind {
        Ordinary => "ordinary",
        Preference => "preference",
        Dividend => "dividend",
    }
);

text_enum!(
    HoldingStatus {
        Active => "active",
        Transferred => "transferred",
        Cancelled => "cancelled",
    }
);

text_enum!(
    ShareTxKind {
        Purchase => "purchase",
        Transfer => "transfer",
        DividendIssue => "dividend_issue",
    }
);

text_enum!(
    DividendStatus {
        Draft => "draft",
        Approved => "approved",
        Paid => "paid",
    }
);

impl DividendStatus {
    pub fn approve(self) -> Result<Self, CoreError> {
        match self {
            Self::Draft => Ok(Self::Approved),
            other => Err(CoreError::InvalidState(format!(
                "cannot approve a dividend that is {other}"
            ))),
        }
    }

    pub fn mark_paid(self) -> Result<Self, CoreError> {
        match self {
            Self::Approved => Ok(Self::Paid),
            other => Err(CoreError::InvalidState(format!(
                "cannot pay a dividend that is {other}"
            ))),
        }
    }
}

text_enum!(
    MeetingKind {
        Virtual => "virtual",
        Hybrid => "hybrid",
        Physical => "physical",
    }
);

impl MeetingKind {
    /// Whether a conference room is allocated for this kind.
    pub fn needs_room(&self) -> bool {
        matches!(self, Self::Virtual | Self::Hybrid)
    }
}

text_enum!(
    MeetingStatus {
        Scheduled => "scheduled",
        Ready => "ready",
        Active => "active",
        Ended => "ended",
        Cancelled => "cancelled",
    }
);

impl MeetingStatus {
    /// `scheduled → ready`. Already-ready meetings are unchanged.
    pub fn mark_ready(self) -> Result<Transition<Self>, CoreError> {
        match self {
            Self::Scheduled => Ok(Transition::Changed(Self::Ready)),
            Self::Ready => Ok(Transition::Unchanged),
            other => Err(CoreError::InvalidState(format!(
                "meeting is {other}, cannot become ready"
            ))),
        }
    }

    /// `scheduled | ready → active`. Starting an active or ended meeting is a no-op.
    pub fn start(self) -> Result<Transition<Self>, CoreError> {
        match self {
            Self::Scheduled | Self::Ready => Ok(Transition::Changed(Self::Active)),
            Self::Active | Self::Ended => Ok(Transition::Unchanged),
            Self::Cancelled => Err(CoreError::MeetingCancelled),
        }
    }

    /// `active → ended`. Ending an ended meeting is a no-op.
    pub fn end(self) -> Result<Transition<Self>, CoreError> {
        match self {
            Self::Active => Ok(Transition::Changed(Self::Ended)),
            Self::Ended => Ok(Transition::Unchanged),
            Self::Cancelled => Err(CoreError::MeetingCancelled),
            other => Err(CoreError::InvalidState(format!(
                "meeting is {other}, only an active meeting can end"
            ))),
        }
    }

    /// `scheduled | ready → cancelled`.
    pub fn cancel(self) -> Result<Transition<Self>, CoreError> {
        match self {
            Self::Scheduled | Self::Ready => Ok(Transition::Changed(Self::Cancelled)),
            Self::Cancelled => Ok(Transition::Unchanged),
            Self::Active | Self::Ended => Err(CoreError::MeetingAlreadyEnded),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended | Self::Cancelled)
    }
}

text_enum!(
    AttendanceKind {
        Virtual => "virtual",
        InPerson => "in_person",
    }
);

text_enum!(
    PaymentMethod {
        Wallet => "wallet",
        Mpesa => "mpesa",
        BankTransfer => "bank_transfer",
        Cash => "cash",
    }
);

impl PaymentMethod {
    /// Whether the payment moves balances between wallets held in the core.
    /// Other methods settle with an external collaborator.
    pub fn settles_in_ledger(&self) -> bool {
        matches!(self, Self::Wallet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_forms_round_trip() {
        for kind in [
            TransactionKind::Contribution,
            TransactionKind::SharePurchase,
            TransactionKind::DividendPurchase,
        ] {
            assert_eq!(kind.as_str().parse::<TransactionKind>().unwrap(), kind);
        }
        assert_eq!("in_person".parse::<AttendanceKind>().unwrap(), AttendanceKind::InPerson);
        assert!("sideways".parse::<MeetingStatus>().is_err());
    }

    #[test]
    fn meeting_start_is_idempotent() {
        assert_eq!(
            MeetingStatus::Ready.start().unwrap(),
            Transition::Changed(MeetingStatus::Active)
        );
        assert_eq!(MeetingStatus::Active.start().unwrap(), Transition::Unchanged);
        assert_eq!(MeetingStatus::Ended.start().unwrap(), Transition::Unchanged);
        assert!(matches!(
            MeetingStatus::Cancelled.start(),
            Err(CoreError::MeetingCancelled)
        ));
    }

    #[test]
    fn meeting_end_only_from_active() {
        assert!(MeetingStatus::Active.end().unwrap().is_changed());
        assert_eq!(MeetingStatus::Ended.end().unwrap(), Transition::Unchanged);
        assert!(MeetingStatus::Scheduled.end().is_err());
    }

    #[test]
    fn meeting_cancel_rejects_started_meetings() {
        assert!(MeetingStatus::Ready.cancel().unwrap().is_changed());
        assert!(matches!(
            MeetingStatus::Active.cancel(),
            Err(CoreError::MeetingAlreadyEnded)
        ));
    }

    #[test]
    fn poll_status_seals_once() {
        assert_eq!(PollStatus::Active.complete().unwrap(), PollStatus::Completed);
        assert!(matches!(
            PollStatus::Completed.complete(),
            Err(CoreError::PollSealed)
        ));
    }

    #[test]
    fn dividend_lifecycle_is_ordered() {
        let approved = DividendStatus::Draft.approve().unwrap();
        assert_eq!(approved.mark_paid().unwrap(), DividendStatus::Paid);
        assert!(DividendStatus::Draft.mark_paid().is_err());
        assert!(DividendStatus::Paid.approve().is_err());
    }

    #[test]
    fn escalation_settles_once() {
        assert_eq!(
            EscalationStatus::Voting.settle(true).unwrap(),
            EscalationStatus::Approved
        );
        assert!(EscalationStatus::Rejected.settle(true).is_err());
    }
}
