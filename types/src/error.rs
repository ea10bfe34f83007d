//! Error taxonomy shared by every engine.
//!
//! Each [`CoreError`] belongs to exactly one [`ErrorKind`], has a stable
//! `code()`, and a `public_message()` safe to hand to end users. Internal
//! failures are logged with a correlation id; only that id leaves the core.

use thiserror::Error;
use uuid::Uuid;

/// Coarse classification used by the outer API to pick a response status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed input.
    Validation,
    /// Caller is not allowed to do this (403-equivalent).
    AuthZ,
    /// Missing entity (404-equivalent).
    NotFound,
    /// Operation conflicts with current state (409-equivalent). Never retried automatically.
    StateConflict,
    /// A collaborator or deadline failed; the caller may retry.
    UpstreamUnavailable,
    /// Unexpected failure.
    Internal,
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("user {user} is not an active member of group {group}")]
    NotAMember { user: String, group: String },

    #[error("role {actual} cannot {action}")]
    InsufficientRole { actual: String, action: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("poll is sealed; no further votes accepted")]
    PollSealed,

    #[error("voter has already voted on this poll")]
    AlreadyVoted,

    #[error("meeting has already ended")]
    MeetingAlreadyEnded,

    #[error("meeting was cancelled")]
    MeetingCancelled,

    #[error("share offering is exhausted")]
    OfferingExhausted,

    #[error("insufficient shares: requested {requested}, available {available}")]
    InsufficientShares { requested: u64, available: u64 },

    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: u64, available: u64 },

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("conflicting concurrent update: {0}")]
    Conflict(String),

    #[error("request deadline exceeded")]
    DeadlineExceeded,

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("internal error (correlation id {correlation_id})")]
    Internal { correlation_id: String },
}

impl CoreError {
    /// Build an internal error, logging the detail under a fresh correlation id.
    pub fn internal(detail: impl std::fmt::Display) -> Self {
        let correlation_id = Uuid::new_v4().to_string();
        tracing::error!(%correlation_id, error = %detail, "internal error");
        Self::Internal { correlation_id }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::AccessDenied(_) | Self::NotAMember { .. } | Self::InsufficientRole { .. } => {
                ErrorKind::AuthZ
            }
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::PollSealed
            | Self::AlreadyVoted
            | Self::MeetingAlreadyEnded
            | Self::MeetingCancelled
            | Self::OfferingExhausted
            | Self::InsufficientShares { .. }
            | Self::InsufficientFunds { .. }
            | Self::InvalidState(_)
            | Self::Conflict(_) => ErrorKind::StateConflict,
            Self::DeadlineExceeded | Self::UpstreamUnavailable(_) => {
                ErrorKind::UpstreamUnavailable
            }
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::AccessDenied(_) => "access_denied",
            Self::NotAMember { .. } => "not_a_member",
            Self::InsufficientRole { .. } => "insufficient_role",
            Self::NotFound { .. } => "not_found",
            Self::PollSealed => "poll_sealed",
            Self::AlreadyVoted => "already_voted",
            Self::MeetingAlreadyEnded => "meeting_already_ended",
            Self::MeetingCancelled => "meeting_cancelled",
            Self::OfferingExhausted => "offering_exhausted",
            Self::InsufficientShares { .. } => "insufficient_shares",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::InvalidState(_) => "invalid_state",
            Self::Conflict(_) => "conflict",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
            Self::Internal { .. } => "internal",
        }
    }

    /// Message safe to show an end user. Upstream and internal detail is withheld.
    pub fn public_message(&self) -> String {
        match self {
            Self::UpstreamUnavailable(_) => {
                "a dependent service is unavailable, please retry".to_string()
            }
            Self::Conflict(_) => "the request conflicted with another update".to_string(),
            other => other.to_string(),
        }
    }

    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::UpstreamUnavailable
    }
}
