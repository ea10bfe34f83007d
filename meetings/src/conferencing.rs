//! The conferencing SFU collaborator.

use std::time::Duration;

use async_trait::async_trait;
use chama_types::{CoreError, Timestamp};
use thiserror::Error;

use crate::capabilities::Capabilities;

/// What a participant token binds: identity, room and capabilities.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenGrant {
    pub room: String,
    pub identity: String,
    pub display_name: Option<String>,
    pub capabilities: Capabilities,
    /// Start of validity, read from the caller's clock.
    pub issued_at: Timestamp,
    pub ttl: Duration,
}

impl TokenGrant {
    pub fn expires_at(&self) -> Timestamp {
        self.issued_at.plus_secs(self.ttl.as_secs())
    }
}

#[derive(Debug, Error)]
pub enum ConferencingError {
    #[error("conferencing call timed out after {0:?}")]
    Timeout(Duration),

    #[error("conferencing service unreachable: {0}")]
    Unreachable(String),

    #[error("conferencing service rejected the request: HTTP {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("invalid response from conferencing service: {0}")]
    InvalidResponse(String),

    #[error("token signing failed: {0}")]
    Token(String),
}

impl From<ConferencingError> for CoreError {
    fn from(e: ConferencingError) -> Self {
        CoreError::UpstreamUnavailable(e.to_string())
    }
}

/// Remote room management plus token minting. Every call may fail or time
/// out; callers bound each call by their own deadline.
#[async_trait]
pub trait ConferencingClient: Send + Sync {
    /// Reserve a room and return the service's room id.
    async fn create_room(&self, name: &str, max_participants: u32) -> Result<String, ConferencingError>;

    async fn delete_room(&self, name: &str) -> Result<(), ConferencingError>;

    /// Mint a bearer credential for `grant`.
    async fn mint_token(&self, grant: &TokenGrant) -> Result<String, ConferencingError>;
}
