use chama_types::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("duplicate key: {0}")]
    Duplicate(String),

    #[error("insufficient funds in wallet {wallet}: need {needed}, have {available}")]
    InsufficientFunds {
        wallet: String,
        needed: u64,
        available: u64,
    },

    #[error("insufficient shares: requested {requested}, remaining {available}")]
    InsufficientShares { requested: u64, available: u64 },

    /// Concurrent mutation collision. Safe to retry the whole transaction.
    #[error("serialization conflict: {0}")]
    Conflict(String),

    #[error("integrity constraint violated: {0}")]
    Constraint(String),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("database is corrupted: {0}")]
    Corruption(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<StoreError> for CoreError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { entity, id } => CoreError::NotFound { entity, id },
            StoreError::InsufficientFunds {
                needed, available, ..
            } => CoreError::InsufficientFunds { needed, available },
            StoreError::InsufficientShares {
                requested,
                available,
            } => CoreError::InsufficientShares {
                requested,
                available,
            },
            StoreError::Conflict(detail) => CoreError::Conflict(detail),
            // Keys and constraint text name tables and columns; they stay in the log.
            StoreError::Duplicate(key) => {
                tracing::warn!(key = %key, "duplicate key rejected by store");
                CoreError::InvalidState("the record already exists".into())
            }
            StoreError::Constraint(detail) => {
                tracing::warn!(detail = %detail, "store constraint rejected change");
                CoreError::InvalidState("the change conflicts with stored data".into())
            }
            other @ (StoreError::Backend(_)
            | StoreError::Serialization(_)
            | StoreError::Corruption(_)) => CoreError::internal(other),
        }
    }
}
