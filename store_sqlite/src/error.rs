use chama_store::StoreError;
use rusqlite::ffi;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SqliteError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("connection lock poisoned")]
    Poisoned,
}

impl From<SqliteError> for StoreError {
    fn from(e: SqliteError) -> Self {
        match e {
            SqliteError::Sqlite(rusqlite::Error::SqliteFailure(err, msg)) => {
                let detail = msg.unwrap_or_else(|| err.to_string());
                match err.code {
                    ffi::ErrorCode::DatabaseBusy | ffi::ErrorCode::DatabaseLocked => {
                        StoreError::Conflict(detail)
                    }
                    ffi::ErrorCode::ConstraintViolation => match err.extended_code {
                        ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                            StoreError::Duplicate(detail)
                        }
                        _ => StoreError::Constraint(detail),
                    },
                    ffi::ErrorCode::DatabaseCorrupt | ffi::ErrorCode::NotADatabase => {
                        StoreError::Corruption(detail)
                    }
                    _ => StoreError::Backend(detail),
                }
            }
            SqliteError::Sqlite(rusqlite::Error::FromSqlConversionFailure(_, _, err)) => {
                StoreError::Serialization(err.to_string())
            }
            SqliteError::Schema(detail) => StoreError::Corruption(detail),
            other => StoreError::Backend(other.to_string()),
        }
    }
}

/// Shorthand for lifting `rusqlite` results into store results.
pub(crate) trait SqlResultExt<T> {
    fn db(self) -> Result<T, StoreError>;
}

impl<T> SqlResultExt<T> for rusqlite::Result<T> {
    fn db(self) -> Result<T, StoreError> {
        self.map_err(|e| SqliteError::from(e).into())
    }
}
