use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Core(#[from] chama_types::CoreError),

    #[error("store error: {0}")]
    Store(#[from] chama_store::StoreError),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] chama_store_sqlite::SqliteError),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("logging error: {0}")]
    Logging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("background task failed: {0}")]
    Task(String),
}
