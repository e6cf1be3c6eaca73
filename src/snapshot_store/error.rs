use thiserror::Error;

/// Storage-level failure. Always propagated to the caller.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Schema error: {0:#}")]
    Schema(#[from] anyhow::Error),

    #[error("Corrupt stored data: {0}")]
    Corrupt(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Snapshot store lock poisoned")]
    LockPoisoned,
}
