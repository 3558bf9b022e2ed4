use crate::models::TaskStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("Migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error")]
    Io(#[from] std::io::Error),

    #[error("Serialization error")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid recurrence rule: {0}")]
    InvalidRule(String),

    #[error("Unknown override field: '{0}'")]
    UnknownField(String),

    #[error("Cannot change status from {from} to {to}: {reason}")]
    InvalidTransition {
        from: TaskStatus,
        to: TaskStatus,
        reason: String,
    },

    /// The override was applied to the local cache but the backing store
    /// rejected the write. Retry through the store to persist it.
    #[error("Override {key} saved locally but not persisted")]
    PersistenceDeferred {
        key: String,
        #[source]
        source: Box<CoreError>,
    },

    #[error("Ambiguous short ID. Did you mean one of these?")]
    AmbiguousId(Vec<(String, String)>), // Vec of (ID, Title)

    #[error("Storage backend unavailable: {0}")]
    Unavailable(String),
}

impl CoreError {
    /// True when local state already advanced and the caller may retry the
    /// persistence write without losing the change.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CoreError::PersistenceDeferred { .. })
    }
}
