use thiserror::Error;
use uuid::Uuid;

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

/// Failure taxonomy for the messaging core. Nothing here is retried
/// internally: a multi-step mutation either fully commits or rolls back and
/// surfaces `TransactionFailure`; retry decisions belong to the caller.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("user {user} is not a participant of message {message}")]
    PermissionDenied { user: Uuid, message: Uuid },

    /// Parent chain walked past the depth bound without reaching a root.
    /// Guards against corrupted parent references, not legitimate depth.
    #[error("parent chain of message {message} did not terminate within {max_depth} hops")]
    ThreadCycleDetected { message: Uuid, max_depth: u32 },

    #[error("transaction aborted")]
    TransactionFailure(#[from] rusqlite::Error),

    #[error("validation failed: {0}")]
    Validation(&'static str),

    #[error("database lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    pub fn message_not_found(id: Uuid) -> Self {
        StoreError::NotFound { entity: "message", id }
    }

    pub fn user_not_found(id: Uuid) -> Self {
        StoreError::NotFound { entity: "user", id }
    }

    pub fn notification_not_found(id: Uuid) -> Self {
        StoreError::NotFound { entity: "notification", id }
    }
}
