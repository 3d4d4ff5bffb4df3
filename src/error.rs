use std::fmt;

/// Errors returned by [`Store`](crate::Store) operations.
///
/// Every failing call leaves the store untouched: the error is reported
/// before the view table, indexes, or subscribers see any change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// `insert` on an id that is already present.
    AlreadyExists { id: String },
    /// `update` or `delete` on an id that is not present.
    NotFound { id: String },
    /// `update` with an expected version that no longer matches.
    VersionConflict {
        id: String,
        expected: u64,
        actual: u64,
    },
    IndexAlreadyExists { name: String },
    IndexNotFound { name: String },
    ProjectionAlreadyExists { name: String },
    /// A projector asked for a delete but no target id could be resolved
    /// from the event.
    MissingTargetId {
        projection: String,
        event_type: String,
    },
    /// Serialization/deserialization error in the typed read model layer.
    Serde(String),
    LockPoisoned(&'static str),
    /// A subscriber callback tried to call back into the store it is
    /// being notified by.
    ReentrantAccess(&'static str),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::AlreadyExists { id } => write!(f, "view already exists: {}", id),
            StoreError::NotFound { id } => write!(f, "view not found: {}", id),
            StoreError::VersionConflict {
                id,
                expected,
                actual,
            } => write!(
                f,
                "version conflict on view {} (expected version {}, actual {})",
                id, expected, actual
            ),
            StoreError::IndexAlreadyExists { name } => {
                write!(f, "index already exists: {}", name)
            }
            StoreError::IndexNotFound { name } => write!(f, "index not found: {}", name),
            StoreError::ProjectionAlreadyExists { name } => {
                write!(f, "projection already exists: {}", name)
            }
            StoreError::MissingTargetId {
                projection,
                event_type,
            } => write!(
                f,
                "projection {} returned no view for {} event without a resolvable target id",
                projection, event_type
            ),
            StoreError::Serde(msg) => write!(f, "read model serialization error: {}", msg),
            StoreError::LockPoisoned(operation) => {
                write!(f, "store lock poisoned during {}", operation)
            }
            StoreError::ReentrantAccess(operation) => write!(
                f,
                "reentrant store access during {} from a subscriber callback",
                operation
            ),
        }
    }
}

impl std::error::Error for StoreError {}

pub type Result<T> = std::result::Result<T, StoreError>;
