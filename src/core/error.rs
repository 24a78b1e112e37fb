//! Error types shared by the stores and the storage layer.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while reading or writing the key-value store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Key contains characters that cannot be mapped to a storage slot.
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored value is not valid JSON for the requested type.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures of a store action.
///
/// The `Display` text is what ends up in a store's `error` field, so it is
/// written for the person looking at the screen.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Referenced entity does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Required input missing.
    #[error("{0} is required")]
    Required(&'static str),

    /// NaN or infinite number; JSON cannot represent it.
    #[error("{0} must be a finite number")]
    NotFinite(&'static str),

    /// Unrecognized methodology key.
    #[error("Invalid workflow type")]
    InvalidWorkflow(String),

    /// Phase id outside the active methodology.
    #[error("Invalid phase")]
    InvalidPhase(String),

    /// Gating checks refused the phase transition.
    #[error("Cannot advance to next phase. Requirements not met.")]
    RequirementsNotMet,

    /// No phase after the current one.
    #[error("Already at final phase")]
    FinalPhase,

    /// Persistence failed.
    #[error("{context}")]
    Storage {
        context: &'static str,
        #[source]
        source: StorageError,
    },
}

impl StoreError {
    /// Wrap a storage error with the message shown to the user.
    pub fn storage(context: &'static str, source: StorageError) -> Self {
        Self::Storage { context, source }
    }
}
