// models/src/errors.rs

use std::io;
pub use thiserror::Error;
use uuid::Error as UuidError;
use anyhow::Error as AnyhowError;
use tokio::task::JoinError;

#[derive(Debug, Error)]
pub enum HospitalError {
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Deserialization error: {0}")]
    DeserializationError(String),
    #[error("Invalid query: {0}")]
    QueryError(String),
    /// The store refused a query because no composite index covers it.
    /// Callers treat this as a signal to degrade, not as a failure.
    #[error("The query requires an index: {0}")]
    MissingIndex(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("{collection} document '{id}' was not found")]
    NotFound { collection: String, id: String },
    #[error("Entity already exists: {0}")]
    AlreadyExists(String),
    #[error("Operation conflicts with existing data: {0}")]
    Conflict(String),
    #[error("Invalid data provided: {0}")]
    InvalidData(String),

    #[error("Authentication required: {0}")]
    Unauthenticated(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Export failed: {0}")]
    ExportError(String),
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("An internal error occurred: {0}")]
    InternalError(String),

    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[cfg(feature = "sled-errors")]
    #[error(transparent)]
    Sled(#[from] sled::Error),
    #[error("UUID parsing or generation error: {0}")]
    Uuid(#[from] UuidError),
}

impl HospitalError {
    pub fn not_found(collection: impl Into<String>, id: impl Into<String>) -> Self {
        HospitalError::NotFound { collection: collection.into(), id: id.into() }
    }

    /// True for the errors a caller may answer by falling back to a simpler query.
    pub fn is_missing_index(&self) -> bool {
        matches!(self, HospitalError::MissingIndex(_))
    }
}

impl From<serde_json::Error> for HospitalError {
    fn from(err: serde_json::Error) -> Self {
        HospitalError::SerializationError(format!("JSON processing error: {}", err))
    }
}

impl From<rmp_serde::encode::Error> for HospitalError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        HospitalError::SerializationError(format!("MessagePack encode error: {}", err))
    }
}

impl From<rmp_serde::decode::Error> for HospitalError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        HospitalError::DeserializationError(format!("MessagePack decode error: {}", err))
    }
}

impl From<AnyhowError> for HospitalError {
    fn from(err: AnyhowError) -> Self {
        HospitalError::InternalError(format!("{:#}", err))
    }
}

impl From<JoinError> for HospitalError {
    fn from(err: JoinError) -> Self {
        HospitalError::InternalError(format!("Task failed to join: {:?}", err))
    }
}

/// A validation error raised before anything is written.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// A required text field was empty or too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: &'static str, min: usize },
    #[error("'{0}' is not a valid e-mail address")]
    InvalidEmail(String),
    #[error("age must be a non-negative number")]
    InvalidAge,
    #[error("unknown appointment status '{0}'")]
    InvalidStatus(String),
    #[error("unknown gender '{0}'")]
    InvalidGender(String),
    #[error("unknown role '{0}'")]
    InvalidRole(String),
    #[error("invalid date format: {0}")]
    InvalidDateFormat(String),
    /// A prescription needs at least one medicine with a name.
    #[error("at least one medicine is required")]
    NoMedicines,
    #[error("{0} must be selected")]
    MissingSelection(&'static str),
}

/// A type alias for a `Result` that returns a `HospitalError` on failure.
pub type HospitalResult<T> = Result<T, HospitalError>;

/// A type alias for a `Result` that returns a `ValidationError` on failure.
pub type ValidationResult<T> = Result<T, ValidationError>;
