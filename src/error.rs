use bson::oid::ObjectId;
use thiserror::Error;

/// Field-level rejection of review input.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),
    #[error("field '{field}' is not a valid object id: '{value}'")]
    MalformedId { field: &'static str, value: String },
    #[error("rating must be a number")]
    RatingNotNumeric,
    #[error("rating must be between 1 and 5, got {0}")]
    RatingOutOfRange(f64),
    #[error("update carries neither a rating nor a comment")]
    EmptyUpdate,
}

/// Failure reported by the review store.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("review {0} does not exist")]
    NotFound(ObjectId),
    #[error("stored review '{id}' is unreadable: {reason}")]
    CorruptRecord { id: String, reason: String },
}

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("configuration error: {0}")]
    Configuration(String),
}
