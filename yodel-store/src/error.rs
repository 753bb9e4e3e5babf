use thiserror::Error;
use yodel_common::{ApiError, PayloadType, YoId};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Yo not found: {0}")]
    NotFound(YoId),

    #[error("Yo already exists: {0}")]
    AlreadyExists(YoId),

    /// More than one `is_default` header for the same `(type, group)` key
    #[error("Duplicate default header for ({0}, group={1})")]
    DuplicateDefaultHeader(PayloadType, bool),

    /// Lock poisoning and similar
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Self::Internal(format!("Lock poisoned: {e}"))
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::UnknownYo(id),
            other => Self::Internal(other.to_string()),
        }
    }
}
