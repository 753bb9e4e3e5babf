use thiserror::Error;
use yodel_common::ApiError;
use yodel_store::StoreError;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("No handler for job type {0}")]
    UnknownJobType(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Send refused: {0}")]
    Api(#[from] ApiError),

    #[error("{0} is not a scheduled item")]
    NotScheduled(String),
}
