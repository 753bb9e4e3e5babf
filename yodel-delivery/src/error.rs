//! Typed error handling for delivery jobs.
//!
//! - Permanent failures are never retried
//! - Temporary failures are retried with backoff by the job's lane
//! - System errors are internal problems and are not retried either

use thiserror::Error;
use yodel_common::{ApiError, DirectoryError, UserId, YoId};
use yodel_payload::RenderError;
use yodel_store::StoreError;

use crate::transport::{REMOVE_ON_FAILURE, TransportError};

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Permanent failure: {0}")]
    Permanent(#[from] PermanentError),

    #[error("Temporary failure: {0}")]
    Temporary(#[from] TemporaryError),

    #[error("System error: {0}")]
    System(#[from] SystemError),
}

#[derive(Debug, Error)]
pub enum PermanentError {
    /// The broker reported the endpoint as gone, and it has been disabled
    #[error("Target disabled by the broker: {0}")]
    TargetDisabled(String),

    /// The transport refused the request outright
    #[error("Rejected: {0}")]
    Rejected(String),

    #[error("{0} has no reachable endpoint or phone number")]
    Unreachable(UserId),

    #[error("Yo can't be delivered: {0}")]
    InvalidYo(#[from] ApiError),

    #[error("Unknown user or endpoint: {0}")]
    UnknownTarget(String),
}

#[derive(Debug, Error)]
pub enum TemporaryError {
    #[error("Transport unavailable: {0}")]
    Unavailable(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Upstream returned HTTP {0}")]
    UpstreamStatus(u16),

    #[error("Directory unavailable: {0}")]
    Directory(String),
}

#[derive(Debug, Error)]
pub enum SystemError {
    #[error("Yo not found: {0}")]
    YoNotFound(YoId),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Job queue is closed")]
    QueueClosed,

    #[error("Job queue is already being served")]
    AlreadyServing,

    #[error("Task failed: {0}")]
    Task(String),
}

impl DeliveryError {
    #[must_use]
    pub const fn is_temporary(&self) -> bool {
        matches!(self, Self::Temporary(_))
    }

    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent(_))
    }

    #[must_use]
    pub const fn is_system(&self) -> bool {
        matches!(self, Self::System(_))
    }

    /// Short label used as a metrics attribute
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Permanent(_) => "permanent",
            Self::Temporary(TemporaryError::Timeout(_)) => "timeout",
            Self::Temporary(_) => "temporary",
            Self::System(_) => "system",
        }
    }
}

impl From<StoreError> for DeliveryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::System(SystemError::YoNotFound(id)),
            other => Self::System(SystemError::Store(other.to_string())),
        }
    }
}

impl From<DirectoryError> for DeliveryError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::Unavailable(msg) => Self::Temporary(TemporaryError::Directory(msg)),
            other => Self::Permanent(PermanentError::UnknownTarget(other.to_string())),
        }
    }
}

impl From<ApiError> for DeliveryError {
    fn from(err: ApiError) -> Self {
        Self::Permanent(PermanentError::InvalidYo(err))
    }
}

/// Broker rejections are only permanent for the remove-on-failure codes,
/// everything else is worth another attempt.
impl From<TransportError> for DeliveryError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Rejected { code, .. } if REMOVE_ON_FAILURE.contains(&code.as_str()) => {
                Self::Permanent(PermanentError::TargetDisabled(code))
            }
            TransportError::Rejected { code, message } => {
                Self::Temporary(TemporaryError::Unavailable(format!("{code}: {message}")))
            }
            TransportError::Unavailable(msg) => Self::Temporary(TemporaryError::Unavailable(msg)),
            TransportError::Timeout(msg) => Self::Temporary(TemporaryError::Timeout(msg)),
            TransportError::Status(status) if (400..500).contains(&status) && status != 429 => {
                Self::Permanent(PermanentError::Rejected(format!("HTTP {status}")))
            }
            TransportError::Status(status) => {
                Self::Temporary(TemporaryError::UpstreamStatus(status))
            }
        }
    }
}
