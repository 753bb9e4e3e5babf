//! Caller-facing errors. These are raised synchronously before anything is
//! recorded or enqueued and are never retried.

use thiserror::Error;

use crate::ids::{EndpointId, UserId, YoId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Two content fields were supplied that cannot be combined
    #[error("Can't send {0} and {1} in the same Yo")]
    InvalidContent(&'static str, &'static str),

    #[error("A Yo needs a recipient, a group or the broadcast flag")]
    MissingRecipient,

    #[error("A Yo can't be rendered without a sender")]
    MissingSender,

    #[error("{0} is not allowed to send")]
    PermissionDenied(UserId),

    #[error("Unknown user {0}")]
    UnknownUser(UserId),

    #[error("Unknown yo {0}")]
    UnknownYo(YoId),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status code surfaced to the caller
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::InvalidContent(..) | Self::MissingRecipient | Self::MissingSender => 400,
            Self::PermissionDenied(_) => 403,
            Self::UnknownUser(_) | Self::UnknownYo(_) => 404,
            Self::Internal(_) => 500,
        }
    }

    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }
}

/// Failures reported by a [`Directory`](crate::traits::Directory)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    #[error("Unknown user {0}")]
    UnknownUser(UserId),

    #[error("Unknown endpoint {0}")]
    UnknownEndpoint(EndpointId),

    #[error("Directory unavailable: {0}")]
    Unavailable(String),
}

impl From<DirectoryError> for ApiError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::UnknownUser(id) => Self::UnknownUser(id),
            other => Self::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::InvalidContent("link", "location").status_code(), 400);
        assert_eq!(ApiError::MissingSender.status_code(), 400);
        assert_eq!(ApiError::PermissionDenied(UserId::generate()).status_code(), 403);
        assert_eq!(ApiError::UnknownUser(UserId::generate()).status_code(), 404);
        assert_eq!(ApiError::Internal("store".into()).status_code(), 500);
        assert!(!ApiError::Internal("store".into()).is_client_error());
    }

    #[test]
    fn test_directory_errors_map_to_api_errors() {
        let user = UserId::generate();
        assert_eq!(
            ApiError::from(DirectoryError::UnknownUser(user)),
            ApiError::UnknownUser(user)
        );
        assert_eq!(
            ApiError::from(DirectoryError::Unavailable("timeout".into())).status_code(),
            500
        );
    }

    #[test]
    fn test_invalid_content_message() {
        assert_eq!(
            ApiError::InvalidContent("cover", "photo").to_string(),
            "Can't send cover and photo in the same Yo"
        );
    }
}
