//! Error modeling for backend calls and controller handlers.

use shared::error::ApiError;
use thiserror::Error;

use crate::controller::Panel;

/// Form field an inline validation message is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Username,
    Password,
    Confirmation,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub field: Field,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: Field, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend answered and refused the operation.
    #[error("{0}")]
    Rejected(String),
    #[error("session is no longer valid")]
    Unauthorized,
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response: {0}")]
    Malformed(String),
    #[error("{0} is not supported by this backend")]
    Unsupported(&'static str),
}

impl From<ApiError> for BackendError {
    fn from(value: ApiError) -> Self {
        Self::Rejected(value.message)
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Registration or login failed; the message is what the alert shows.
    #[error("{0}")]
    Auth(String),
    #[error("{0}")]
    Game(String),
    #[error("no active session")]
    NoSession,
    #[error("cannot switch from {from:?} to {to:?}")]
    InvalidTransition { from: Panel, to: Panel },
    #[error("{0} is not available with this backend")]
    Unsupported(&'static str),
}
