use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::StoreError;
use crate::models::UnknownVariant;

#[derive(Debug, Error)]
pub enum LocatorError {
    #[error("invalid coordinates: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinate { latitude: f64, longitude: f64 },

    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("cannot send a friend request to yourself")]
    SelfReference,

    #[error("already friends with this user")]
    AlreadyFriends,

    #[error("a pending friend request already exists between these users")]
    DuplicateRequest,

    #[error("atomic update rolled back: {0}")]
    Consistency(String),

    #[error("store failure: {0}")]
    Store(StoreError),
}

pub type LocatorResult<T> = Result<T, LocatorError>;

impl From<StoreError> for LocatorError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Consistency(detail) => LocatorError::Consistency(detail),
            other => LocatorError::Store(other),
        }
    }
}

impl From<UnknownVariant> for LocatorError {
    fn from(err: UnknownVariant) -> Self {
        LocatorError::InvalidArgument(err.to_string())
    }
}

impl LocatorError {
    pub fn status(&self) -> StatusCode {
        match self {
            LocatorError::InvalidCoordinate { .. }
            | LocatorError::InvalidArgument(_)
            | LocatorError::SelfReference => StatusCode::BAD_REQUEST,
            LocatorError::NotFound(_) => StatusCode::NOT_FOUND,
            LocatorError::AlreadyFriends | LocatorError::DuplicateRequest => StatusCode::CONFLICT,
            LocatorError::Consistency(_) | LocatorError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable reason.
    pub fn code(&self) -> &'static str {
        match self {
            LocatorError::InvalidCoordinate { .. } => "invalid_coordinate",
            LocatorError::InvalidArgument(_) => "invalid_argument",
            LocatorError::NotFound(_) => "not_found",
            LocatorError::SelfReference => "self_reference",
            LocatorError::AlreadyFriends => "already_friends",
            LocatorError::DuplicateRequest => "duplicate_request",
            LocatorError::Consistency(_) | LocatorError::Store(_) => "internal_error",
        }
    }

    pub fn is_domain(&self) -> bool {
        !matches!(self, LocatorError::Consistency(_) | LocatorError::Store(_))
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
}

impl IntoResponse for LocatorError {
    fn into_response(self) -> Response {
        let message = if self.is_domain() {
            self.to_string()
        } else {
            tracing::error!("Request failed: {}", self);
            "Internal server error".to_string()
        };

        let body = Json(ErrorBody {
            error: message,
            code: self.code(),
        });
        (self.status(), body).into_response()
    }
}
