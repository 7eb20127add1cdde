//! Error types for catsnap-web
//!
//! Handlers work with [`ApiError`]; formatted routes turn it into an
//! [`Abort`], which renders in the request's format.

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::format::RequestFormat;
use crate::lifecycle::{LifecycleError, SessionError};
use crate::views;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Conflict (409), e.g. duplicate album name
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// catsnap-common error
    #[error(transparent)]
    Common(#[from] catsnap_common::Error),

    /// Request transaction could not be opened
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Request teardown failed
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Common(catsnap_common::Error::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Common(catsnap_common::Error::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            ApiError::Session(e) if e.is_unavailable() => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Render in `format`
    pub fn in_format(self, format: RequestFormat) -> Abort {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }
        abort(format, status, self.to_string())
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Common(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.in_format(RequestFormat::Json).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

/// An error response in a specific format
#[derive(Debug)]
pub struct Abort {
    pub format: RequestFormat,
    pub status: StatusCode,
    pub message: String,
}

/// Stop handling the request with `status`
pub fn abort(format: RequestFormat, status: StatusCode, message: impl Into<String>) -> Abort {
    Abort {
        format,
        status,
        message: message.into(),
    }
}

impl IntoResponse for Abort {
    fn into_response(self) -> Response {
        match self.format {
            RequestFormat::Json => {
                (self.status, Json(json!({ "error": self.message }))).into_response()
            }
            RequestFormat::Html => {
                (self.status, Html(views::error_page(self.status, &self.message))).into_response()
            }
        }
    }
}

/// `result.in_format(format)?` inside formatted handlers
pub trait InFormat<T> {
    fn in_format(self, format: RequestFormat) -> Result<T, Abort>;
}

impl<T, E> InFormat<T> for Result<T, E>
where
    E: Into<ApiError>,
{
    fn in_format(self, format: RequestFormat) -> Result<T, Abort> {
        self.map_err(|e| e.into().in_format(format))
    }
}
