use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{error, warn};

use crate::response::ErrorBody;

/// Every failure a handler can surface. The message is user-visible.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Message plus every individual input problem found.
    #[error("{0}")]
    BadRequest(String, Vec<String>),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    InsufficientCredit(String),
    #[error("{0}")]
    PayloadTooLarge(String),
    #[error("{0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into(), Vec::new())
    }

    /// Bad request listing every failed check. The first one becomes the message.
    pub fn invalid(errors: Vec<String>) -> Self {
        let message = errors
            .first()
            .cloned()
            .unwrap_or_else(|| "Invalid request".into());
        Self::BadRequest(message, errors)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn insufficient_credit() -> Self {
        Self::InsufficientCredit("Insufficient credits".into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Maps an extractor rejection onto the envelope. Oversized bodies keep 413,
    /// everything else is a bad request.
    fn rejected(status: StatusCode, text: String) -> Self {
        warn!(%status, reason = %text, "request rejected");
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge("Request body is too large".into())
        } else {
            Self::bad_request(text)
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(..) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InsufficientCredit(_) => StatusCode::PAYMENT_REQUIRED,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest(m, _)
            | Self::Unauthorized(m)
            | Self::NotFound(m)
            | Self::InsufficientCredit(m)
            | Self::PayloadTooLarge(m)
            | Self::Internal(m) => m.as_str(),
        }
    }

    pub fn errors(&self) -> &[String] {
        match self {
            Self::BadRequest(_, errors) => errors,
            _ => &[],
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::rejected(rejection.status(), rejection.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::rejected(rejection.status(), rejection.body_text())
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        Self::rejected(err.status(), err.body_text())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(format!("{err:#}"))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::internal(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::internal(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        let body = ErrorBody {
            status_code: status.as_u16(),
            data: None,
            message: self.message().to_string(),
            success: false,
            errors: self.errors().to_vec(),
        };
        (status, Json(body)).into_response()
    }
}

/// Fallback for unmatched routes, rendered with the error envelope.
pub async fn not_found_fallback() -> AppError {
    AppError::not_found("Route not found")
}
