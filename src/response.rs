use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::services::mastery::MasteryError;
use crate::services::selector::SelectorError;
use crate::services::sessions::SessionError;

#[derive(Debug, Serialize)]
pub struct SuccessResponse<T> {
    pub success: bool,
    pub data: T,
}

pub fn success<T: Serialize>(data: T) -> Json<SuccessResponse<T>> {
    Json(SuccessResponse {
        success: true,
        data,
    })
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: String,
}

#[derive(Debug, Clone)]
pub struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl AppError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn conflict(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, code, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, "STORE_ERROR", message)
    }

    fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            success: false,
            error: self.message,
            code: self.code,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NoActiveSession => Self::conflict("NO_ACTIVE_SESSION", err.to_string()),
            SessionError::NoPendingQuestion => {
                Self::conflict("NO_PENDING_QUESTION", err.to_string())
            }
            SessionError::InvalidTargetCount => Self::bad_request(err.to_string()),
            SessionError::Store(inner) => Self::store_unavailable(inner.to_string()),
        }
    }
}

impl From<MasteryError> for AppError {
    fn from(err: MasteryError) -> Self {
        match err {
            MasteryError::Store(inner) => Self::store_unavailable(inner.to_string()),
        }
    }
}

impl From<SelectorError> for AppError {
    fn from(err: SelectorError) -> Self {
        match err {
            SelectorError::Mastery(inner) => inner.into(),
            SelectorError::Catalog(message) => Self::store_unavailable(message),
        }
    }
}
