use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::models::{BookingOutcome, BookingStage, SchemaViolation};

/// Failures of a single elicitation round trip on the transport side.
#[derive(Debug, thiserror::Error)]
pub enum ElicitError {
    #[error("client disconnected while awaiting a reply")]
    Disconnected,

    #[error("session is closed")]
    Closed,
}

/// Faults inside the booking workflow. Never leaves the workflow boundary:
/// every variant converts into a [`BookingOutcome`].
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("client disconnected during {} input", .stage.as_str())]
    Disconnected { stage: BookingStage },

    #[error("{0}")]
    Internal(String),
}

impl From<BookingError> for BookingOutcome {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::Disconnected { .. } => BookingOutcome::Disconnected,
            BookingError::Internal(detail) => BookingOutcome::Failed(detail),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("schema violation: {0}")]
    SchemaViolation(#[from] SchemaViolation),

    #[error("gone: {0}")]
    Gone(String),

    #[error("bad request: {0}")]
    BadRequest(String),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::SchemaViolation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Gone(_) => StatusCode::GONE,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        };

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
