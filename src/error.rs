use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// A single failed field check, rendered inline by the client.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Email already registered")]
    DuplicateAccount,
    #[error("No account found for this email")]
    NoSuchAccount,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Validation failed")]
    Validation(Vec<FieldError>),
    #[error("Upstream request failed with status {status}")]
    ExternalService { status: u16, details: String },
    #[error("Not found")]
    NotFound,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// A failed status poll. Swallowed by the poller and retried on the next
/// tick; never turned into an HTTP response.
#[derive(Debug, Error)]
#[error("Status poll failed: {0}")]
pub struct TransientPollError(#[from] pub anyhow::Error);

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<Vec<FieldError>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, details, fields) = match &self {
            ApiError::DuplicateAccount => (StatusCode::CONFLICT, None, None),
            ApiError::NoSuchAccount => (StatusCode::NOT_FOUND, None, None),
            ApiError::InvalidCredentials => (StatusCode::UNAUTHORIZED, None, None),
            ApiError::Validation(fields) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                None,
                Some(fields.clone()),
            ),
            ApiError::ExternalService { status, details } => (
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
                Some(details.clone()),
                None,
            ),
            ApiError::NotFound => (StatusCode::NOT_FOUND, None, None),
            ApiError::Internal(e) => {
                error!(error = %e, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, None, None)
            }
        };
        let body = ErrorBody {
            error: self.to_string(),
            details,
            fields,
        };
        (status, Json(body)).into_response()
    }
}
