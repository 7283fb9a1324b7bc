use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ledger_core::LedgerError;
use serde_json::json;
use tracing::error;

/// Error type returned by the HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    Ledger(LedgerError),
    NotFound(u64),
    BadRequest(String),
    Internal(String),
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        AppError::Ledger(err)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Ledger(err @ LedgerError::StoreUnavailable(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, err.to_string())
            }
            AppError::Ledger(err @ LedgerError::MalformedStoredBlock { .. }) => {
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
            AppError::Ledger(err @ LedgerError::InvalidTimestamp(_)) => {
                (StatusCode::BAD_REQUEST, err.to_string())
            }
            AppError::NotFound(index) => (StatusCode::NOT_FOUND, format!("no block at index {index}")),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        if status.is_server_error() {
            error!(%status, %message, "request failed");
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}
