use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Violations of the fund's bookkeeping rules.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("Fiscal year {0} does not exist")]
    YearNotFound(String),

    #[error("Fiscal year {0} is closed")]
    YearClosed(String),

    #[error("Fiscal year {0} already exists")]
    YearExists(String),

    #[error("No fiscal year exists yet")]
    NoYears,

    #[error("Fiscal year id {0} is not a number")]
    InvalidYearId(String),

    #[error("{0}")]
    Validation(String),
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("{0}")]
    Internal(String),
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: String,
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Ledger(LedgerError::YearNotFound(_)) => (StatusCode::NOT_FOUND, "YEAR_NOT_FOUND"),
            ApiError::Ledger(LedgerError::YearClosed(_)) => (StatusCode::CONFLICT, "YEAR_CLOSED"),
            ApiError::Ledger(LedgerError::YearExists(_)) => (StatusCode::CONFLICT, "YEAR_EXISTS"),
            ApiError::Ledger(LedgerError::NoYears) => (StatusCode::CONFLICT, "NO_YEARS"),
            ApiError::Ledger(LedgerError::InvalidYearId(_)) => (StatusCode::BAD_REQUEST, "INVALID_YEAR_ID"),
            ApiError::Ledger(LedgerError::Validation(_)) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        // SQL details stay in the log.
        let message = match &self {
            ApiError::Storage(err) => {
                tracing::error!(error = %err, "storage failure");
                "Database operation failed".to_string()
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal failure");
                msg.clone()
            }
            other => other.to_string(),
        };

        let body = ErrorResponse {
            success: false,
            error: message,
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_errors_map_to_http_status() {
        let cases = [
            (ApiError::from(LedgerError::YearNotFound("2030".into())), StatusCode::NOT_FOUND),
            (ApiError::from(LedgerError::YearClosed("2023".into())), StatusCode::CONFLICT),
            (ApiError::from(LedgerError::YearExists("2025".into())), StatusCode::CONFLICT),
            (ApiError::from(LedgerError::Validation("bad".into())), StatusCode::BAD_REQUEST),
            (ApiError::Unauthorized("no".into()), StatusCode::UNAUTHORIZED),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
