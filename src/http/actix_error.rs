//! Actix Web error adapters for craft-runner errors.
//!
//! Lifecycle conflicts (`AlreadyRunning`, `NotRunning`) always map to
//! `409 Conflict`; install preconditions (`MissingArtifact`, `UnknownKind`)
//! map to `422 Unprocessable Entity` since they need the operator to fix the
//! server directory or record.

use crate::error::Error;
use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;

impl ResponseError for Error {
    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();

        HttpResponse::build(status_code)
            .content_type("application/json")
            .json(json!({
                "error": self.to_string(),
                "code": status_code.as_u16()
            }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Error::ServerNotFound(_) => StatusCode::NOT_FOUND,
            Error::AlreadyRunning(_) => StatusCode::CONFLICT,
            Error::NotRunning(_) => StatusCode::CONFLICT,
            Error::MissingArtifact(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::UnknownKind(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::InvalidProperty(_) => StatusCode::BAD_REQUEST,
            Error::ConfigInvalid(_) => StatusCode::BAD_REQUEST,
            Error::ConfigParse(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// Create a wrapper error type for request validation errors
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Internal(#[from] Error),
}

impl ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        match self {
            ApiError::Internal(e) => e.error_response(),
            ApiError::InvalidRequest(_) => {
                let status_code = self.status_code();
                HttpResponse::build(status_code)
                    .content_type("application/json")
                    .json(json!({
                        "error": self.to_string(),
                        "code": status_code.as_u16()
                    }))
            }
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(e) => e.status_code(),
        }
    }
}
