//! Gateway errors and their HTTP mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// Table or record absent
    #[error("{0}")]
    NotFound(String),

    /// Missing or invalid body, bad datetime, nothing to write
    #[error("{0}")]
    Validation(String),

    /// Anything the database engine reported, constraint violations included
    #[error("Database error: {0}")]
    Database(String),

    #[error("Server error: {0}")]
    Server(String),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for GatewayError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) => GatewayError::Database(db.message().to_string()),
            other => GatewayError::Database(other.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::debug!("{}: {}", status, self);
        }
        let body = Json(ErrorResponse {
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}
