use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

pub type AppResult<T> = Result<T, AppError>;

/// Every failure a request can end with. Each variant maps to one HTTP status.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Missing or malformed input (400).
    #[error("{0}")]
    Validation(String),
    /// A unique field is already taken (409).
    #[error("{0}")]
    Conflict(String),
    /// No matching record (404).
    #[error("{0}")]
    NotFound(String),
    /// Bad credentials, missing token or not the owner (401).
    #[error("{0}")]
    Unauthorized(String),
    /// Bearer token failed signature or expiry checks (400).
    #[error("{0}")]
    InvalidToken(String),
    /// Storage or other infrastructure failure (500).
    #[error(transparent)]
    Persistence(#[from] anyhow::Error),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub success: bool,
    pub status_code: u16,
    pub message: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::InvalidToken(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Persistence(e) => {
                tracing::error!(error = ?e, "request failed");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        let body = ErrorBody {
            success: false,
            status_code: status.as_u16(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

/// Returned when a still-valid token names an account that was deleted.
pub const STALE_ACCOUNT: &str = "Account no longer exists";

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                let constraint = db_err.constraint().unwrap_or_default();
                let message = if constraint.contains("email") {
                    "Email already registered"
                } else if constraint.contains("username") {
                    "Username already taken"
                } else {
                    "Duplicate value"
                };
                return AppError::Conflict(message.into());
            }
            if db_err.is_foreign_key_violation() {
                return AppError::Unauthorized(STALE_ACCOUNT.into());
            }
        }
        AppError::Persistence(anyhow::Error::new(err).context("database error"))
    }
}
