//! Service error type and its HTTP mapping.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("missing permission: {0}")]
    Forbidden(&'static str),
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("{0}")]
    InvalidState(String),
    #[error("attempt has already been submitted")]
    AlreadySubmitted,
    #[error("attempt limit of {allowed} reached")]
    AttemptLimitExceeded { allowed: i32 },
    #[error("time limit of {limit_minutes} minutes exceeded")]
    TimeLimitExceeded { limit_minutes: i32 },
    #[error("{0} already exists")]
    AlreadyExists(&'static str),
    #[error("{0}")]
    InvalidTarget(&'static str),
    #[error("{0}")]
    Validation(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::InvalidState(_) => "INVALID_STATE",
            Self::AlreadySubmitted => "ALREADY_SUBMITTED",
            Self::AttemptLimitExceeded { .. } => "ATTEMPT_LIMIT_EXCEEDED",
            Self::TimeLimitExceeded { .. } => "TIME_LIMIT_EXCEEDED",
            Self::AlreadyExists(_) => "ALREADY_EXISTS",
            Self::InvalidTarget(_) => "INVALID_TARGET",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Database(_) | Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::InvalidState(_)
            | Self::AlreadySubmitted
            | Self::AttemptLimitExceeded { .. }
            | Self::TimeLimitExceeded { .. }
            | Self::AlreadyExists(_)
            | Self::InvalidTarget(_)
            | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match &self {
            Self::Database(e) => {
                tracing::error!(error = %e, "database error");
                "internal error".to_string()
            }
            Self::Internal(e) => {
                tracing::error!(error = %e, "internal error");
                "internal error".to_string()
            }
            other => other.to_string(),
        };
        let body = Json(serde_json::json!({
            "error": self.code(),
            "message": message,
        }));
        (self.status(), body).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_map_to_400() {
        for e in [
            AppError::AlreadySubmitted,
            AppError::AttemptLimitExceeded { allowed: 1 },
            AppError::TimeLimitExceeded { limit_minutes: 10 },
            AppError::InvalidTarget("owner"),
            AppError::Validation("bad".into()),
        ] {
            assert_eq!(e.status(), StatusCode::BAD_REQUEST, "{e}");
        }
        assert_eq!(AppError::NotFound("quiz").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Forbidden("manage_content").status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn internal_errors_hide_details() {
        let resp = AppError::Internal("secret".into()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
