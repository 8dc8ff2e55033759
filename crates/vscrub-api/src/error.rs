//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use vscrub_jobs::JobError;
use vscrub_models::Denial;
use vscrub_orders::OrderError;
use vscrub_store::StoreError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("{0}")]
    Denied(#[from] Denial),

    #[error("{0}")]
    Job(#[from] JobError),

    #[error("{0}")]
    Order(#[from] OrderError),

    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Denied(denial) => match denial {
                Denial::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                _ => StatusCode::FORBIDDEN,
            },
            ApiError::Job(e) => match e {
                JobError::NotFound => StatusCode::NOT_FOUND,
                JobError::InvalidTransition { .. } => StatusCode::CONFLICT,
            },
            ApiError::Order(e) => match e {
                OrderError::NotFound => StatusCode::NOT_FOUND,
                OrderError::UnknownPlan(_) => StatusCode::BAD_REQUEST,
                OrderError::InvalidState { .. } => StatusCode::CONFLICT,
                OrderError::Expired => StatusCode::GONE,
            },
            ApiError::Store(e) => match e {
                StoreError::NotFound => StatusCode::NOT_FOUND,
                StoreError::EmailTaken | StoreError::UsernameTaken => StatusCode::CONFLICT,
            },
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for clients.
    fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::Unauthorized(_) => "INVALID_TOKEN",
            ApiError::InvalidCredentials => "INVALID_CREDENTIALS",
            ApiError::Forbidden(_) => "ACCESS_DENIED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::Denied(denial) => denial.code(),
            ApiError::Job(e) => match e {
                JobError::NotFound => "NOT_FOUND",
                JobError::InvalidTransition { .. } => "CANNOT_CANCEL",
            },
            ApiError::Order(e) => match e {
                OrderError::NotFound => "NOT_FOUND",
                OrderError::UnknownPlan(_) => "UNKNOWN_PLAN",
                OrderError::InvalidState { .. } => "INVALID_STATE",
                OrderError::Expired => "ORDER_EXPIRED",
            },
            ApiError::Store(e) => match e {
                StoreError::NotFound => "NOT_FOUND",
                StoreError::EmailTaken => "EMAIL_TAKEN",
                StoreError::UsernameTaken => "USERNAME_TAKEN",
            },
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
    code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Don't expose internal error details in production
        let detail = match &self {
            ApiError::Internal(_) => {
                if std::env::var("ENVIRONMENT").unwrap_or_default() == "production" {
                    "An internal error occurred".to_string()
                } else {
                    self.to_string()
                }
            }
            _ => self.to_string(),
        };

        let body = ErrorResponse {
            detail,
            code: self.code(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denial_status_mapping() {
        let quota = ApiError::Denied(Denial::DailyLimitExceeded { limit: 3 });
        assert_eq!(quota.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(quota.code(), "DAILY_LIMIT_EXCEEDED");

        let size = ApiError::Denied(Denial::FileTooLarge { limit_mib: 50 });
        assert_eq!(size.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(size.code(), "FILE_TOO_LARGE");

        let vip = ApiError::Denied(Denial::VipRequired);
        assert_eq!(vip.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(vip.code(), "VIP_REQUIRED");
    }

    #[test]
    fn test_order_status_mapping() {
        assert_eq!(
            ApiError::Order(OrderError::Expired).status_code(),
            StatusCode::GONE
        );
        assert_eq!(
            ApiError::Order(OrderError::InvalidState {
                status: "paid",
                requested: "failed"
            })
            .code(),
            "INVALID_STATE"
        );
    }
}
