use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

/// Token verification failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("token is malformed or its signature is invalid")]
    Malformed,
    #[error("token has expired")]
    Expired,
    #[error("token is missing the email claim")]
    MissingClaim,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("No valid fields to update")]
    NoOp,
    #[error("{0}")]
    InvalidAmount(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("{0}")]
    NotFound(String),
    #[error("Insufficient credits: balance {balance}, requested {requested}")]
    InsufficientCredits { balance: i64, requested: i64 },
    #[error("store operation '{0}' timed out")]
    StoreTimeout(&'static str),
    #[error("store operation '{0}' failed")]
    StoreUnavailable(&'static str),
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error("internal error: {0}")]
    Internal(String),
    #[error("configuration error: {0}")]
    Config(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    success: bool,
    error: &'a str,
    message: String,
}

impl AppError {
    /// Short machine-readable reason carried in every error body.
    pub fn reason(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::NoOp => "no_op",
            AppError::InvalidAmount(_) => "invalid_amount",
            AppError::Conflict(_) => "conflict",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Auth(AuthError::Malformed) => "token_malformed",
            AppError::Auth(AuthError::Expired) => "token_expired",
            AppError::Auth(AuthError::MissingClaim) => "token_missing_claim",
            AppError::NotFound(_) => "not_found",
            AppError::InsufficientCredits { .. } => "insufficient_credits",
            AppError::StoreTimeout(_) => "store_timeout",
            AppError::StoreUnavailable(_) => "store_unavailable",
            AppError::Hashing(_) => "hashing_error",
            AppError::Internal(_) => "internal_error",
            AppError::Config(_) => "config_error",
        }
    }

    // Server-side failures keep their detail in the logs only.
    fn public_message(&self) -> String {
        match self {
            AppError::StoreTimeout(_) => "Upstream store timed out".to_string(),
            AppError::StoreUnavailable(_) => "Store unavailable".to_string(),
            AppError::Hashing(_) | AppError::Internal(_) | AppError::Config(_) => {
                "Internal server error".to_string()
            }
            AppError::InsufficientCredits { .. } => "Insufficient credits".to_string(),
            other => other.to_string(),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::NoOp | AppError::InvalidAmount(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unauthorized(_) | AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InsufficientCredits { .. } => StatusCode::PAYMENT_REQUIRED,
            AppError::StoreTimeout(_) => StatusCode::BAD_GATEWAY,
            AppError::StoreUnavailable(_)
            | AppError::Hashing(_)
            | AppError::Internal(_)
            | AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("❌ {} ({})", self, status);
        }
        HttpResponse::build(status).json(ErrorBody {
            success: false,
            error: self.reason(),
            message: self.public_message(),
        })
    }
}
