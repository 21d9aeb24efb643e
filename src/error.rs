use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::response::ErrorResponse;

/// Stable, machine-readable failure codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidParams,
    EmptyProductList,
    ProductNotFound,
    CantBuyOwnProduct,
    ProductNotAvailable,
    OrderNotFound,
    PermissionDenied,
    InvalidOrderState,
    EmptyOrderList,
    InvalidAmount,
    InvalidPaymentMethod,
    OrderPermissionDenied,
    OrderStatusInvalid,
    OrderAmountMismatch,
    OrderAlreadyBound,
    PaymentNotFound,
    PaymentAlreadyProcessed,
    InvalidPaymentPassword,
    PaymentPasswordError,
    PaymentTimeout,
    Unauthorized,
    Forbidden,
    NotFound,
    EmailTaken,
    InvalidCredentials,
    SystemError,
}

/// Renders the same string the code serializes to.
impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::String(code)) => f.write_str(&code),
            _ => write!(f, "{self:?}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or missing input, rejected before the store is touched.
    #[error("{message}")]
    BadRequest { code: ErrorCode, message: String },

    #[error("{message}")]
    NotFound { code: ErrorCode, message: String },

    /// The caller is not the party the operation requires.
    #[error("{message}")]
    PermissionDenied { code: ErrorCode, message: String },

    #[error("{message} (current: {current}, expected: {expected})")]
    InvalidState {
        code: ErrorCode,
        message: String,
        current: String,
        expected: String,
    },

    /// Amount mismatches, double binding, failed credential checks.
    #[error("{message}")]
    Conflict { code: ErrorCode, message: String },

    /// A competing writer already moved the payment out of PENDING.
    #[error("payment {payment_id} was already finalized as {status}")]
    AlreadyFinalized { payment_id: String, status: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("ORM error")]
    OrmError(#[from] sea_orm::DbErr),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn bad_request(code: ErrorCode, message: impl Into<String>) -> Self {
        AppError::BadRequest {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::bad_request(ErrorCode::InvalidParams, message)
    }

    pub fn not_found(code: ErrorCode, message: impl Into<String>) -> Self {
        AppError::NotFound {
            code,
            message: message.into(),
        }
    }

    pub fn permission_denied(code: ErrorCode, message: impl Into<String>) -> Self {
        AppError::PermissionDenied {
            code,
            message: message.into(),
        }
    }

    pub fn conflict(code: ErrorCode, message: impl Into<String>) -> Self {
        AppError::Conflict {
            code,
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::BadRequest { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::PermissionDenied { code, .. }
            | AppError::InvalidState { code, .. }
            | AppError::Conflict { code, .. } => *code,
            AppError::AlreadyFinalized { .. } => ErrorCode::PaymentAlreadyProcessed,
            AppError::Unauthorized(_) => ErrorCode::Unauthorized,
            AppError::Forbidden => ErrorCode::Forbidden,
            AppError::OrmError(_) | AppError::Internal(_) => ErrorCode::SystemError,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest { .. }
            | AppError::InvalidState { .. }
            | AppError::Conflict { .. }
            | AppError::AlreadyFinalized { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::PermissionDenied { .. } | AppError::Unauthorized(_) | AppError::Forbidden => {
                StatusCode::UNAUTHORIZED
            }
            AppError::OrmError(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::OrmError(err) => {
                tracing::error!(error = %err, "database failure");
                "System error, please retry later".to_string()
            }
            AppError::Internal(err) => {
                tracing::error!(error = ?err, "internal failure");
                "System error, please retry later".to_string()
            }
            _ => self.to_string(),
        };

        (status, axum::Json(ErrorResponse::new(self.code(), message))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_follows_error_category() {
        assert_eq!(
            AppError::invalid_params("x").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::not_found(ErrorCode::OrderNotFound, "x").status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::permission_denied(ErrorCode::PermissionDenied, "x").status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::OrmError(sea_orm::DbErr::Custom("down".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn race_maps_to_already_processed() {
        let err = AppError::AlreadyFinalized {
            payment_id: "PAY1".into(),
            status: "EXPIRED".into(),
        };
        assert_eq!(err.code(), ErrorCode::PaymentAlreadyProcessed);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn error_codes_display_as_their_wire_strings() {
        for code in [
            ErrorCode::OrderAmountMismatch,
            ErrorCode::CantBuyOwnProduct,
            ErrorCode::PaymentAlreadyProcessed,
            ErrorCode::SystemError,
        ] {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{code}\""));
        }
        assert_eq!(ErrorCode::OrderAmountMismatch.to_string(), "ORDER_AMOUNT_MISMATCH");
    }
}
