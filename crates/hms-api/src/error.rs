//! Error type for the REST API.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use hms_core::{DbError, LedgerError};
use serde_json::json;
use thiserror::Error;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{message}")]
    Validation {
        message: String,
        field: Option<&'static str>,
    },

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Validation failure tied to one request field.
    pub fn field(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        let field = match &e {
            LedgerError::NoLineItems | LedgerError::InvalidLineItem { .. } => "items",
            LedgerError::InvalidAmount { field, .. } => *field,
            LedgerError::DiscountExceedsGross { .. } => "discount",
            LedgerError::InvalidDueDate(_) => "due_date",
            LedgerError::NonPositivePayment(_) | LedgerError::Overpayment { .. } => "amount",
            LedgerError::Cancelled(_) | LedgerError::PaymentsRecorded(_) => {
                return ApiError::Conflict(e.to_string())
            }
        };
        ApiError::field(field, e.to_string())
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound(msg) => ApiError::NotFound(msg),
            DbError::Conflict(msg) => ApiError::Conflict(msg),
            DbError::Validation(msg) => ApiError::validation(msg),
            DbError::NotPermitted(msg) => ApiError::Forbidden(msg),
            DbError::Ledger(err) => err.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Internal(cause) => {
                tracing::error!("Internal error: {}", cause);
                json!({ "message": "Internal server error" })
            }
            ApiError::Validation {
                message,
                field: Some(field),
            } => json!({ "message": message, "field": field }),
            other => json!({ "message": other.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}
