use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::{
    response::{ApiResponse, Meta},
    store::StoreError,
};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    UnknownCart(String),

    #[error("{0}")]
    ConflictOrNoop(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    DeleteFailed(String),

    #[error("Store error")]
    Store(#[from] StoreError),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn unknown_cart() -> Self {
        AppError::UnknownCart("Unknown cart".to_string())
    }

    /// Stable tag clients can branch on.
    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::UnknownCart(_) => "unknown_cart",
            AppError::ConflictOrNoop(_) => "conflict_or_noop",
            AppError::Validation(_) => "validation_error",
            AppError::DeleteFailed(_) => "delete_failed",
            AppError::Store(_) => "store_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) | AppError::UnknownCart(_) => StatusCode::NOT_FOUND,
            AppError::ConflictOrNoop(_) => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::DeleteFailed(_) | AppError::Store(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorData {
    pub error_type: String,
    pub error_msg: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match &self {
            AppError::Store(err) => {
                tracing::error!(error = %err, "store failure");
                "Internal error. Contact the administrator".to_string()
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal failure");
                "Internal error. Contact the administrator".to_string()
            }
            _ => self.to_string(),
        };

        let body = ApiResponse {
            message: message.clone(),
            data: Some(ErrorData {
                error_type: self.error_type().to_string(),
                error_msg: message,
            }),
            meta: Some(Meta::empty()),
        };

        (self.status(), axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
