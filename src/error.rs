use std::collections::BTreeMap;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::repository::{DuplicateKey, RepoError};

pub const GENERIC_ERROR: &str = "Something went wrong. Please try again later.";
pub const NOT_LOGGED_IN: &str = "You are not logged in";
pub const ELEVATED_ONLY: &str = "User must be admin or manager to perform this action";

/// ErrorBody
///
/// JSON body written for every failed request. `errors` is only present for
/// validation failures and maps field names to messages.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<BTreeMap<String, String>>,
}

/// AppError
///
/// Handler-level error taxonomy. Validation and authorization failures are
/// raised before any store call; store failures arrive through `From<RepoError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed")]
    Validation(BTreeMap<String, String>),

    #[error("unauthenticated")]
    Unauthenticated,

    /// Role or ownership mismatch. Answered with 401, the status clients of this
    /// API already rely on.
    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate: {0}")]
    Duplicate(String),

    #[error("store unavailable")]
    StoreUnavailable,

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = BTreeMap::new();
        errors.insert(field.into(), message.into());
        AppError::Validation(errors)
    }

    pub fn not_found(resource: &str) -> Self {
        AppError::NotFound(format!("{resource} not found"))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated | AppError::Forbidden(_) | AppError::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Duplicate(_) => StatusCode::CONFLICT,
            AppError::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            AppError::Validation(errors) => ErrorBody {
                message: "Bad request".to_string(),
                errors: Some(errors),
            },
            AppError::Unauthenticated => ErrorBody {
                message: NOT_LOGGED_IN.to_string(),
                errors: None,
            },
            AppError::InvalidCredentials => ErrorBody {
                message: "Invalid email or password".to_string(),
                errors: None,
            },
            AppError::Forbidden(message) | AppError::NotFound(message) | AppError::Duplicate(message) => {
                ErrorBody {
                    message,
                    errors: None,
                }
            }
            AppError::StoreUnavailable => ErrorBody {
                message: "Service temporarily unavailable. Please try again later.".to_string(),
                errors: None,
            },
            AppError::Internal(detail) => {
                // Detail stays in the logs; clients only see the generic message.
                tracing::error!("internal error: {}", detail);
                ErrorBody {
                    message: GENERIC_ERROR.to_string(),
                    errors: None,
                }
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Duplicate(DuplicateKey::Email) => {
                AppError::Duplicate("Email already exists".to_string())
            }
            RepoError::Duplicate(DuplicateKey::Slug) => {
                AppError::Duplicate("Slug already taken".to_string())
            }
            RepoError::Unavailable(detail) => {
                tracing::error!("store unavailable: {}", detail);
                AppError::StoreUnavailable
            }
            RepoError::Store(detail) => AppError::Internal(detail),
        }
    }
}
