//! HTTP error type shared by every route handler.
//!
//! Library code returns `anyhow::Result`; handlers convert into [`ApiError`],
//! which renders the JSON bodies the frontend expects:
//!
//! | Variant | Status | Body |
//! |---------|--------|------|
//! | `Validation` | 422 | `{"message", "errors": {"field": ["..."]}}` |
//! | `Unauthenticated` | 401 | `{"success": false, "message"}` |
//! | `Forbidden` | 403 | `{"success": false, "message"}` |
//! | `NotFound` | 404 | `{"message"}` |
//! | `BadRequest` | 400 | `{"message"}` |
//! | `Internal` | 500 | `{"message"}` (detail only logged) |

use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

pub const UNAUTHENTICATED_MESSAGE: &str = "Non authentifié. Veuillez vous connecter.";
pub const INTERNAL_MESSAGE: &str = "Une erreur interne est survenue";

/// Field-keyed validation messages, in field order.
#[derive(Debug, Default, Clone, Serialize, PartialEq)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn first_message(&self) -> Option<&str> {
        self.0
            .values()
            .next()
            .and_then(|msgs| msgs.first())
            .map(String::as_str)
    }

    /// `Ok(())` when nothing was recorded, otherwise the 422 error.
    pub fn into_result(self) -> Result<(), ApiError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self))
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("validation failed")]
    Validation(ValidationErrors),
    #[error("unauthenticated")]
    Unauthenticated,
    #[error("{0}")]
    Forbidden(String),
    #[error("Ressource introuvable")]
    NotFound,
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// Single-field validation failure.
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        let mut errors = ValidationErrors::new();
        errors.add(field, message);
        ApiError::Validation(errors)
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound,
            other => ApiError::Internal(other.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({
                    "message": errors.first_message().unwrap_or("Données invalides"),
                    "errors": errors,
                }),
            ),
            ApiError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                json!({ "success": false, "message": UNAUTHENTICATED_MESSAGE }),
            ),
            ApiError::Forbidden(message) => (
                StatusCode::FORBIDDEN,
                json!({ "success": false, "message": message }),
            ),
            ApiError::NotFound => (StatusCode::NOT_FOUND, json!({ "message": self.to_string() })),
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, json!({ "message": message }))
            }
            ApiError::Internal(err) => {
                tracing::error!(error = ?err, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "message": INTERNAL_MESSAGE }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
