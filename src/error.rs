//! Unified API error handling
//!
//! Provides consistent error responses across all endpoints.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Non-success response from the LLM provider.
    #[error("Erreur OpenAI: {message}")]
    Upstream { status: u16, message: String },

    /// The model reply could not be reduced to the expected JSON object.
    #[error("Malformed model output")]
    MalformedOutput { preview: String },

    /// PDF text extraction produced nothing usable.
    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("Database error")]
    Database(#[from] sqlx::Error),
}

/// Wire shape for error responses: `{ error, details? }`.
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(anyhow::anyhow!(msg.into()))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Upstream { .. }
            | Self::MalformedOutput { .. }
            | Self::Extraction(_)
            | Self::Internal(_)
            | Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::Forbidden(msg) => msg.clone(),
            Self::NotFound(msg) => msg.clone(),
            Self::BadRequest(msg) => msg.clone(),
            Self::Upstream { message, .. } => format!("Erreur OpenAI: {}", message),
            Self::MalformedOutput { .. } => "Réponse du modèle invalide".to_string(),
            Self::Extraction(msg) => format!("Extraction du document impossible: {}", msg),
            // Don't leak internal error details
            Self::Internal(_) | Self::Database(_) => "An internal error occurred".to_string(),
        }
    }

    fn details(&self) -> Option<String> {
        match self {
            Self::Upstream { status, .. } => Some(format!("provider status {}", status)),
            Self::MalformedOutput { preview } => Some(preview.clone()),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Log internal errors
        match &self {
            Self::Internal(e) => {
                tracing::error!(error = ?e, "Internal server error");
            }
            Self::Database(e) => {
                tracing::error!(error = ?e, "Database error");
            }
            Self::Upstream { status, message } => {
                tracing::error!(status = status, message = %message, "LLM provider error");
            }
            Self::MalformedOutput { preview } => {
                tracing::error!(preview = %preview, "Malformed model output");
            }
            _ => {
                tracing::warn!(error = %self, "API error");
            }
        }

        let status = self.status_code();
        let body = ErrorResponse {
            error: self.public_message(),
            details: self.details(),
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_message_carries_provider_prefix() {
        let err = ApiError::Upstream {
            status: 429,
            message: "rate limit exceeded".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.public_message().starts_with("Erreur OpenAI:"));
        assert_eq!(err.details().as_deref(), Some("provider status 429"));
    }

    #[test]
    fn validation_errors_map_to_400() {
        let err = ApiError::bad_request("Texte extrait insuffisant");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn malformed_output_exposes_preview_only() {
        let err = ApiError::MalformedOutput {
            preview: "Sure! Here is".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.details().as_deref(), Some("Sure! Here is"));
    }
}
