use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("A KYC submission for this ID number is already in progress")]
    DuplicateInProgress,

    #[error("Unsupported country: {0}")]
    UnsupportedCountry(String),

    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid status transition: {0}")]
    InvalidStatusTransition(String),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Reconciliation failed: {0}")]
    ReconciliationFailed(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Upload error: {0}")]
    UploadError(String),

    #[error("Notification error: {0}")]
    NotificationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_)
            | AppError::UnsupportedCountry(_)
            | AppError::SerializationError(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_)
            | AppError::UnsupportedProvider(_)
            | AppError::ReconciliationFailed(_) => StatusCode::NOT_FOUND,
            AppError::DuplicateInProgress | AppError::InvalidStatusTransition(_) => {
                StatusCode::CONFLICT
            }
            AppError::ProviderError(_)
            | AppError::UploadError(_)
            | AppError::NotificationError(_) => StatusCode::BAD_GATEWAY,
            AppError::ConfigurationError(_)
            | AppError::StorageError(_)
            | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(status = %status.as_u16(), error = %self, "request failed");
        }
        (status, Json(json!({ "message": self.to_string() }))).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::StorageError(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::ProviderError(format!("request timed out: {}", err))
        } else {
            AppError::ProviderError(err.to_string())
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        AppError::Unauthorized(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::SerializationError(err.to_string())
    }
}

impl From<lettre::error::Error> for AppError {
    fn from(err: lettre::error::Error) -> Self {
        AppError::NotificationError(err.to_string())
    }
}

impl From<lettre::transport::smtp::Error> for AppError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        AppError::NotificationError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::ValidationError("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::DuplicateInProgress.status_code(), StatusCode::CONFLICT);
        assert_eq!(AppError::NotFound("Package".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::ProviderError("down".into()).status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(AppError::NotificationError("smtp".into()).status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(AppError::StorageError("db".into()).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_response_body_carries_message() {
        let response = AppError::NotFound("KYC submission".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["message"], "KYC submission not found");
    }
}
