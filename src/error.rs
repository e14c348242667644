use crate::search::ParamError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Invalid request parameters
    #[error("{0}")]
    BadRequest(String),

    /// Credentials were presented and rejected
    #[error("{0}")]
    Unauthorized(String),

    /// Search backend failure; the message is already generic
    #[error("error performing search: {0}")]
    Search(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Internal server errors
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error body
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    pub message: String,
}

impl AppError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Search(_)
            | AppError::Configuration(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable code; server errors carry none
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            AppError::BadRequest(_) => Some("bad request"),
            AppError::Unauthorized(_) => Some("unauthorized"),
            _ => None,
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            code: self.error_code(),
            message: self.to_string(),
        }
    }
}

/// Convert AppError to HTTP response
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = self.body();

        if status.is_server_error() {
            tracing::error!(
                status_code = status.as_u16(),
                message = %body.message,
                "Request error"
            );
        } else {
            tracing::debug!(
                status_code = status.as_u16(),
                message = %body.message,
                "Request rejected"
            );
        }

        (status, Json(body)).into_response()
    }
}

impl From<ParamError> for AppError {
    fn from(err: ParamError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

/// Conversion from serde_json::Error
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Conversion from validator::ValidationErrors
impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Configuration(err.to_string())
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::SearchError;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            AppError::BadRequest("test".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Unauthorized("test".to_string()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Search("test".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_bodies() {
        let body = serde_json::to_value(AppError::from(ParamError::UnknownParameter("a".into())).body())
            .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"Code": "bad request", "Message": "invalid parameter: a"})
        );

        let err: AppError = SearchError::SearchFailed("cannot count matches".into()).into();
        let body = serde_json::to_value(err.body()).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"Message": "error performing search: search failed: cannot count matches"})
        );
    }
}
