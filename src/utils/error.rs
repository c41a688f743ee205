//! Error types and handling
//!
//! Common error types used across the crate.

use crate::capture::CaptureError;
use crate::writer::WriterError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Crate-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Writer error: {0}")]
    Writer(#[from] WriterError),

    #[error("Recording error: {0}")]
    Recording(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Error response for the UI layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<&AppError> for ErrorResponse {
    fn from(error: &AppError) -> Self {
        let code = match error {
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Capture(CaptureError::PermissionDenied(_)) => "PERMISSION_DENIED",
            AppError::Capture(_) => "CAPTURE_ERROR",
            AppError::Writer(_) => "WRITER_ERROR",
            AppError::Recording(_) => "RECORDING_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
        };

        ErrorResponse {
            code: code.to_string(),
            message: error.to_string(),
        }
    }
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        ErrorResponse::from(&error)
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_codes() {
        let err = AppError::Capture(CaptureError::PermissionDenied("camera".to_string()));
        let response = ErrorResponse::from(&err);
        assert_eq!(response.code, "PERMISSION_DENIED");
        assert!(response.message.contains("camera"));

        let err = AppError::Writer(WriterError::NoMedia);
        assert_eq!(ErrorResponse::from(err).code, "WRITER_ERROR");
    }
}
