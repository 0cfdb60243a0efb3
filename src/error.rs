/// Unified error types for Aurora Vault
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Outbound classification of an operation result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseStatus {
    Success,
    ValidationError,
    NotFound,
    UnexpectedError,
}

/// Step of the per-file persistence saga
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SagaStage {
    PersistingPending,
    Uploading,
    MarkingAvailable,
}

impl fmt::Display for SagaStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SagaStage::PersistingPending => "persisting pending record",
            SagaStage::Uploading => "uploading to blob store",
            SagaStage::MarkingAvailable => "marking file available",
        };
        f.write_str(label)
    }
}

/// Content check failures, in the order they are evaluated
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationFailure {
    #[error("Invalid request, content disposition header can't be empty")]
    MissingHeader,

    #[error("Filename must be provided for uploading")]
    InvalidFilename,

    #[error("Unsupported file type '{extension}' for '{filename}'")]
    UnsupportedType { filename: String, extension: String },

    #[error("Invalid / unsupported MIME type {} for file '{}'", mime_label(.mime_type), .filename)]
    MimeMismatch {
        filename: String,
        /// None when the section carried no Content-Type
        mime_type: Option<String>,
    },

    #[error("File '{filename}' is too small to be a valid file")]
    TooSmall { filename: String },

    #[error("Invalid file signature for file '{filename}'")]
    SignatureMismatch { filename: String },
}

fn mime_label(mime_type: &Option<String>) -> String {
    match mime_type {
        Some(mime) => format!("'{}'", mime),
        None => "(missing Content-Type)".to_string(),
    }
}

impl ValidationFailure {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            ValidationFailure::MissingHeader => "MissingHeader",
            ValidationFailure::InvalidFilename => "InvalidFilename",
            ValidationFailure::UnsupportedType { .. } => "UnsupportedType",
            ValidationFailure::MimeMismatch { .. } => "MimeMismatch",
            ValidationFailure::TooSmall { .. } => "TooSmall",
            ValidationFailure::SignatureMismatch { .. } => "SignatureMismatch",
        }
    }
}

/// Main error type for the vault
#[derive(Error, Debug)]
pub enum VaultError {
    /// Section framing or headers are unusable
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// Content validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationFailure),

    /// Record absent, owned by someone else, not available, or blob absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// A saga step failed after validation passed
    #[error("Failed while {stage} for '{filename}': {reason}")]
    Persistence {
        stage: SagaStage,
        filename: String,
        reason: String,
    },

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Blob storage errors
    #[error("Blob storage error: {0}")]
    BlobStorage(String),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing settings
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl VaultError {
    /// Classify the error for the caller
    pub fn status(&self) -> ResponseStatus {
        match self {
            VaultError::MalformedRequest(_) | VaultError::Validation(_) => {
                ResponseStatus::ValidationError
            }
            VaultError::NotFound(_) => ResponseStatus::NotFound,
            _ => ResponseStatus::UnexpectedError,
        }
    }

    /// Short error code used in response bodies
    pub fn code(&self) -> &'static str {
        match self {
            VaultError::MalformedRequest(_) => "MalformedRequest",
            VaultError::Validation(failure) => failure.code(),
            VaultError::NotFound(_) => "NotFound",
            VaultError::Authentication(_) => "AuthenticationRequired",
            _ => "UnexpectedError",
        }
    }

    /// Message safe to hand back to callers
    ///
    /// Store failures keep the step and filename but drop the low-level reason.
    pub fn public_message(&self) -> String {
        match self {
            VaultError::MalformedRequest(_)
            | VaultError::Validation(_)
            | VaultError::NotFound(_)
            | VaultError::Authentication(_) => self.to_string(),
            VaultError::Persistence {
                stage, filename, ..
            } => format!("Unexpected error while {} for '{}'", stage, filename),
            _ => "An unexpected error occurred".to_string(),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Convert VaultError to HTTP response
impl IntoResponse for VaultError {
    fn into_response(self) -> Response {
        let status = match &self {
            VaultError::MalformedRequest(_) | VaultError::Validation(_) => StatusCode::BAD_REQUEST,
            VaultError::NotFound(_) => StatusCode::NOT_FOUND,
            VaultError::Authentication(_) => StatusCode::UNAUTHORIZED,
            _ => {
                tracing::error!(error = %self, "Request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        // Don't leak store details
        let message = self.public_message();

        let body = Json(ErrorResponse {
            error: self.code().to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for vault operations
pub type VaultResult<T> = Result<T, VaultError>;
