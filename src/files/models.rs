/// Upload and download data models
use crate::{
    blob_store::BlobReader,
    error::{ResponseStatus, VaultError},
    metadata::FileDetails,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Classified error carried by a failed upload result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub status: ResponseStatus,
    pub code: String,
    pub message: String,
}

impl From<&VaultError> for ErrorDetails {
    fn from(err: &VaultError) -> Self {
        Self {
            status: err.status(),
            code: err.code().to_string(),
            message: err.public_message(),
        }
    }
}

/// Outcome for one file section
///
/// `is_error` is true exactly when `id` is absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub id: Option<Uuid>,
    pub filename: Option<String>,
    pub is_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetails>,
}

impl UploadResult {
    pub fn ok(id: Uuid, filename: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            filename: Some(filename.into()),
            is_error: false,
            error: None,
        }
    }

    pub fn failed(filename: Option<String>, err: &VaultError) -> Self {
        Self {
            id: None,
            filename,
            is_error: true,
            error: Some(ErrorDetails::from(err)),
        }
    }
}

/// Values needed to persist one accepted file
#[derive(Debug, Clone)]
pub struct PersistRequest {
    pub storage_key: String,
    pub user_filename: String,
    pub content_type: String,
    pub owner: Option<String>,
    pub metadata: String,
}

/// A file ready to be streamed back to its owner
pub struct FileDownload {
    pub details: FileDetails,
    pub reader: BlobReader,
}
