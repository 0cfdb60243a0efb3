/// Content validation module
///
/// Checks that a file section's name, declared MIME type and leading bytes
/// agree with each other and with the type registry. Header and file checks
/// are pure; only the download check touches the blob store.
use crate::{
    blob_store::BlobBackend,
    error::{ValidationFailure, VaultError, VaultResult},
    ingest::Disposition,
    registry::{self, TypeRule},
};
use std::sync::Arc;

/// Shortest prefix that can carry a signature
pub const MIN_PREFIX_LEN: usize = 4;

/// Content validator
#[derive(Clone)]
pub struct ContentValidator {
    blobs: Arc<dyn BlobBackend>,
}

impl ContentValidator {
    /// Create a new content validator
    pub fn new(blobs: Arc<dyn BlobBackend>) -> Self {
        Self { blobs }
    }

    /// Require a Content-Disposition header on the section
    pub fn validate_header<'a>(
        &self,
        disposition: Option<&'a Disposition>,
    ) -> Result<&'a Disposition, ValidationFailure> {
        disposition.ok_or(ValidationFailure::MissingHeader)
    }

    /// Check a file against the registry
    ///
    /// Checks run in a fixed order and the first failure wins: filename,
    /// extension, declared MIME type, prefix length, signature. A missing
    /// MIME type fails the MIME check.
    pub fn validate_file(
        &self,
        filename: &str,
        declared_mime: Option<&str>,
        prefix: &[u8],
    ) -> Result<&'static TypeRule, ValidationFailure> {
        if filename.trim().is_empty() {
            return Err(ValidationFailure::InvalidFilename);
        }

        let extension = registry::extension_of(filename).unwrap_or_default();
        let rule = registry::lookup(extension).ok_or_else(|| ValidationFailure::UnsupportedType {
            filename: filename.to_string(),
            extension: extension.to_string(),
        })?;

        let mime_matches = declared_mime
            .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(rule.mime_type));
        if !mime_matches {
            return Err(ValidationFailure::MimeMismatch {
                filename: filename.to_string(),
                mime_type: declared_mime.map(String::from),
            });
        }

        if prefix.len() < MIN_PREFIX_LEN {
            return Err(ValidationFailure::TooSmall {
                filename: filename.to_string(),
            });
        }

        if !rule.matches_signature(prefix) {
            return Err(ValidationFailure::SignatureMismatch {
                filename: filename.to_string(),
            });
        }

        Ok(rule)
    }

    /// Confirm the blob behind a record is still present
    pub async fn validate_for_download(&self, storage_key: &str) -> VaultResult<()> {
        if self.blobs.exists(storage_key).await? {
            Ok(())
        } else {
            tracing::warn!(storage_key = %storage_key, "Blob missing for available file");
            Err(VaultError::NotFound(format!(
                "File content '{}' not found",
                storage_key
            )))
        }
    }
}
