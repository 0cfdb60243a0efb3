/// Download gate
///
/// A file is only served to its owner, only while Available, and only if
/// its blob is still present. Every other case is reported as NotFound so
/// callers can't tell a foreign file from a missing one.
use crate::{
    blob_store::{BlobBackend, ByteRange},
    error::{VaultError, VaultResult},
    files::FileDownload,
    metadata::{FileDetails, FileRecord, FileStatus, MetadataStore},
    validation::ContentValidator,
};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct DownloadGate {
    metadata: Arc<dyn MetadataStore>,
    blobs: Arc<dyn BlobBackend>,
    validator: ContentValidator,
}

impl DownloadGate {
    pub fn new(metadata: Arc<dyn MetadataStore>, blobs: Arc<dyn BlobBackend>) -> Self {
        Self {
            validator: ContentValidator::new(blobs.clone()),
            metadata,
            blobs,
        }
    }

    /// Fetch an Available record owned by `owner`
    pub async fn get(&self, id: Uuid, owner: Option<&str>) -> VaultResult<FileRecord> {
        let not_found = || VaultError::NotFound(format!("File {} not found", id));

        let record = self
            .metadata
            .get_by_id_and_owner(id, owner)
            .await?
            .ok_or_else(not_found)?;

        if record.status != FileStatus::Available {
            tracing::debug!(file_id = %id, status = record.status.as_str(), "File not available");
            return Err(not_found());
        }

        Ok(record)
    }

    /// Metadata snapshot of a servable file
    pub async fn details(&self, id: Uuid, owner: Option<&str>) -> VaultResult<FileDetails> {
        let record = self.get(id, owner).await?;
        Ok(FileDetails::from(&record))
    }

    /// Open a servable file for streaming
    ///
    /// The returned stream owns its file handle; dropping it releases the blob.
    pub async fn download(
        &self,
        id: Uuid,
        owner: Option<&str>,
        range: Option<ByteRange>,
    ) -> VaultResult<FileDownload> {
        let record = self.get(id, owner).await?;
        self.validator.validate_for_download(&record.storage_key).await?;

        let reader = self.blobs.download(&record.storage_key, range).await?;

        tracing::info!(
            file_id = %id,
            bytes = reader.content_length(),
            partial = reader.range.is_some(),
            "Serving file"
        );

        Ok(FileDownload {
            details: FileDetails::from(&record),
            reader,
        })
    }
}
