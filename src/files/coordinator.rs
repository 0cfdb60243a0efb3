/// Upload coordinator
///
/// Walks the sections of an upload in arrival order. Simple fields are read
/// and discarded, every file section yields exactly one `UploadResult`, and a
/// failing file never stops its siblings.
///
/// Accepted files go through a three step saga with no compensation:
/// insert a Pending record, stream the bytes to the blob store, then mark the
/// record Available. A Pending record left behind by a failed upload is
/// expected residue.
use crate::{
    blob_store::{BlobBackend, ByteStream},
    error::{SagaStage, VaultError, VaultResult},
    files::{PersistRequest, UploadResult},
    ingest::{IngestOptions, SectionIngester, FIELD_PREVIEW_LEN},
    metadata::{MetadataStore, NewFileRecord},
    validation::ContentValidator,
};
use bytes::Bytes;
use futures::Stream;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Bytes sniffed from each file section by default
pub const DEFAULT_PEEK_LENGTH: usize = 32;

/// Upload coordinator
#[derive(Clone)]
pub struct UploadCoordinator {
    metadata: Arc<dyn MetadataStore>,
    blobs: Arc<dyn BlobBackend>,
    validator: ContentValidator,
    ingest: IngestOptions,
    peek_length: usize,
}

impl UploadCoordinator {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        blobs: Arc<dyn BlobBackend>,
        ingest: IngestOptions,
        peek_length: usize,
    ) -> Self {
        Self {
            validator: ContentValidator::new(blobs.clone()),
            metadata,
            blobs,
            ingest,
            peek_length,
        }
    }

    /// Run the persistence saga for one accepted file
    pub async fn persist(&self, request: PersistRequest, body: ByteStream<'_>) -> VaultResult<Uuid> {
        let filename = request.user_filename.clone();
        let fail = |stage: SagaStage, reason: String| {
            error!(filename = %filename, stage = %stage, reason = %reason, "Upload saga step failed");
            VaultError::Persistence {
                stage,
                filename: filename.clone(),
                reason,
            }
        };

        debug!(filename = %filename, storage_key = %request.storage_key, "Persisting pending record");
        let id = match self
            .metadata
            .create(NewFileRecord {
                storage_key: request.storage_key.clone(),
                user_filename: request.user_filename.clone(),
                content_type: request.content_type.clone(),
                owner: request.owner.clone(),
                metadata: request.metadata.clone(),
            })
            .await
        {
            Ok(Some(id)) => id,
            Ok(None) => {
                return Err(fail(
                    SagaStage::PersistingPending,
                    "metadata store returned no id".to_string(),
                ))
            }
            Err(e) => return Err(fail(SagaStage::PersistingPending, e.to_string())),
        };

        debug!(file_id = %id, filename = %filename, "Uploading to blob store");
        let location = match self.blobs.upload(&request.storage_key, body).await {
            Ok(Some(location)) => location,
            Ok(None) => {
                return Err(fail(
                    SagaStage::Uploading,
                    "blob store returned no location".to_string(),
                ))
            }
            Err(e) => return Err(fail(SagaStage::Uploading, e.to_string())),
        };

        debug!(file_id = %id, location = %location, "Marking file available");
        match self.metadata.mark_available(id, &location).await {
            Ok(true) => {}
            Ok(false) => {
                return Err(fail(
                    SagaStage::MarkingAvailable,
                    format!("no record updated for {}", id),
                ))
            }
            Err(e) => return Err(fail(SagaStage::MarkingAvailable, e.to_string())),
        }

        info!(file_id = %id, filename = %filename, "File stored");
        Ok(id)
    }

    /// Ingest every section of a multipart body
    ///
    /// Only broken framing fails the whole call; per-file problems are
    /// reported in the returned list.
    pub async fn upload_batch<'r, S, O, E>(
        &self,
        boundary: &str,
        stream: S,
        owner: Option<&str>,
    ) -> VaultResult<Vec<UploadResult>>
    where
        S: Stream<Item = Result<O, E>> + Send + 'r,
        O: Into<Bytes> + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + 'r,
    {
        let mut ingester = SectionIngester::new(stream, boundary, self.ingest.clone());
        let mut results = Vec::new();

        while let Some(section) = ingester.next_section().await? {
            let disposition = match self.validator.validate_header(section.disposition()) {
                Ok(disposition) => disposition.clone(),
                Err(failure) => {
                    warn!(index = section.index(), "Section without content disposition");
                    let err = VaultError::MalformedRequest(failure.to_string());
                    results.push(UploadResult::failed(None, &err));
                    continue;
                }
            };

            let Some(filename) = disposition.filename else {
                let key = disposition.name.unwrap_or_default();
                let value = section.into_preview(FIELD_PREVIEW_LEN).await?;
                debug!(
                    key = %key,
                    value = %value.text,
                    len = value.len,
                    truncated = value.truncated(),
                    "Discarding form field"
                );
                continue;
            };

            let declared_mime = section.content_type().map(String::from);
            let mut body = section.into_body();
            let prefix = match body.peek(self.peek_length).await {
                Ok(prefix) => prefix,
                // Framing is gone, nothing after this section can be read
                Err(err @ VaultError::MalformedRequest(_)) => return Err(err),
                Err(err) => {
                    error!(filename = %filename, error = %err, "Failed to buffer file section");
                    results.push(UploadResult::failed(Some(filename), &err));
                    continue;
                }
            };

            let rule = match self
                .validator
                .validate_file(&filename, declared_mime.as_deref(), &prefix)
            {
                Ok(rule) => rule,
                Err(failure) => {
                    info!(filename = %filename, reason = %failure, "Rejected upload");
                    let err = VaultError::from(failure);
                    results.push(UploadResult::failed(Some(filename), &err));
                    continue;
                }
            };

            let request = PersistRequest {
                storage_key: format!("{}.{}", Uuid::new_v4(), rule.extension),
                user_filename: filename.clone(),
                content_type: rule.mime_type.to_string(),
                owner: owner.map(String::from),
                metadata: "{}".to_string(),
            };

            match self.persist(request, body.into_stream()).await {
                Ok(id) => results.push(UploadResult::ok(id, filename)),
                Err(err) => results.push(UploadResult::failed(Some(filename), &err)),
            }
        }

        debug!(results = results.len(), "Upload batch finished");
        Ok(results)
    }
}
