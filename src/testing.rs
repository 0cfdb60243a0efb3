/// Shared test fixtures
use crate::{
    blob_store::{disk::DiskBlobBackend, BlobBackend, BlobReader, ByteRange, ByteStream},
    config::{
        AuthConfig, BlobstoreConfig, IngestConfig, LoggingConfig, ServerConfig, ServiceConfig,
        StorageConfig,
    },
    context::AppContext,
    db,
    error::{VaultError, VaultResult},
    files::{DownloadGate, UploadCoordinator},
    ingest::IngestOptions,
    metadata::{FileRecord, MetadataStore, NewFileRecord, SqliteMetadataStore},
};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

pub const BOUNDARY: &str = "X-VAULT-TEST-BOUNDARY";

pub const PDF_BYTES: &[u8] = b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n1 0 obj\n<<>>\nendobj\n";
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR\x00\x00\x00\x01";
pub const JPEG_EXIF_BYTES: &[u8] = b"\xFF\xD8\xFF\xE1\x00\x18Exif\x00\x00MM\x00*";

/// In-memory database with migrations applied
///
/// A single connection, since every `:memory:` connection is its own database.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    db::run_migrations(&pool).await.unwrap();
    pool
}

pub fn new_record(user_filename: &str, owner: Option<&str>) -> NewFileRecord {
    let extension = crate::registry::extension_of(user_filename).unwrap_or("bin");
    NewFileRecord {
        storage_key: format!("{}.{}", Uuid::new_v4(), extension.to_ascii_lowercase()),
        user_filename: user_filename.to_string(),
        content_type: "application/pdf".to_string(),
        owner: owner.map(String::from),
        metadata: "{}".to_string(),
    }
}

pub fn stream_of(chunks: Vec<Vec<u8>>) -> ByteStream<'static> {
    Box::pin(futures::stream::iter(
        chunks.into_iter().map(|chunk| Ok(Bytes::from(chunk))),
    ))
}

pub async fn collect(mut stream: ByteStream<'_>) -> Vec<u8> {
    let mut out = Vec::new();
    while let Some(chunk) = stream.next().await {
        out.extend_from_slice(&chunk.unwrap());
    }
    out
}

/// Split a body into fixed-size chunks to exercise boundary handling
pub fn multipart_stream(body: Vec<u8>, chunk_size: usize) -> ByteStream<'static> {
    stream_of(body.chunks(chunk_size.max(1)).map(<[u8]>::to_vec).collect())
}

/// Builds `multipart/form-data` bodies delimited by [`BOUNDARY`]
#[derive(Default)]
pub struct MultipartBuilder {
    body: Vec<u8>,
}

impl MultipartBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(self, name: &str, value: &str) -> Self {
        let headers = format!("Content-Disposition: form-data; name=\"{}\"", name);
        self.raw_part(&headers, value.as_bytes())
    }

    pub fn file(self, name: &str, filename: &str, content_type: &str, content: &[u8]) -> Self {
        let headers = format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}",
            name, filename, content_type
        );
        self.raw_part(&headers, content)
    }

    /// Append a part with hand-written headers (CRLF separated)
    pub fn raw_part(mut self, headers: &str, content: &[u8]) -> Self {
        self.body
            .extend_from_slice(format!("--{}\r\n{}\r\n\r\n", BOUNDARY, headers).as_bytes());
        self.body.extend_from_slice(content);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn build(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        self.body
    }
}

/// Disk backend that misbehaves on the n-th upload (1-based)
pub struct FailingBackend {
    inner: DiskBlobBackend,
    fail_on: usize,
    drop_location: bool,
    fail_exists: bool,
    uploads: AtomicUsize,
}

impl FailingBackend {
    /// Fail the n-th upload with a storage error
    pub fn new(inner: DiskBlobBackend, fail_on: usize) -> Self {
        Self {
            inner,
            fail_on,
            drop_location: false,
            fail_exists: false,
            uploads: AtomicUsize::new(0),
        }
    }

    /// Store every upload but fail every existence check
    pub fn failing_exists(inner: DiskBlobBackend) -> Self {
        Self {
            fail_exists: true,
            ..Self::new(inner, 0)
        }
    }

    /// Store the n-th upload but report no location for it
    pub fn without_location(inner: DiskBlobBackend, fail_on: usize) -> Self {
        Self {
            drop_location: true,
            ..Self::new(inner, fail_on)
        }
    }
}

#[async_trait]
impl BlobBackend for FailingBackend {
    async fn upload(&self, key: &str, body: ByteStream<'_>) -> VaultResult<Option<String>> {
        let attempt = self.uploads.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt != self.fail_on {
            return self.inner.upload(key, body).await;
        }

        if self.drop_location {
            self.inner.upload(key, body).await?;
            Ok(None)
        } else {
            Err(VaultError::BlobStorage("injected write failure".to_string()))
        }
    }

    async fn download(&self, key: &str, range: Option<ByteRange>) -> VaultResult<BlobReader> {
        self.inner.download(key, range).await
    }

    async fn exists(&self, key: &str) -> VaultResult<bool> {
        if self.fail_exists {
            return Err(VaultError::BlobStorage("injected stat failure".to_string()));
        }
        self.inner.exists(key).await
    }
}

/// How [`QuirkyMetadataStore`] deviates from the store it wraps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataQuirk {
    /// `create` inserts the row but reports no id
    NoId,
    /// `mark_available` leaves the row alone and reports zero rows updated
    NothingUpdated,
}

/// SQLite store that answers one call with an empty result
pub struct QuirkyMetadataStore {
    inner: Arc<SqliteMetadataStore>,
    quirk: MetadataQuirk,
}

impl QuirkyMetadataStore {
    pub fn new(inner: Arc<SqliteMetadataStore>, quirk: MetadataQuirk) -> Self {
        Self { inner, quirk }
    }
}

#[async_trait]
impl MetadataStore for QuirkyMetadataStore {
    async fn create(&self, record: NewFileRecord) -> VaultResult<Option<Uuid>> {
        let id = self.inner.create(record).await?;
        Ok(id.filter(|_| self.quirk != MetadataQuirk::NoId))
    }

    async fn mark_available(&self, id: Uuid, location: &str) -> VaultResult<bool> {
        if self.quirk == MetadataQuirk::NothingUpdated {
            return Ok(false);
        }
        self.inner.mark_available(id, location).await
    }

    async fn get_by_id_and_owner(
        &self,
        id: Uuid,
        owner: Option<&str>,
    ) -> VaultResult<Option<FileRecord>> {
        self.inner.get_by_id_and_owner(id, owner).await
    }
}

/// Stores wired together over a temp directory and an in-memory database
pub struct Fixture {
    pub pool: SqlitePool,
    pub metadata: Arc<SqliteMetadataStore>,
    pub blobs: Arc<dyn BlobBackend>,
    pub dir: TempDir,
}

impl Fixture {
    pub fn coordinator(&self) -> UploadCoordinator {
        UploadCoordinator::new(
            self.metadata.clone(),
            self.blobs.clone(),
            IngestOptions::default(),
            crate::files::coordinator::DEFAULT_PEEK_LENGTH,
        )
    }

    pub fn gate(&self) -> DownloadGate {
        DownloadGate::new(self.metadata.clone(), self.blobs.clone())
    }
}

pub async fn fixture() -> Fixture {
    fixture_with_backend(|disk| disk).await
}

pub async fn fixture_with_backend<B, F>(wrap: F) -> Fixture
where
    B: BlobBackend + 'static,
    F: FnOnce(DiskBlobBackend) -> B,
{
    let dir = tempfile::tempdir().unwrap();
    let pool = test_pool().await;
    let disk = DiskBlobBackend::new(dir.path().join("blobs"));

    Fixture {
        metadata: Arc::new(SqliteMetadataStore::new(pool.clone())),
        blobs: Arc::new(wrap(disk)),
        pool,
        dir,
    }
}

pub const TEST_JWT_SECRET: &str = "test-secret-test-secret-test-secret";

/// Application context over a fresh fixture
pub async fn test_context(auth_required: bool) -> (AppContext, Fixture) {
    let fx = fixture().await;
    let config = ServerConfig {
        service: ServiceConfig {
            hostname: "localhost".to_string(),
            port: 0,
            version: "test".to_string(),
        },
        storage: StorageConfig {
            data_directory: fx.dir.path().to_path_buf(),
            metadata_db: fx.dir.path().join("files.sqlite"),
            blobstore: BlobstoreConfig::Disk {
                location: fx.dir.path().join("blobs"),
            },
        },
        ingest: IngestConfig {
            memory_threshold: crate::ingest::DEFAULT_MEMORY_THRESHOLD,
            peek_length: crate::files::coordinator::DEFAULT_PEEK_LENGTH,
            spool_directory: None,
        },
        authentication: AuthConfig {
            jwt_secret: Some(TEST_JWT_SECRET.to_string()),
            required: auth_required,
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
        },
    };

    let ctx = AppContext::with_stores(config, fx.pool.clone(), fx.blobs.clone());
    (ctx, fx)
}
