/// Application context and dependency injection
use crate::{
    blob_store::{disk::DiskBlobBackend, BlobBackend},
    config::{BlobstoreConfig, ServerConfig},
    db,
    error::{VaultError, VaultResult},
    files::{DownloadGate, UploadCoordinator},
    metadata::{MetadataStore, SqliteMetadataStore},
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub coordinator: Arc<UploadCoordinator>,
    pub gate: Arc<DownloadGate>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> VaultResult<Self> {
        // Validate configuration
        config.validate()?;

        // Create data directories if they don't exist
        Self::ensure_directories(&config).await?;

        // Initialize metadata database
        let metadata_db =
            db::create_pool(&config.storage.metadata_db, db::DatabaseOptions::default()).await?;
        db::run_migrations(&metadata_db).await?;
        db::test_connection(&metadata_db).await?;

        // Initialize blob store
        let blobs: Arc<dyn BlobBackend> = match &config.storage.blobstore {
            BlobstoreConfig::Disk { location } => {
                tracing::info!("Using disk blob storage at {:?}", location);
                Arc::new(DiskBlobBackend::new(location.clone()))
            }
        };

        Ok(Self::with_stores(config, metadata_db, blobs))
    }

    /// Wire services over already opened stores
    pub fn with_stores(
        config: ServerConfig,
        metadata_db: SqlitePool,
        blobs: Arc<dyn BlobBackend>,
    ) -> Self {
        let metadata: Arc<dyn MetadataStore> =
            Arc::new(SqliteMetadataStore::new(metadata_db));

        let coordinator = Arc::new(UploadCoordinator::new(
            metadata.clone(),
            blobs.clone(),
            config.ingest.options(),
            config.ingest.peek_length,
        ));
        let gate = Arc::new(DownloadGate::new(metadata, blobs));

        Self {
            config: Arc::new(config),
            coordinator,
            gate,
        }
    }

    /// Ensure required directories exist
    async fn ensure_directories(config: &ServerConfig) -> VaultResult<()> {
        let mut dirs = vec![&config.storage.data_directory];
        if let Some(spool) = &config.ingest.spool_directory {
            dirs.push(spool);
        }

        for dir in dirs {
            if !dir.exists() {
                tokio::fs::create_dir_all(dir).await.map_err(|e| {
                    VaultError::Internal(format!("Failed to create directory {:?}: {}", dir, e))
                })?;
            }
        }

        // Create blob storage directories if using disk storage
        let BlobstoreConfig::Disk { location } = &config.storage.blobstore;
        tokio::fs::create_dir_all(location).await?;

        Ok(())
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }
}
