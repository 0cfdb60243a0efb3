/// Configuration management for Aurora Vault
use crate::{
    error::{VaultError, VaultResult},
    files::coordinator::DEFAULT_PEEK_LENGTH,
    ingest::{IngestOptions, DEFAULT_MEMORY_THRESHOLD},
    validation::MIN_PREFIX_LEN,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub ingest: IngestConfig,
    pub authentication: AuthConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub version: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub metadata_db: PathBuf,
    pub blobstore: BlobstoreConfig,
}

/// Blob storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BlobstoreConfig {
    Disk { location: PathBuf },
}

/// Section body buffering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Bytes held in memory before a body spills to a temp file
    pub memory_threshold: usize,
    /// Bytes sniffed from each file for signature checks
    pub peek_length: usize,
    pub spool_directory: Option<PathBuf>,
}

impl IngestConfig {
    pub fn options(&self) -> IngestOptions {
        IngestOptions {
            memory_threshold: self.memory_threshold,
            spool_directory: self.spool_directory.clone(),
        }
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 secret for bearer tokens
    pub jwt_secret: Option<String>,
    /// Reject requests without a valid token
    pub required: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, e.g. `aurora_vault=debug,tower_http=info`
    pub level: String,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> VaultResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("VAULT_HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("VAULT_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| VaultError::Configuration("Invalid port number".to_string()))?;
        let version = env::var("VAULT_VERSION")
            .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string());

        let data_directory: PathBuf = env::var("VAULT_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let metadata_db = env::var("VAULT_METADATA_DB")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("files.sqlite"));
        let blobstore = BlobstoreConfig::Disk {
            location: env::var("VAULT_BLOBSTORE_DISK_LOCATION")
                .map(PathBuf::from)
                .unwrap_or_else(|_| data_directory.join("blobs")),
        };

        let memory_threshold = env::var("VAULT_INGEST_MEMORY_THRESHOLD")
            .map(|v| v.parse())
            .unwrap_or(Ok(DEFAULT_MEMORY_THRESHOLD))
            .map_err(|_| VaultError::Configuration("Invalid ingest memory threshold".to_string()))?;
        let peek_length = env::var("VAULT_INGEST_PEEK_LENGTH")
            .map(|v| v.parse())
            .unwrap_or(Ok(DEFAULT_PEEK_LENGTH))
            .map_err(|_| VaultError::Configuration("Invalid ingest peek length".to_string()))?;
        let spool_directory = env::var("VAULT_INGEST_SPOOL_DIRECTORY").ok().map(PathBuf::from);

        let jwt_secret = env::var("VAULT_JWT_SECRET").ok().filter(|s| !s.is_empty());
        let auth_required = env::var("VAULT_AUTH_REQUIRED")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);

        let log_level = env::var("VAULT_LOG_LEVEL")
            .or_else(|_| env::var("RUST_LOG"))
            .unwrap_or_else(|_| "aurora_vault=debug,tower_http=debug".to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                version,
            },
            storage: StorageConfig {
                data_directory,
                metadata_db,
                blobstore,
            },
            ingest: IngestConfig {
                memory_threshold,
                peek_length,
                spool_directory,
            },
            authentication: AuthConfig {
                jwt_secret,
                required: auth_required,
            },
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> VaultResult<()> {
        if self.service.hostname.is_empty() {
            return Err(VaultError::Configuration("Hostname cannot be empty".to_string()));
        }

        if self.authentication.required {
            match &self.authentication.jwt_secret {
                None => {
                    return Err(VaultError::Configuration(
                        "JWT secret required when authentication is enabled".to_string(),
                    ))
                }
                Some(secret) if secret.len() < 32 => {
                    return Err(VaultError::Configuration(
                        "JWT secret must be at least 32 characters".to_string(),
                    ))
                }
                Some(_) => {}
            }
        }

        if self.ingest.peek_length < MIN_PREFIX_LEN {
            return Err(VaultError::Configuration(format!(
                "Ingest peek length must be at least {} bytes",
                MIN_PREFIX_LEN
            )));
        }

        // The sniffed prefix has to fit in memory
        if self.ingest.peek_length > self.ingest.memory_threshold {
            return Err(VaultError::Configuration(
                "Ingest peek length cannot exceed the memory threshold".to_string(),
            ));
        }

        Ok(())
    }
}
