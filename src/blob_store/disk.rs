/// Disk-based blob storage backend
use crate::{
    blob_store::{BlobBackend, BlobReader, ByteRange, ByteStream},
    error::{VaultError, VaultResult},
};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Disk storage backend
///
/// Stores blobs on the local filesystem with directory sharding
/// based on key prefixes to prevent too many files in one directory.
#[derive(Clone)]
pub struct DiskBlobBackend {
    base_path: PathBuf,
}

impl DiskBlobBackend {
    /// Create a new disk storage backend
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    /// Get the file path for a key
    ///
    /// Uses directory sharding: {base}/{first2chars}/{key}
    fn get_blob_path(&self, key: &str) -> PathBuf {
        if key.len() >= 2 && key.is_char_boundary(2) {
            let shard = &key[0..2];
            self.base_path.join(shard).join(key)
        } else {
            self.base_path.join("_").join(key)
        }
    }

    /// Ensure the directory for a blob exists
    async fn ensure_blob_dir(&self, key: &str) -> VaultResult<PathBuf> {
        let blob_path = self.get_blob_path(key);
        if let Some(parent) = blob_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                VaultError::BlobStorage(format!("Failed to create blob directory: {}", e))
            })?;
        }
        Ok(blob_path)
    }

    /// Copy the body into `path`, returning the byte count
    async fn write_body(path: &Path, mut body: ByteStream<'_>) -> std::io::Result<u64> {
        let mut file = fs::File::create(path).await?;
        let mut written = 0u64;

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        file.flush().await?;
        file.sync_all().await?;
        Ok(written)
    }
}

/// Sibling path used while a blob is being written
fn part_path_for(blob_path: &Path) -> PathBuf {
    let mut name = blob_path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Rejects keys that could escape the base directory
fn check_key(key: &str) -> VaultResult<()> {
    if key.is_empty() || key.contains('/') || key.contains('\\') || key.contains("..") {
        return Err(VaultError::BlobStorage(format!("Invalid blob key '{}'", key)));
    }
    Ok(())
}

#[async_trait]
impl BlobBackend for DiskBlobBackend {
    async fn upload(&self, key: &str, body: ByteStream<'_>) -> VaultResult<Option<String>> {
        check_key(key)?;
        let blob_path = self.ensure_blob_dir(key).await?;

        // Readers only ever see the final name
        let part_path = part_path_for(&blob_path);

        match Self::write_body(&part_path, body).await {
            Ok(written) => {
                fs::rename(&part_path, &blob_path).await.map_err(|e| {
                    VaultError::BlobStorage(format!("Failed to finalize blob {}: {}", key, e))
                })?;
                tracing::debug!(key = %key, bytes = written, "Stored blob on disk");
                Ok(Some(blob_path.to_string_lossy().into_owned()))
            }
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(&part_path).await {
                    tracing::warn!(key = %key, error = %cleanup, "Failed to remove partial blob");
                }
                Err(VaultError::BlobStorage(format!(
                    "Failed to write blob {}: {}",
                    key, e
                )))
            }
        }
    }

    async fn download(&self, key: &str, range: Option<ByteRange>) -> VaultResult<BlobReader> {
        check_key(key)?;
        let blob_path = self.get_blob_path(key);

        let mut file = match fs::File::open(&blob_path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(VaultError::NotFound(format!("Blob '{}' not found", key)));
            }
            Err(e) => {
                return Err(VaultError::BlobStorage(format!(
                    "Failed to open blob {}: {}",
                    key, e
                )));
            }
        };

        let size = file
            .metadata()
            .await
            .map_err(|e| VaultError::BlobStorage(format!("Failed to stat blob {}: {}", key, e)))?
            .len();

        let resolved = range.and_then(|r| r.resolve(size));
        let (start, mut remaining) = match resolved {
            Some((start, end)) => (start, end - start + 1),
            None => (0, size),
        };

        if start > 0 {
            file.seek(SeekFrom::Start(start)).await.map_err(|e| {
                VaultError::BlobStorage(format!("Failed to seek blob {}: {}", key, e))
            })?;
        }

        let stream = async_stream::stream! {
            let mut buf = vec![0u8; READ_CHUNK_SIZE];
            while remaining > 0 {
                let want = remaining.min(READ_CHUNK_SIZE as u64) as usize;
                match file.read(&mut buf[..want]).await {
                    Ok(0) => break,
                    Ok(n) => {
                        remaining -= n as u64;
                        yield Ok(Bytes::copy_from_slice(&buf[..n]));
                    }
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }
        };

        Ok(BlobReader {
            stream: Box::pin(stream),
            size,
            range: resolved,
        })
    }

    async fn exists(&self, key: &str) -> VaultResult<bool> {
        check_key(key)?;
        let blob_path = self.get_blob_path(key);
        fs::try_exists(&blob_path)
            .await
            .map_err(|e| VaultError::BlobStorage(format!("Failed to stat blob {}: {}", key, e)))
    }
}
