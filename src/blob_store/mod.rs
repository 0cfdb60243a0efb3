/// Blob Storage System
///
/// Durable byte storage addressed by opaque keys. Bodies move in and out as
/// streams so no backend needs to hold a whole file in memory.

pub mod disk;

use crate::error::VaultResult;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

/// Stream of bytes for blob content
pub type ByteStream<'a> = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send + 'a>>;

/// Requested byte window, `end` inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: Option<u64>,
    /// Suffix length for `bytes=-N` requests
    pub suffix: Option<u64>,
}

impl ByteRange {
    pub fn new(start: u64, end: Option<u64>) -> Self {
        Self {
            start,
            end,
            suffix: None,
        }
    }

    pub fn last(len: u64) -> Self {
        Self {
            start: 0,
            end: None,
            suffix: Some(len),
        }
    }

    /// Resolve against the blob size into inclusive (start, end)
    ///
    /// Returns None if the range can't be satisfied.
    pub fn resolve(&self, total_size: u64) -> Option<(u64, u64)> {
        if total_size == 0 {
            return None;
        }

        if let Some(suffix) = self.suffix {
            if suffix == 0 {
                return None;
            }
            return Some((total_size.saturating_sub(suffix), total_size - 1));
        }

        if self.start >= total_size {
            return None;
        }

        // Clamp end to the last byte
        let end = self.end.unwrap_or(total_size - 1).min(total_size - 1);
        if self.start <= end {
            Some((self.start, end))
        } else {
            None
        }
    }
}

/// An opened blob
pub struct BlobReader {
    pub stream: ByteStream<'static>,
    /// Total size of the stored blob
    pub size: u64,
    /// Window actually served, if a range was satisfied
    pub range: Option<(u64, u64)>,
}

impl BlobReader {
    /// Number of bytes the stream will yield
    pub fn content_length(&self) -> u64 {
        match self.range {
            Some((start, end)) => end - start + 1,
            None => self.size,
        }
    }
}

/// Blob storage backend trait
#[async_trait]
pub trait BlobBackend: Send + Sync {
    /// Store a stream under `key`, returning the stored location
    ///
    /// `None` means the backend accepted the call but can't report where the
    /// bytes went; callers treat that as a failed write.
    async fn upload(&self, key: &str, body: ByteStream<'_>) -> VaultResult<Option<String>>;

    /// Open a blob for reading; a missing blob is `VaultError::NotFound`
    async fn download(&self, key: &str, range: Option<ByteRange>) -> VaultResult<BlobReader>;

    /// Check if a blob exists
    async fn exists(&self, key: &str) -> VaultResult<bool>;
}
