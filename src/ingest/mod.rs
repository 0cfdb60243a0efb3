/// Section ingester
///
/// Turns a boundary token and a raw byte stream into a forward-only,
/// single-pass sequence of sections. Sections arrive strictly in order; a
/// section must be dropped before the next one is requested.

pub mod spool;

pub use spool::SpooledBody;

use crate::error::{VaultError, VaultResult};
use bytes::Bytes;
use futures::Stream;
use multer::{Field, Multipart};
use std::path::PathBuf;

/// Default in-memory budget for a section body before it spills to disk
pub const DEFAULT_MEMORY_THRESHOLD: usize = 1024 * 1024;

/// Leading bytes of a simple field kept once the field is drained
pub const FIELD_PREVIEW_LEN: usize = 256;

/// Buffering options for file section bodies
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub memory_threshold: usize,
    /// Directory for spill files; system temp dir when unset
    pub spool_directory: Option<PathBuf>,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            memory_threshold: DEFAULT_MEMORY_THRESHOLD,
            spool_directory: None,
        }
    }
}

/// Parsed Content-Disposition of a section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disposition {
    pub name: Option<String>,
    pub filename: Option<String>,
}

/// What is left of a simple field after it has been read through
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPreview {
    /// Leading bytes, lossily decoded
    pub text: String,
    /// Full length of the field in bytes
    pub len: u64,
}

impl FieldPreview {
    pub fn truncated(&self) -> bool {
        self.len > self.text.len() as u64
    }
}

/// One part of a multi-section body
pub struct Section<'r> {
    index: usize,
    disposition: Option<Disposition>,
    content_type: Option<String>,
    field: Field<'r>,
    options: IngestOptions,
}

impl<'r> Section<'r> {
    /// Position of the section in the request, from zero
    pub fn index(&self) -> usize {
        self.index
    }

    /// None when the section carried no Content-Disposition header
    pub fn disposition(&self) -> Option<&Disposition> {
        self.disposition.as_ref()
    }

    /// Declared Content-Type of the section, verbatim
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Read a simple field to the end, keeping at most `limit` leading bytes
    pub async fn into_preview(mut self, limit: usize) -> VaultResult<FieldPreview> {
        let index = self.index;
        let mut head = Vec::new();
        let mut len = 0u64;

        while let Some(chunk) = self.field.chunk().await.map_err(|e| {
            VaultError::MalformedRequest(format!("Failed to read section {}: {}", index, e))
        })? {
            len += chunk.len() as u64;
            let room = limit.saturating_sub(head.len());
            head.extend_from_slice(&chunk[..room.min(chunk.len())]);
        }

        Ok(FieldPreview {
            text: String::from_utf8_lossy(&head).into_owned(),
            len,
        })
    }

    /// Wrap the body for peeking and streaming
    pub fn into_body(self) -> SpooledBody<'r> {
        SpooledBody::new(
            self.field,
            self.options.memory_threshold,
            self.options.spool_directory,
        )
    }
}

/// Lazy reader over the sections of one request body
pub struct SectionIngester<'r> {
    multipart: Multipart<'r>,
    options: IngestOptions,
    next_index: usize,
}

impl<'r> SectionIngester<'r> {
    pub fn new<S, O, E>(stream: S, boundary: impl Into<String>, options: IngestOptions) -> Self
    where
        S: Stream<Item = Result<O, E>> + Send + 'r,
        O: Into<Bytes> + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + 'r,
    {
        Self {
            multipart: Multipart::new(stream, boundary),
            options,
            next_index: 0,
        }
    }

    /// Advance to the next section
    ///
    /// Errors here mean the framing itself is broken and nothing after this
    /// point can be read.
    pub async fn next_section(&mut self) -> VaultResult<Option<Section<'r>>> {
        let field = self.multipart.next_field().await.map_err(|e| {
            VaultError::MalformedRequest(format!("Failed to read multipart section: {}", e))
        })?;

        let Some(field) = field else {
            return Ok(None);
        };

        let index = self.next_index;
        self.next_index += 1;

        let disposition = field
            .headers()
            .contains_key(axum::http::header::CONTENT_DISPOSITION)
            .then(|| Disposition {
                name: field.name().map(String::from),
                filename: field.file_name().map(String::from),
            });

        let content_type = field.content_type().map(|mime| mime.to_string());

        tracing::debug!(
            index,
            name = ?disposition.as_ref().and_then(|d| d.name.as_deref()),
            filename = ?disposition.as_ref().and_then(|d| d.filename.as_deref()),
            "Read section headers"
        );

        Ok(Some(Section {
            index,
            disposition,
            content_type,
            field,
            options: self.options.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{collect, multipart_stream, MultipartBuilder, BOUNDARY};

    #[tokio::test]
    async fn test_sections_arrive_in_order() {
        let body = MultipartBuilder::new()
            .field("description", "quarterly report")
            .file("file", "a.pdf", "application/pdf", b"%PDF-1.7 body")
            .file("file", "b.png", "image/png", b"\x89PNG\r\n\x1a\nrest")
            .build();

        let mut ingester =
            SectionIngester::new(multipart_stream(body, 7), BOUNDARY, IngestOptions::default());

        let first = ingester.next_section().await.unwrap().unwrap();
        assert_eq!(first.index(), 0);
        assert!(first.disposition().unwrap().filename.is_none());
        assert_eq!(first.disposition().unwrap().name.as_deref(), Some("description"));
        let preview = first.into_preview(FIELD_PREVIEW_LEN).await.unwrap();
        assert_eq!(preview.text, "quarterly report");
        assert!(!preview.truncated());

        let second = ingester.next_section().await.unwrap().unwrap();
        assert_eq!(second.content_type(), Some("application/pdf"));
        assert_eq!(second.disposition().unwrap().filename.as_deref(), Some("a.pdf"));
        drop(second);

        let third = ingester.next_section().await.unwrap().unwrap();
        assert_eq!(third.index(), 2);
        assert_eq!(third.disposition().unwrap().filename.as_deref(), Some("b.png"));
        let stream = third.into_body().into_stream();
        assert_eq!(collect(stream).await, b"\x89PNG\r\n\x1a\nrest".to_vec());

        assert!(ingester.next_section().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_disposition_is_reported() {
        let body = MultipartBuilder::new()
            .raw_part("Content-Type: text/plain", b"orphan")
            .build();

        let mut ingester =
            SectionIngester::new(multipart_stream(body, 64), BOUNDARY, IngestOptions::default());

        let section = ingester.next_section().await.unwrap().unwrap();
        assert!(section.disposition().is_none());
    }

    #[tokio::test]
    async fn test_long_field_keeps_bounded_preview() {
        let value = "x".repeat(100_000);
        let body = MultipartBuilder::new()
            .field("notes", &value)
            .file("file", "a.pdf", "application/pdf", b"%PDF-1.7")
            .build();

        let mut ingester =
            SectionIngester::new(multipart_stream(body, 4096), BOUNDARY, IngestOptions::default());

        let field = ingester.next_section().await.unwrap().unwrap();
        let preview = field.into_preview(16).await.unwrap();
        assert_eq!(preview.text, "x".repeat(16));
        assert_eq!(preview.len, 100_000);
        assert!(preview.truncated());

        // The stream still advances past the whole field
        let file = ingester.next_section().await.unwrap().unwrap();
        assert_eq!(file.disposition().unwrap().filename.as_deref(), Some("a.pdf"));
    }

    #[tokio::test]
    async fn test_broken_framing_is_malformed() {
        let body = b"this is not multipart at all".to_vec();
        let mut ingester =
            SectionIngester::new(multipart_stream(body, 64), BOUNDARY, IngestOptions::default());

        let result = ingester.next_section().await;
        assert!(matches!(result, Err(VaultError::MalformedRequest(_))));
    }

    #[tokio::test]
    async fn test_peek_then_stream_replays_from_start() {
        let content: Vec<u8> = (0..200u8).collect();
        let body = MultipartBuilder::new()
            .file("file", "a.pdf", "application/pdf", &content)
            .build();

        let mut ingester =
            SectionIngester::new(multipart_stream(body, 5), BOUNDARY, IngestOptions::default());
        let section = ingester.next_section().await.unwrap().unwrap();

        let mut spooled = section.into_body();
        let head = spooled.peek(32).await.unwrap();
        assert_eq!(&head[..], &content[..32]);
        assert!(!spooled.spilled());

        // Peeking twice doesn't consume anything
        let again = spooled.peek(8).await.unwrap();
        assert_eq!(&again[..], &content[..8]);

        assert_eq!(collect(spooled.into_stream()).await, content);
    }

    #[tokio::test]
    async fn test_body_spills_past_threshold() {
        let content: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
        let body = MultipartBuilder::new()
            .file("file", "big.pdf", "application/pdf", &content)
            .build();

        let spill_dir = tempfile::tempdir().unwrap();
        let options = IngestOptions {
            memory_threshold: 16,
            spool_directory: Some(spill_dir.path().to_path_buf()),
        };

        let mut ingester = SectionIngester::new(multipart_stream(body, 1024), BOUNDARY, options);
        let section = ingester.next_section().await.unwrap().unwrap();

        let mut spooled = section.into_body();
        let head = spooled.peek(32).await.unwrap();
        assert_eq!(&head[..], &content[..32]);
        assert!(spooled.spilled());
        assert!(spooled.buffered_len() >= 32);

        assert_eq!(collect(spooled.into_stream()).await, content);
    }

    #[tokio::test]
    async fn test_peek_on_short_body() {
        let body = MultipartBuilder::new()
            .file("file", "tiny.pdf", "application/pdf", b"%P")
            .build();

        let mut ingester =
            SectionIngester::new(multipart_stream(body, 64), BOUNDARY, IngestOptions::default());
        let section = ingester.next_section().await.unwrap().unwrap();

        let mut spooled = section.into_body();
        assert_eq!(&spooled.peek(32).await.unwrap()[..], b"%P");
        assert_eq!(collect(spooled.into_stream()).await, b"%P".to_vec());
    }
}
