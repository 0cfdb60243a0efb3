/// Rewindable section body
///
/// Bytes pulled from the section before it is streamed onward are kept in a
/// spool: in memory up to the configured threshold, then in an anonymous
/// temporary file. Streaming always replays the spool from offset zero and
/// then continues with the unread remainder of the section, so a peek never
/// loses data and peak memory stays bounded by the threshold.
use crate::{
    blob_store::ByteStream,
    error::{VaultError, VaultResult},
};
use bytes::{Bytes, BytesMut};
use multer::Field;
use std::io::{self, SeekFrom};
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

const REPLAY_CHUNK_SIZE: usize = 64 * 1024;

enum Spool {
    Memory(BytesMut),
    Disk { file: File, len: u64 },
}

impl Spool {
    fn len(&self) -> u64 {
        match self {
            Spool::Memory(buf) => buf.len() as u64,
            Spool::Disk { len, .. } => *len,
        }
    }
}

/// Body of a file section with peek support
pub struct SpooledBody<'r> {
    source: Field<'r>,
    spool: Spool,
    threshold: usize,
    spool_directory: Option<PathBuf>,
    exhausted: bool,
}

impl<'r> SpooledBody<'r> {
    pub(crate) fn new(source: Field<'r>, threshold: usize, spool_directory: Option<PathBuf>) -> Self {
        Self {
            source,
            spool: Spool::Memory(BytesMut::new()),
            threshold,
            spool_directory,
            exhausted: false,
        }
    }

    /// Read up to `n` leading bytes without consuming them
    ///
    /// Fewer than `n` bytes are returned only if the section is shorter.
    pub async fn peek(&mut self, n: usize) -> VaultResult<Bytes> {
        while self.spool.len() < n as u64 && !self.exhausted {
            match self.source.chunk().await {
                Ok(Some(chunk)) => self.append(chunk).await?,
                Ok(None) => self.exhausted = true,
                Err(e) => {
                    return Err(VaultError::MalformedRequest(format!(
                        "Failed to read section body: {}",
                        e
                    )))
                }
            }
        }

        self.prefix(n).await
    }

    /// True once the spool moved to a temporary file
    #[cfg(test)]
    pub fn spilled(&self) -> bool {
        matches!(self.spool, Spool::Disk { .. })
    }

    /// Bytes currently held by the spool
    #[cfg(test)]
    pub fn buffered_len(&self) -> u64 {
        self.spool.len()
    }

    async fn append(&mut self, chunk: Bytes) -> VaultResult<()> {
        match &mut self.spool {
            Spool::Memory(buf) if buf.len() + chunk.len() <= self.threshold => {
                buf.extend_from_slice(&chunk);
            }
            Spool::Memory(buf) => {
                let std_file = match &self.spool_directory {
                    Some(dir) => tempfile::tempfile_in(dir)?,
                    None => tempfile::tempfile()?,
                };
                let mut file = File::from_std(std_file);
                file.write_all(&buf[..]).await?;
                file.write_all(&chunk).await?;
                let len = (buf.len() + chunk.len()) as u64;

                tracing::debug!(bytes = len, "Section body spilled to temporary file");
                self.spool = Spool::Disk { file, len };
            }
            Spool::Disk { file, len } => {
                file.write_all(&chunk).await?;
                *len += chunk.len() as u64;
            }
        }
        Ok(())
    }

    async fn prefix(&mut self, n: usize) -> VaultResult<Bytes> {
        match &mut self.spool {
            Spool::Memory(buf) => {
                let end = n.min(buf.len());
                Ok(Bytes::copy_from_slice(&buf[..end]))
            }
            Spool::Disk { file, len } => {
                let want = (n as u64).min(*len) as usize;
                let mut head = vec![0u8; want];
                file.seek(SeekFrom::Start(0)).await?;
                file.read_exact(&mut head).await?;
                file.seek(SeekFrom::End(0)).await?;
                Ok(Bytes::from(head))
            }
        }
    }

    /// Rewind to the first byte and stream the whole section
    pub fn into_stream(self) -> ByteStream<'r> {
        let SpooledBody {
            mut source,
            spool,
            exhausted,
            ..
        } = self;

        let stream = async_stream::stream! {
            match spool {
                Spool::Memory(buf) => {
                    if !buf.is_empty() {
                        yield Ok(buf.freeze());
                    }
                }
                Spool::Disk { mut file, .. } => {
                    if let Err(e) = file.seek(SeekFrom::Start(0)).await {
                        yield Err(e);
                        return;
                    }
                    let mut buf = vec![0u8; REPLAY_CHUNK_SIZE];
                    loop {
                        match file.read(&mut buf).await {
                            Ok(0) => break,
                            Ok(n) => {
                                yield Ok(Bytes::copy_from_slice(&buf[..n]));
                            }
                            Err(e) => {
                                yield Err(e);
                                return;
                            }
                        }
                    }
                }
            }

            if !exhausted {
                loop {
                    match source.chunk().await {
                        Ok(Some(chunk)) => {
                            yield Ok(chunk);
                        }
                        Ok(None) => break,
                        Err(e) => {
                            yield Err(io::Error::new(io::ErrorKind::InvalidData, e.to_string()));
                            return;
                        }
                    }
                }
            }
        };

        Box::pin(stream)
    }
}
