//! The writable side of a transfer: whatever absorbs verified
//! sub-chunk bytes from the receive pipeline.

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// A file-like object the receive pipeline writes verified sub-chunks
/// to, in flat-index order.
#[async_trait]
pub trait SinkFile: Send + Sync {
    /// Write a verified sub-chunk at `offset`. Implementations may
    /// hold out-of-order writes in a small internal buffer, but must
    /// never reorder what eventually lands on disk.
    async fn write_at(&mut self, offset: u64, bytes: &[u8]) -> Result<()>;

    /// Flush and finalize. Called once after every sub-chunk has been
    /// written.
    async fn finish(&mut self) -> Result<()>;
}

/// A [`SinkFile`] backed by a real file on disk.
///
/// Sub-chunks normally arrive close to flat-index order since the
/// sender streams them in order, but the channel itself may reorder
/// frames across different flat indexes. Writes that arrive out of
/// order relative to `next_offset` are held in a small buffer and
/// flushed once the gap closes, keeping the file handle itself purely
/// sequential.
pub struct TokioFileSink {
    file: tokio::fs::File,
    next_offset: u64,
    pending: BTreeMap<u64, Vec<u8>>,
}

impl TokioFileSink {
    pub async fn create(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let file = tokio::fs::File::create(path.as_ref())
            .await
            .map_err(|e| Error::SinkWrite(e.to_string()))?;
        Ok(Self {
            file,
            next_offset: 0,
            pending: BTreeMap::new(),
        })
    }

    async fn write_sequential(&mut self, bytes: &[u8]) -> Result<()> {
        use tokio::io::AsyncWriteExt;
        self.file
            .write_all(bytes)
            .await
            .map_err(|e| Error::SinkWrite(e.to_string()))?;
        self.next_offset += bytes.len() as u64;
        Ok(())
    }
}

#[async_trait]
impl SinkFile for TokioFileSink {
    async fn write_at(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        if offset == self.next_offset {
            self.write_sequential(bytes).await?;
            // Drain any now-contiguous buffered writes.
            while let Some(next_bytes) = self.pending.remove(&self.next_offset) {
                self.write_sequential(&next_bytes).await?;
            }
            Ok(())
        } else {
            self.pending.insert(offset, bytes.to_vec());
            Ok(())
        }
    }

    async fn finish(&mut self) -> Result<()> {
        use tokio::io::AsyncWriteExt;
        debug_assert!(
            self.pending.is_empty(),
            "finish called with unflushed out-of-order writes"
        );
        self.file
            .flush()
            .await
            .map_err(|e| Error::SinkWrite(e.to_string()))
    }
}
