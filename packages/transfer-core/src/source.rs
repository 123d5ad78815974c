//! The readable side of a transfer: whatever supplies sub-chunk bytes
//! to the send pipeline.

use async_trait::async_trait;

use crate::error::{Error, Result};

/// A file-like object the send pipeline reads sub-chunks from.
#[async_trait]
pub trait SourceFile: Send + Sync {
    fn name(&self) -> &str;
    fn size(&self) -> u64;
    async fn read_range(&self, offset: u64, len: u32) -> Result<Vec<u8>>;
}

/// A [`SourceFile`] backed by a real file on disk.
pub struct TokioFileSource {
    name: String,
    size: u64,
    path: std::path::PathBuf,
}

impl TokioFileSource {
    pub async fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| Error::SourceRead(e.to_string()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unnamed".to_string());
        Ok(Self {
            name,
            size: metadata.len(),
            path,
        })
    }
}

#[async_trait]
impl SourceFile for TokioFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.size
    }

    async fn read_range(&self, offset: u64, len: u32) -> Result<Vec<u8>> {
        use tokio::io::{AsyncReadExt, AsyncSeekExt};

        let mut file = tokio::fs::File::open(&self.path)
            .await
            .map_err(|e| Error::SourceRead(e.to_string()))?;
        file.seek(std::io::SeekFrom::Start(offset))
            .await
            .map_err(|e| Error::SourceRead(e.to_string()))?;
        let mut buf = vec![0u8; len as usize];
        file.read_exact(&mut buf)
            .await
            .map_err(|e| Error::SourceRead(e.to_string()))?;
        Ok(buf)
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;

    /// An in-memory source backed by a byte vector, for pipeline tests.
    pub struct MemorySource {
        pub name: String,
        pub bytes: Vec<u8>,
    }

    #[async_trait]
    impl SourceFile for MemorySource {
        fn name(&self) -> &str {
            &self.name
        }

        fn size(&self) -> u64 {
            self.bytes.len() as u64
        }

        async fn read_range(&self, offset: u64, len: u32) -> Result<Vec<u8>> {
            let start = offset as usize;
            let end = start + len as usize;
            Ok(self.bytes[start..end].to_vec())
        }
    }
}
