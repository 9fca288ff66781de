//! Local filesystem source backend.

use std::io::SeekFrom;
use std::ops::Range;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::debug;

use super::{MediaSource, SourceError, SourceResult, validate_range};

/// [`MediaSource`] over a file on the local filesystem.
pub struct LocalFileSource {
    path: PathBuf,
    locator: String,
}

impl LocalFileSource {
    /// Creates a source over `path`. No I/O happens until first access.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let locator = path.display().to_string();
        Self { path, locator }
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl MediaSource for LocalFileSource {
    fn locator(&self) -> &str {
        &self.locator
    }

    async fn exists(&self) -> bool {
        tokio::fs::try_exists(&self.path).await.unwrap_or(false)
    }

    async fn file_size(&self) -> SourceResult<u64> {
        match tokio::fs::metadata(&self.path).await {
            Ok(metadata) => Ok(metadata.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(SourceError::NotFound {
                locator: self.locator.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_range(&self, range: Range<u64>) -> SourceResult<Vec<u8>> {
        let size = self.file_size().await?;
        validate_range(&range, size)?;

        debug!(
            "Reading {}..{} from {}",
            range.start, range.end, self.locator
        );

        let mut file = tokio::fs::File::open(&self.path).await?;
        file.seek(SeekFrom::Start(range.start)).await?;

        let mut buffer = vec![0u8; (range.end - range.start) as usize];
        file.read_exact(&mut buffer).await?;
        Ok(buffer)
    }
}
