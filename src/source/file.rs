//! Local file transport for `file://` locators.

use async_trait::async_trait;
use tokio::fs::File;
use tracing::{debug, instrument};

use super::{ByteStream, StreamSource, reader_stream};
use crate::error::FetchError;
use crate::locator::Locator;

/// Reads local files in [`CHUNK_SIZE`](super::CHUNK_SIZE) chunks.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSource;

impl FileSource {
    /// Creates a local file source.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StreamSource for FileSource {
    #[instrument(skip(self), fields(locator = %locator))]
    async fn open(&self, locator: &Locator) -> Result<ByteStream, FetchError> {
        let path = locator
            .url()
            .to_file_path()
            .map_err(|()| FetchError::unreachable(locator.as_str(), "not a local file path"))?;

        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| FetchError::unreachable(locator.as_str(), e))?;
        if metadata.is_dir() {
            return Err(FetchError::unreachable(locator.as_str(), "is a directory"));
        }

        let file = File::open(&path)
            .await
            .map_err(|e| FetchError::unreachable(locator.as_str(), e))?;
        debug!(path = %path.display(), bytes = metadata.len(), "file opened");

        Ok(reader_stream(file, locator.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::source::read_text;

    #[tokio::test]
    async fn test_file_source_reads_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "line one\nline two\n").unwrap();

        let locator = Locator::from_path(&path).unwrap();
        let text = read_text(&FileSource::new(), &locator).await.unwrap();
        assert_eq!(text, "line one\nline two\n");
    }

    #[tokio::test]
    async fn test_file_source_missing_file_is_unreachable() {
        let dir = tempfile::tempdir().unwrap();
        let locator = Locator::from_path(&dir.path().join("missing.txt")).unwrap();
        let result = FileSource::new().open(&locator).await;
        assert!(matches!(
            result,
            Err(FetchError::UnreachableResource { .. })
        ));
    }

    #[tokio::test]
    async fn test_file_source_directory_is_unreachable() {
        let dir = tempfile::tempdir().unwrap();
        let locator = Locator::from_path(dir.path()).unwrap();
        let result = FileSource::new().open(&locator).await;
        match result {
            Err(FetchError::UnreachableResource { reason, .. }) => {
                assert!(reason.contains("directory"), "got: {reason}");
            }
            Err(other) => panic!("expected UnreachableResource, got {other:?}"),
            Ok(_) => panic!("expected UnreachableResource, got a stream"),
        }
    }
}
