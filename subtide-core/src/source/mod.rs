//! Access to source video bytes behind one capability interface.
//!
//! The extraction pipeline never branches on where a video lives; it talks
//! to [`MediaSource`] and hands the locator string to the external tool.
//! Which backend serves a locator is decided once, at the wiring boundary,
//! by [`open_source`].

pub mod http;
pub mod local;

use std::ops::Range;

use async_trait::async_trait;
pub use http::HttpFileSource;
pub use local::LocalFileSource;

/// Errors that can occur while accessing source bytes.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The locator does not resolve to readable content.
    #[error("Source not found: {locator}")]
    NotFound {
        /// Locator that failed to resolve
        locator: String,
    },

    /// Byte range is invalid (start >= end).
    #[error("Invalid range: start {start} >= end {end}")]
    InvalidRange {
        /// Start byte position of the invalid range
        start: u64,
        /// End byte position of the invalid range
        end: u64,
    },

    /// Requested range extends beyond the source.
    #[error("Range {start}..{end} exceeds source size {size}")]
    RangeExceedsSource {
        /// Start byte position of the range
        start: u64,
        /// End byte position of the range
        end: u64,
        /// Total size of the source
        size: u64,
    },

    /// Remote server failed or answered outside the protocol.
    #[error("HTTP error for {url}: {reason}")]
    Http {
        /// URL of the failing request
        url: String,
        /// Description of the failure
        reason: String,
    },

    /// Underlying I/O operation failed.
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error
        #[from]
        source: std::io::Error,
    },
}

/// Result type for source access operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// Read-only access to one source video's bytes.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Locator string handed to external tools (a path or a URL).
    fn locator(&self) -> &str;

    /// Whether the source currently resolves to readable content.
    async fn exists(&self) -> bool;

    /// Total source size in bytes.
    ///
    /// # Errors
    /// - `SourceError::NotFound` - Locator does not resolve
    /// - `SourceError::Http` / `SourceError::Io` - Backend access failed
    async fn file_size(&self) -> SourceResult<u64>;

    /// Reads the byte range `range.start..range.end`.
    ///
    /// # Errors
    /// - `SourceError::InvalidRange` - Malformed range
    /// - `SourceError::RangeExceedsSource` - Range beyond source size
    /// - `SourceError::Http` / `SourceError::Io` - Backend access failed
    async fn read_range(&self, range: Range<u64>) -> SourceResult<Vec<u8>>;
}

/// Opens the backend matching the locator's scheme: HTTP(S) URLs are served
/// remotely, everything else is treated as a local path.
pub fn open_source(locator: &str) -> SourceResult<Box<dyn MediaSource>> {
    if locator.starts_with("http://") || locator.starts_with("https://") {
        Ok(Box::new(HttpFileSource::new(locator)?))
    } else {
        Ok(Box::new(LocalFileSource::new(locator)))
    }
}

/// Validates that a byte range is well-formed and within `size`.
///
/// # Errors
/// - `SourceError::InvalidRange` if start >= end
/// - `SourceError::RangeExceedsSource` if the range extends beyond `size`
pub fn validate_range(range: &Range<u64>, size: u64) -> SourceResult<()> {
    if range.start >= range.end {
        return Err(SourceError::InvalidRange {
            start: range.start,
            end: range.end,
        });
    }
    if range.end > size {
        return Err(SourceError::RangeExceedsSource {
            start: range.start,
            end: range.end,
            size,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_range() {
        assert!(validate_range(&(0..10), 10).is_ok());
        assert!(matches!(
            validate_range(&(5..5), 10),
            Err(SourceError::InvalidRange { .. })
        ));
        assert!(matches!(
            validate_range(&(0..11), 10),
            Err(SourceError::RangeExceedsSource { .. })
        ));
    }

    #[test]
    fn test_open_source_picks_backend_by_scheme() {
        let local = open_source("/media/movie.mkv").unwrap();
        assert_eq!(local.locator(), "/media/movie.mkv");

        let remote = open_source("https://media.example/movie.mkv").unwrap();
        assert_eq!(remote.locator(), "https://media.example/movie.mkv");
    }
}
