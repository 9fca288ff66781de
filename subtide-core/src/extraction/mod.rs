//! Extraction decision pipeline.
//!
//! Classified subtitle streams are processed independently: decide whether
//! extraction is needed at all, drive the external tool per stream under a
//! hard timeout, validate what it produced, derive the artifact's content
//! identifier, and link it back to the source video. A failure on one
//! stream never aborts its siblings.

pub mod extractor;
pub mod filename;
pub mod orchestrator;

pub use extractor::{FfmpegStreamExtractor, SimulationStreamExtractor, StreamExtractor};
pub use filename::{artifact_file_name, sanitize_title};
pub use orchestrator::{
    ExtractionEngine, ExtractionOutcome, ExtractionRequest, RunReport, RunStatus,
};

use crate::metadata::LinkError;

/// Errors that can occur while extracting a single stream.
///
/// All of these are scoped to one stream; the orchestrator records them in
/// the stream's outcome and moves on.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// The external tool could not be spawned or exited with failure.
    #[error("Extraction tool failed: {reason}")]
    ToolFailed {
        /// Description of the tool failure
        reason: String,
    },

    /// The external tool exceeded its wall-clock bound and was killed.
    #[error("Extraction tool timed out after {seconds}s")]
    ToolTimeout {
        /// The bound that was exceeded, in seconds
        seconds: u64,
    },

    /// The tool exited successfully but what it produced is unusable.
    #[error("Artifact rejected: {reason}")]
    ArtifactRejected {
        /// Why the artifact was discarded
        reason: String,
    },

    /// Metadata linking failed.
    #[error("Link error: {source}")]
    Link {
        /// The underlying link error
        #[from]
        source: LinkError,
    },

    /// Underlying I/O operation failed.
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error
        #[from]
        source: std::io::Error,
    },
}

/// Result type for per-stream extraction operations.
pub type ExtractionResult<T> = Result<T, ExtractionError>;
