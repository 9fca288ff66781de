//! Subtide Core - Subtitle track extraction with content-addressed artifacts
//!
//! This crate provides the building blocks for pulling text-based subtitle
//! tracks out of video containers and publishing each one as an
//! independently content-addressed artifact: deterministic content
//! identifiers, subtitle stream classification, the extraction pipeline
//! around the external tool, and the metadata link back to the source video.

pub mod cid;
pub mod config;
pub mod extraction;
pub mod metadata;
pub mod source;
pub mod streams;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use cid::{CidError, ContentId};
pub use config::{ExtractionConfig, RunOptions, ServerConfig, SubtideConfig};
pub use extraction::{
    ExtractionEngine, ExtractionError, ExtractionOutcome, ExtractionRequest,
    FfmpegStreamExtractor, RunReport, RunStatus, SimulationStreamExtractor, StreamExtractor,
};
pub use metadata::{
    HttpMetadataLink, InMemoryMetadataLink, LinkError, MediaMetadata, MetadataLink,
};
pub use source::{MediaSource, SourceError, open_source};
pub use streams::{ClassifiedStream, SubtitleFormat, SubtitleStream, classify};

/// Core errors that can bubble up from any Subtide subsystem.
#[derive(Debug, thiserror::Error)]
pub enum SubtideError {
    #[error("Identifier error: {0}")]
    Cid(#[from] CidError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SubtideError>;
