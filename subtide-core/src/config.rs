//! Centralized configuration for Subtide.
//!
//! All tunable parameters live here; run-scoped settings are carried in
//! [`RunOptions`] and threaded explicitly into every run call, so nothing
//! mutable is shared across runs.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::streams::SubtitleFormat;

/// Central configuration for all Subtide components.
///
/// Groups related settings into logical sections and supports environment
/// variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct SubtideConfig {
    pub extraction: ExtractionConfig,
    pub server: ServerConfig,
}

/// Extraction pipeline configuration.
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    /// Default for bypassing idempotence short-circuits and
    /// already-exists checks
    pub force_recompute: bool,
    /// Default target format for extracted streams
    pub output_format: SubtitleFormat,
    /// External extraction tool binary
    pub tool_path: PathBuf,
    /// Wall-clock bound per tool invocation
    pub stream_timeout: Duration,
    /// Smallest output size accepted as a real subtitle artifact
    pub min_artifact_bytes: u64,
    /// Upper bound on indexed-field stream probing
    pub probe_stream_cap: u32,
    /// Worker bound for per-stream extraction within one run
    pub max_parallel_streams: usize,
    /// Directory artifacts are written into
    pub output_dir: PathBuf,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            force_recompute: false,
            output_format: SubtitleFormat::Srt,
            tool_path: PathBuf::from("ffmpeg"),
            stream_timeout: Duration::from_secs(120), // 2 minutes per stream
            min_artifact_bytes: 10,
            probe_stream_cap: 20,
            max_parallel_streams: 2,
            output_dir: PathBuf::from("subtitles"),
        }
    }
}

impl ExtractionConfig {
    /// Per-run options derived from the configured defaults.
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            force_recompute: self.force_recompute,
            output_format: self.output_format,
        }
    }
}

/// Run-scoped options, threaded explicitly into every run call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    /// Bypass idempotence short-circuits and already-exists checks
    #[serde(default)]
    pub force_recompute: bool,
    /// Target subtitle codec and extension for every stream in the run
    #[serde(default)]
    pub output_format: SubtitleFormat,
}

/// HTTP shell configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the shell binds to
    pub bind_address: String,
    /// Port the shell binds to
    pub port: u16,
    /// Timeout for completion callback delivery
    pub callback_timeout: Duration,
    /// Base URL of the owning metadata store (None = in-memory links)
    pub metadata_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 3000,
            callback_timeout: Duration::from_secs(10),
            metadata_url: None,
        }
    }
}

impl SubtideConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Allows runtime configuration via `SUBTIDE_*` variables while
    /// maintaining sensible defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(tool_path) = std::env::var("SUBTIDE_TOOL_PATH") {
            config.extraction.tool_path = PathBuf::from(tool_path);
        }

        if let Ok(output_dir) = std::env::var("SUBTIDE_OUTPUT_DIR") {
            config.extraction.output_dir = PathBuf::from(output_dir);
        }

        if let Ok(format) = std::env::var("SUBTIDE_OUTPUT_FORMAT") {
            if let Ok(parsed) = format.parse() {
                config.extraction.output_format = parsed;
            }
        }

        if let Ok(force) = std::env::var("SUBTIDE_FORCE_RECOMPUTE") {
            config.extraction.force_recompute = force.parse().unwrap_or(false);
        }

        if let Ok(timeout) = std::env::var("SUBTIDE_STREAM_TIMEOUT") {
            if let Ok(seconds) = timeout.parse::<u64>() {
                config.extraction.stream_timeout = Duration::from_secs(seconds);
            }
        }

        if let Ok(cap) = std::env::var("SUBTIDE_PROBE_STREAM_CAP") {
            if let Ok(value) = cap.parse::<u32>() {
                config.extraction.probe_stream_cap = value;
            }
        }

        if let Ok(workers) = std::env::var("SUBTIDE_MAX_PARALLEL_STREAMS") {
            if let Ok(value) = workers.parse::<usize>() {
                config.extraction.max_parallel_streams = value.max(1);
            }
        }

        if let Ok(port) = std::env::var("SUBTIDE_PORT") {
            if let Ok(value) = port.parse::<u16>() {
                config.server.port = value;
            }
        }

        if let Ok(url) = std::env::var("SUBTIDE_METADATA_URL") {
            config.server.metadata_url = Some(url);
        }

        config
    }

    /// Creates a configuration optimized for testing: short timeouts,
    /// sequential extraction.
    pub fn for_testing() -> Self {
        let mut config = Self::default();
        config.extraction.stream_timeout = Duration::from_secs(1);
        config.extraction.max_parallel_streams = 1;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = SubtideConfig::default();

        assert!(!config.extraction.force_recompute);
        assert_eq!(config.extraction.output_format, SubtitleFormat::Srt);
        assert_eq!(config.extraction.tool_path, PathBuf::from("ffmpeg"));
        assert_eq!(config.extraction.stream_timeout, Duration::from_secs(120));
        assert_eq!(config.extraction.min_artifact_bytes, 10);
        assert_eq!(config.extraction.probe_stream_cap, 20);
        assert_eq!(config.extraction.max_parallel_streams, 2);
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.metadata_url, None);
    }

    #[test]
    fn test_run_options_follow_config_defaults() {
        let config = ExtractionConfig {
            force_recompute: true,
            output_format: SubtitleFormat::Vtt,
            ..Default::default()
        };

        let options = config.run_options();
        assert!(options.force_recompute);
        assert_eq!(options.output_format, SubtitleFormat::Vtt);
    }

    #[test]
    fn test_env_override() {
        unsafe {
            std::env::set_var("SUBTIDE_TOOL_PATH", "/opt/ffmpeg/bin/ffmpeg");
            std::env::set_var("SUBTIDE_OUTPUT_FORMAT", "vtt");
            std::env::set_var("SUBTIDE_STREAM_TIMEOUT", "30");
            std::env::set_var("SUBTIDE_PROBE_STREAM_CAP", "40");
            std::env::set_var("SUBTIDE_PORT", "8080");
        }

        let config = SubtideConfig::from_env();

        assert_eq!(
            config.extraction.tool_path,
            PathBuf::from("/opt/ffmpeg/bin/ffmpeg")
        );
        assert_eq!(config.extraction.output_format, SubtitleFormat::Vtt);
        assert_eq!(config.extraction.stream_timeout, Duration::from_secs(30));
        assert_eq!(config.extraction.probe_stream_cap, 40);
        assert_eq!(config.server.port, 8080);

        // Cleanup
        unsafe {
            std::env::remove_var("SUBTIDE_TOOL_PATH");
            std::env::remove_var("SUBTIDE_OUTPUT_FORMAT");
            std::env::remove_var("SUBTIDE_STREAM_TIMEOUT");
            std::env::remove_var("SUBTIDE_PROBE_STREAM_CAP");
            std::env::remove_var("SUBTIDE_PORT");
        }
    }

    #[test]
    fn test_testing_preset() {
        let config = SubtideConfig::for_testing();
        assert_eq!(config.extraction.stream_timeout, Duration::from_secs(1));
        assert_eq!(config.extraction.max_parallel_streams, 1);
    }
}
