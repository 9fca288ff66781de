//! External tool abstraction for per-stream subtitle extraction.
//!
//! The orchestrator never touches process management directly; it talks to
//! [`StreamExtractor`]. The production implementation shells out to ffmpeg,
//! the simulation implementation writes synthetic cues for tests and
//! development.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{ExtractionError, ExtractionResult};
use crate::streams::SubtitleFormat;

/// One invocation of the external tool per subtitle stream.
#[async_trait]
pub trait StreamExtractor: Send + Sync {
    /// Extracts one subtitle stream from `input_locator` into `output_path`,
    /// transcoded to `format`.
    ///
    /// `stream_index` is subtitle-relative: the N in the tool's `0:s:N`
    /// stream selector.
    ///
    /// # Errors
    /// - `ExtractionError::ToolFailed` - Tool missing, unspawnable, or
    ///   exited with failure
    /// - `ExtractionError::ToolTimeout` - Wall-clock bound exceeded; the
    ///   invocation was forcibly terminated
    async fn extract_stream(
        &self,
        input_locator: &str,
        stream_index: u32,
        format: SubtitleFormat,
        output_path: &Path,
    ) -> ExtractionResult<()>;

    /// Whether the external tool is present and runnable.
    fn is_available(&self) -> bool;
}

/// Production [`StreamExtractor`] shelling out to ffmpeg.
pub struct FfmpegStreamExtractor {
    tool_path: PathBuf,
    stream_timeout: Duration,
}

impl FfmpegStreamExtractor {
    /// Creates an extractor invoking `tool_path` with a per-stream
    /// wall-clock bound.
    pub fn new(tool_path: impl Into<PathBuf>, stream_timeout: Duration) -> Self {
        Self {
            tool_path: tool_path.into(),
            stream_timeout,
        }
    }

    /// Verify the tool binary runs at all.
    fn verify_installation(&self) -> ExtractionResult<()> {
        let result = std::process::Command::new(&self.tool_path)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match result {
            Ok(status) if status.success() => Ok(()),
            Ok(status) => Err(ExtractionError::ToolFailed {
                reason: format!(
                    "{} -version exited with {status}",
                    self.tool_path.display()
                ),
            }),
            Err(e) => Err(ExtractionError::ToolFailed {
                reason: format!("{} not runnable: {e}", self.tool_path.display()),
            }),
        }
    }
}

#[async_trait]
impl StreamExtractor for FfmpegStreamExtractor {
    async fn extract_stream(
        &self,
        input_locator: &str,
        stream_index: u32,
        format: SubtitleFormat,
        output_path: &Path,
    ) -> ExtractionResult<()> {
        let mut cmd = tokio::process::Command::new(&self.tool_path);
        cmd.arg("-y")
            .arg("-i")
            .arg(input_locator)
            .arg("-map")
            .arg(format!("0:s:{stream_index}"))
            .arg("-c:s")
            .arg(format.codec_name())
            .arg(output_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("Executing extraction command: {cmd:?}");

        let child = cmd.spawn().map_err(|e| ExtractionError::ToolFailed {
            reason: format!("failed to spawn {}: {e}", self.tool_path.display()),
        })?;

        let output =
            match tokio::time::timeout(self.stream_timeout, child.wait_with_output()).await {
                Ok(waited) => waited.map_err(|e| ExtractionError::ToolFailed {
                    reason: format!("failed waiting for tool: {e}"),
                })?,
                Err(_) => {
                    // Dropping the timed-out future kills the child
                    // (kill_on_drop); nothing else is left running.
                    warn!(
                        "Extraction of stream {stream_index} from {input_locator} timed out, \
                         terminating tool"
                    );
                    return Err(ExtractionError::ToolTimeout {
                        seconds: self.stream_timeout.as_secs(),
                    });
                }
            };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("Extraction tool failed for stream {stream_index}: {}", stderr.trim());
            return Err(ExtractionError::ToolFailed {
                reason: format!("exit status {}", output.status),
            });
        }

        Ok(())
    }

    fn is_available(&self) -> bool {
        self.verify_installation().is_ok()
    }
}

/// Default cue text written by [`SimulationStreamExtractor`].
const SIMULATED_CUE: &str = "1\n00:00:01,000 --> 00:00:03,000\nsimulated subtitle cue\n";

/// Simulation [`StreamExtractor`] for tests and development.
///
/// Writes a fixed payload instead of invoking any tool, with configurable
/// per-stream failures, artificial latency, and an optional wall-clock
/// bound mirroring the production timeout behavior.
pub struct SimulationStreamExtractor {
    payload: String,
    delay: Duration,
    stream_delays: HashMap<u32, Duration>,
    timeout: Option<Duration>,
    failing_streams: HashSet<u32>,
    available: bool,
    invoked: Mutex<Vec<u32>>,
}

impl SimulationStreamExtractor {
    /// Creates a simulation extractor that succeeds for every stream.
    pub fn new() -> Self {
        Self {
            payload: SIMULATED_CUE.to_string(),
            delay: Duration::ZERO,
            stream_delays: HashMap::new(),
            timeout: None,
            failing_streams: HashSet::new(),
            available: true,
            invoked: Mutex::new(Vec::new()),
        }
    }

    /// Replaces the payload written for successful extractions.
    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Adds artificial latency to every invocation.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Overrides the latency for one stream index.
    pub fn with_stream_delay(mut self, stream_index: u32, delay: Duration) -> Self {
        self.stream_delays.insert(stream_index, delay);
        self
    }

    /// Bounds every invocation the way the production extractor does.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Marks one stream index as failing.
    pub fn failing_stream(mut self, stream_index: u32) -> Self {
        self.failing_streams.insert(stream_index);
        self
    }

    /// Simulates the tool being missing.
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Stream indexes extracted so far, in invocation order.
    pub fn invoked_streams(&self) -> Vec<u32> {
        self.invoked.lock().unwrap().clone()
    }

    /// Number of tool invocations so far.
    pub fn invocation_count(&self) -> usize {
        self.invoked.lock().unwrap().len()
    }
}

impl Default for SimulationStreamExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StreamExtractor for SimulationStreamExtractor {
    async fn extract_stream(
        &self,
        _input_locator: &str,
        stream_index: u32,
        _format: SubtitleFormat,
        output_path: &Path,
    ) -> ExtractionResult<()> {
        self.invoked.lock().unwrap().push(stream_index);

        if !self.available {
            return Err(ExtractionError::ToolFailed {
                reason: "tool not available in simulation".to_string(),
            });
        }

        let delay = self
            .stream_delays
            .get(&stream_index)
            .copied()
            .unwrap_or(self.delay);

        let work = async {
            tokio::time::sleep(delay).await;

            if self.failing_streams.contains(&stream_index) {
                return Err(ExtractionError::ToolFailed {
                    reason: "simulated tool failure".to_string(),
                });
            }

            tokio::fs::write(output_path, self.payload.as_bytes()).await?;
            Ok(())
        };

        match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, work).await {
                Ok(result) => result,
                Err(_) => Err(ExtractionError::ToolTimeout {
                    seconds: limit.as_secs(),
                }),
            },
            None => work.await,
        }
    }

    fn is_available(&self) -> bool {
        self.available
    }
}
