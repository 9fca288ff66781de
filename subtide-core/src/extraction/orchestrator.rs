//! Extraction run orchestration.
//!
//! One run covers the subtitle streams of a single video. The run decides
//! up front whether any extraction is warranted, then processes each
//! supported stream independently under a bounded worker pool. The final
//! metadata sets converge to the same value regardless of extraction order,
//! so stream scheduling carries no ordering requirement.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use futures::stream;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::extractor::StreamExtractor;
use super::filename::artifact_file_name;
use super::{ExtractionError, ExtractionResult};
use crate::cid::ContentId;
use crate::config::{ExtractionConfig, RunOptions};
use crate::metadata::{MediaMetadata, MetadataLink};
use crate::source::open_source;
use crate::streams::{ClassifiedStream, bitmap_codec, classify};

/// Terminal status of one extraction run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// The run was a legitimate non-candidate; nothing was touched.
    Skipped,
    /// Streams were processed; per-stream failures may be recorded in the
    /// outcomes.
    Completed,
    /// An input-class defect was discovered after streams were expected to
    /// exist.
    Failed,
}

/// Outcome for one attempted stream, terminal once produced.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionOutcome {
    pub stream: ClassifiedStream,
    pub produced_path: Option<PathBuf>,
    pub cid: Option<ContentId>,
    pub success: bool,
    pub reason: Option<String>,
}

/// Completion signal for one run, delivered exactly once.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub status: RunStatus,
    pub duration_ms: u64,
    pub reason: Option<String>,
    pub outcomes: Vec<ExtractionOutcome>,
    pub finished_at: DateTime<Utc>,
}

/// One unit of work: a single video's subtitle streams.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    /// CID of the source video itself
    pub video_cid: ContentId,
    /// Path or URL of the source file
    pub locator: String,
    /// Metadata bag supplied by the upstream system
    pub metadata: MediaMetadata,
    /// Directory artifacts are written into
    pub output_dir: PathBuf,
    /// Run-scoped options
    pub options: RunOptions,
}

/// Drives classification, per-stream extraction, and metadata linking.
pub struct ExtractionEngine {
    config: ExtractionConfig,
    extractor: Arc<dyn StreamExtractor>,
    link: Arc<dyn MetadataLink>,
}

impl ExtractionEngine {
    /// Creates an engine with injected extractor and metadata link
    /// capabilities.
    pub fn new(
        config: ExtractionConfig,
        extractor: Arc<dyn StreamExtractor>,
        link: Arc<dyn MetadataLink>,
    ) -> Self {
        Self {
            config,
            extractor,
            link,
        }
    }

    /// Runs extraction for one video and returns its completion report.
    ///
    /// Never fails as a function: every defect is folded into the report's
    /// status and reasons.
    pub async fn run(&self, request: &ExtractionRequest) -> RunReport {
        let started = Instant::now();
        info!("Starting subtitle extraction run for {}", request.video_cid);

        let (status, reason, outcomes) = self.evaluate(request).await;

        let report = RunReport {
            status,
            duration_ms: started.elapsed().as_millis() as u64,
            reason,
            outcomes,
            finished_at: Utc::now(),
        };

        info!(
            "Extraction run for {} finished: {:?} in {}ms",
            request.video_cid, report.status, report.duration_ms
        );
        report
    }

    async fn evaluate(
        &self,
        request: &ExtractionRequest,
    ) -> (RunStatus, Option<String>, Vec<ExtractionOutcome>) {
        if !request.metadata.is_video() {
            return skipped("source is not classified as a video");
        }

        if request.metadata.has_recorded_subtitles() && !request.options.force_recompute {
            return skipped("subtitle extraction already recorded for this video");
        }

        let classified = classify(
            &request.metadata,
            request.options.output_format,
            self.config.probe_stream_cap,
        );
        if classified.is_empty() {
            return skipped("no subtitle streams reported");
        }

        let (supported, unsupported): (Vec<ClassifiedStream>, Vec<ClassifiedStream>) =
            classified.into_iter().partition(|c| c.supported);
        if supported.is_empty() {
            let reason = if unsupported.iter().all(|c| bitmap_codec(&c.stream.codec)) {
                "all subtitle streams are image-based"
            } else {
                "no text-based subtitle streams to extract"
            };
            return skipped(reason);
        }

        // Streams exist and are extractable; from here on a missing source
        // is a defect, not a legitimate non-candidate.
        let source = match open_source(&request.locator) {
            Ok(source) => source,
            Err(e) => return failed(format!("source locator rejected: {e}")),
        };
        if !source.exists().await {
            return failed(format!("source unreadable: {}", request.locator));
        }

        if let Err(e) = tokio::fs::create_dir_all(&request.output_dir).await {
            return failed(format!(
                "cannot create output directory {}: {e}",
                request.output_dir.display()
            ));
        }

        debug!(
            "Extracting {} supported stream(s) for {}",
            supported.len(),
            request.video_cid
        );

        let mut outcomes: Vec<ExtractionOutcome> = stream::iter(supported)
            .map(|candidate| self.process_stream(request, candidate))
            .buffer_unordered(self.config.max_parallel_streams.max(1))
            .collect()
            .await;
        outcomes.sort_by_key(|outcome| outcome.stream.index());

        let failures = outcomes.iter().filter(|o| !o.success).count();
        let reason =
            (failures > 0).then(|| format!("{failures} of {} stream(s) failed", outcomes.len()));
        (RunStatus::Completed, reason, outcomes)
    }

    /// Processes one supported stream end to end. Every failure is folded
    /// into the returned outcome; nothing escapes to abort sibling streams.
    async fn process_stream(
        &self,
        request: &ExtractionRequest,
        candidate: ClassifiedStream,
    ) -> ExtractionOutcome {
        let title = request.metadata.title().unwrap_or("Unknown");
        let file_name = artifact_file_name(
            title,
            request.metadata.year(),
            &request.video_cid,
            candidate.language(),
            candidate.index(),
            candidate.target_extension,
        );
        let output_path = request.output_dir.join(file_name);

        let reuse = !request.options.force_recompute
            && tokio::fs::try_exists(&output_path).await.unwrap_or(false);

        if reuse {
            debug!("Reusing existing artifact at {}", output_path.display());
        } else {
            let extracted = self
                .extractor
                .extract_stream(
                    &request.locator,
                    candidate.index(),
                    request.options.output_format,
                    &output_path,
                )
                .await;

            if let Err(e) = extracted {
                discard_partial(&output_path).await;
                return failure_outcome(candidate, None, None, e.to_string());
            }

            if let Err(e) = self.validate_artifact(&output_path).await {
                discard_partial(&output_path).await;
                return failure_outcome(candidate, None, None, e.to_string());
            }
        }

        let cid = match ContentId::from_file(&output_path).await {
            Ok(cid) => cid,
            Err(e) => {
                return failure_outcome(candidate, Some(output_path), None, e.to_string());
            }
        };

        if let Err(e) = self
            .link_artifact(&request.video_cid, &cid, candidate.language())
            .await
        {
            // The artifact stays on disk; linking is best-effort and a
            // rerun re-links it idempotently.
            return failure_outcome(
                candidate,
                Some(output_path),
                Some(cid),
                format!("artifact produced but linking failed: {e}"),
            );
        }

        debug!(
            "Stream {} extracted as {} ({})",
            candidate.index(),
            output_path.display(),
            cid
        );

        ExtractionOutcome {
            stream: candidate,
            produced_path: Some(output_path),
            cid: Some(cid),
            success: true,
            reason: reuse.then(|| "reused existing artifact".to_string()),
        }
    }

    /// Accepts a produced file only if it exists and is larger than the
    /// minimal sanity threshold.
    async fn validate_artifact(&self, path: &Path) -> ExtractionResult<()> {
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.len() > self.config.min_artifact_bytes => Ok(()),
            Ok(meta) => Err(ExtractionError::ArtifactRejected {
                reason: format!("artifact too small: {} bytes", meta.len()),
            }),
            Err(e) => Err(ExtractionError::ArtifactRejected {
                reason: format!("artifact missing after extraction: {e}"),
            }),
        }
    }

    async fn link_artifact(
        &self,
        video: &ContentId,
        cid: &ContentId,
        language: Option<&str>,
    ) -> ExtractionResult<()> {
        self.link.add_extracted_subtitle(video, cid).await?;
        if let Some(language) = language {
            self.link.add_subtitle_language(video, language).await?;
        }
        Ok(())
    }
}

fn skipped(reason: &str) -> (RunStatus, Option<String>, Vec<ExtractionOutcome>) {
    debug!("Skipping extraction run: {reason}");
    (RunStatus::Skipped, Some(reason.to_string()), Vec::new())
}

fn failed(reason: String) -> (RunStatus, Option<String>, Vec<ExtractionOutcome>) {
    warn!("Extraction run failed: {reason}");
    (RunStatus::Failed, Some(reason), Vec::new())
}

fn failure_outcome(
    stream: ClassifiedStream,
    produced_path: Option<PathBuf>,
    cid: Option<ContentId>,
    reason: String,
) -> ExtractionOutcome {
    warn!("Stream {} extraction failed: {reason}", stream.index());
    ExtractionOutcome {
        stream,
        produced_path,
        cid,
        success: false,
        reason: Some(reason),
    }
}

/// Removes whatever the tool left behind; a failed stream must not leave a
/// half-written artifact for a later run to mistake for a finished one.
async fn discard_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Discarded partial artifact {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to discard partial artifact {}: {e}", path.display()),
    }
}
