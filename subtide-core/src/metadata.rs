//! Per-video metadata and the write-only link back into the metadata store.
//!
//! The metadata bag travels with each extraction request and is owned by an
//! upstream system; Subtide only reads it. The one mutation path back into
//! that system is [`MetadataLink`]: idempotent additions to the video's
//! `extracted_subtitles` and `subtitle_languages` sets. Nothing here removes
//! or rewrites existing values.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::RwLock;
use tracing::debug;

use crate::cid::ContentId;

/// Key/value metadata describing one source video.
///
/// Values are strings; structured values (the stream descriptor list, the
/// recorded subtitle sets) are JSON documents stored under a single key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    #[serde(flatten)]
    values: HashMap<String, String>,
}

impl MediaMetadata {
    /// File-type classification, e.g. `video` or a `video/...` MIME type.
    pub const MEDIA_TYPE: &'static str = "media_type";
    /// JSON list of all container streams, each with a `codec_type` field.
    pub const STREAMS: &'static str = "streams";
    /// Display title of the source video.
    pub const TITLE: &'static str = "title";
    /// Release year of the source video.
    pub const YEAR: &'static str = "year";
    /// JSON string array of already-recorded subtitle artifact CIDs.
    pub const EXTRACTED_SUBTITLES: &'static str = "extracted_subtitles";
    /// JSON string array of already-recorded subtitle language codes.
    pub const SUBTITLE_LANGUAGES: &'static str = "subtitle_languages";

    /// Creates an empty metadata bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces one value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Returns the raw value for `key`, if present.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Whether the file-type classification marks this as a video.
    pub fn is_video(&self) -> bool {
        self.value(Self::MEDIA_TYPE)
            .is_some_and(|v| v == "video" || v.starts_with("video/"))
    }

    /// Display title, if recorded.
    pub fn title(&self) -> Option<&str> {
        self.value(Self::TITLE).filter(|t| !t.is_empty())
    }

    /// Release year, if recorded and parsable.
    pub fn year(&self) -> Option<u32> {
        self.value(Self::YEAR).and_then(|y| y.parse().ok())
    }

    /// Parses the JSON string array stored under `key`.
    ///
    /// Absent or malformed values yield an empty set.
    pub fn string_set(&self, key: &str) -> HashSet<String> {
        self.value(key)
            .and_then(|raw| serde_json::from_str::<Vec<String>>(raw).ok())
            .map(HashSet::from_iter)
            .unwrap_or_default()
    }

    /// Whether subtitle extraction has already been recorded for this video.
    pub fn has_recorded_subtitles(&self) -> bool {
        !self.string_set(Self::EXTRACTED_SUBTITLES).is_empty()
    }
}

/// Errors that can occur while linking subtitle metadata to a video.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// The metadata store answered but refused the update.
    #[error("Metadata store rejected update for {video}: {reason}")]
    StoreRejected {
        /// CID of the video whose record was being updated
        video: ContentId,
        /// Description of the rejection
        reason: String,
    },

    /// The metadata store could not be reached.
    #[error("Metadata store unreachable: {source}")]
    Transport {
        /// The underlying transport error
        #[from]
        source: reqwest::Error,
    },
}

/// Result type for metadata link operations.
pub type LinkResult<T> = Result<T, LinkError>;

/// Write-only path into the externally-owned video metadata record.
///
/// Both operations are idempotent set-additions: re-adding an existing
/// member is a no-op, never an error. The sets only grow.
#[async_trait]
pub trait MetadataLink: Send + Sync {
    /// Adds a subtitle artifact CID to the video's `extracted_subtitles` set.
    async fn add_extracted_subtitle(
        &self,
        video: &ContentId,
        subtitle: &ContentId,
    ) -> LinkResult<()>;

    /// Adds a language code to the video's `subtitle_languages` set.
    async fn add_subtitle_language(&self, video: &ContentId, language: &str) -> LinkResult<()>;
}

/// [`MetadataLink`] backed by the owning metadata service over HTTP.
pub struct HttpMetadataLink {
    client: reqwest::Client,
    base_url: String,
}

impl HttpMetadataLink {
    /// Creates a link client against `base_url` with a per-request timeout.
    ///
    /// # Errors
    /// - `LinkError::Transport` - HTTP client construction failed
    pub fn new(base_url: &str, timeout: Duration) -> LinkResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post_addition(
        &self,
        video: &ContentId,
        endpoint: &str,
        body: serde_json::Value,
    ) -> LinkResult<()> {
        let url = format!("{}/videos/{video}/{endpoint}", self.base_url);
        let response = self.client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            return Err(LinkError::StoreRejected {
                video: video.clone(),
                reason: format!("{} returned {}", url, response.status()),
            });
        }

        debug!("Linked {endpoint} addition for {video}");
        Ok(())
    }
}

#[async_trait]
impl MetadataLink for HttpMetadataLink {
    async fn add_extracted_subtitle(
        &self,
        video: &ContentId,
        subtitle: &ContentId,
    ) -> LinkResult<()> {
        self.post_addition(video, "extracted-subtitles", json!({ "cid": subtitle }))
            .await
    }

    async fn add_subtitle_language(&self, video: &ContentId, language: &str) -> LinkResult<()> {
        self.post_addition(video, "subtitle-languages", json!({ "language": language }))
            .await
    }
}

/// Per-video subtitle sets held by [`InMemoryMetadataLink`].
#[derive(Debug, Clone, Default)]
struct SubtitleRecord {
    extracted_subtitles: HashSet<String>,
    subtitle_languages: HashSet<String>,
}

/// In-process [`MetadataLink`] for tests and one-shot CLI runs.
#[derive(Debug, Default)]
pub struct InMemoryMetadataLink {
    records: RwLock<HashMap<ContentId, SubtitleRecord>>,
}

impl InMemoryMetadataLink {
    /// Creates an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded subtitle CIDs for `video`.
    pub async fn extracted_subtitles(&self, video: &ContentId) -> HashSet<String> {
        self.records
            .read()
            .await
            .get(video)
            .map(|r| r.extracted_subtitles.clone())
            .unwrap_or_default()
    }

    /// Returns the recorded subtitle languages for `video`.
    pub async fn subtitle_languages(&self, video: &ContentId) -> HashSet<String> {
        self.records
            .read()
            .await
            .get(video)
            .map(|r| r.subtitle_languages.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl MetadataLink for InMemoryMetadataLink {
    async fn add_extracted_subtitle(
        &self,
        video: &ContentId,
        subtitle: &ContentId,
    ) -> LinkResult<()> {
        let mut records = self.records.write().await;
        records
            .entry(video.clone())
            .or_default()
            .extracted_subtitles
            .insert(subtitle.as_str().to_string());
        Ok(())
    }

    async fn add_subtitle_language(&self, video: &ContentId, language: &str) -> LinkResult<()> {
        let mut records = self.records.write().await;
        records
            .entry(video.clone())
            .or_default()
            .subtitle_languages
            .insert(language.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video() -> ContentId {
        ContentId::new("bvideo".to_string())
    }

    #[test]
    fn test_media_type_classification() {
        let plain = MediaMetadata::new().with(MediaMetadata::MEDIA_TYPE, "video");
        let mime = MediaMetadata::new().with(MediaMetadata::MEDIA_TYPE, "video/x-matroska");
        let audio = MediaMetadata::new().with(MediaMetadata::MEDIA_TYPE, "audio");

        assert!(plain.is_video());
        assert!(mime.is_video());
        assert!(!audio.is_video());
        assert!(!MediaMetadata::new().is_video());
    }

    #[test]
    fn test_string_set_tolerates_malformed_values() {
        let recorded = MediaMetadata::new()
            .with(MediaMetadata::EXTRACTED_SUBTITLES, r#"["bcid1", "bcid2"]"#);
        assert_eq!(recorded.string_set(MediaMetadata::EXTRACTED_SUBTITLES).len(), 2);
        assert!(recorded.has_recorded_subtitles());

        let malformed = MediaMetadata::new().with(MediaMetadata::EXTRACTED_SUBTITLES, "not json");
        assert!(malformed.string_set(MediaMetadata::EXTRACTED_SUBTITLES).is_empty());
        assert!(!malformed.has_recorded_subtitles());

        let empty = MediaMetadata::new().with(MediaMetadata::EXTRACTED_SUBTITLES, "[]");
        assert!(!empty.has_recorded_subtitles());
    }

    #[test]
    fn test_year_parsing() {
        let meta = MediaMetadata::new().with(MediaMetadata::YEAR, "1994");
        assert_eq!(meta.year(), Some(1994));

        let bad = MediaMetadata::new().with(MediaMetadata::YEAR, "ninety-four");
        assert_eq!(bad.year(), None);
    }

    #[tokio::test]
    async fn test_in_memory_additions_are_idempotent() {
        let link = InMemoryMetadataLink::new();
        let video = video();
        let subtitle = ContentId::new("bsubtitle".to_string());

        link.add_extracted_subtitle(&video, &subtitle).await.unwrap();
        link.add_extracted_subtitle(&video, &subtitle).await.unwrap();
        link.add_subtitle_language(&video, "eng").await.unwrap();
        link.add_subtitle_language(&video, "eng").await.unwrap();

        assert_eq!(link.extracted_subtitles(&video).await.len(), 1);
        assert_eq!(
            link.subtitle_languages(&video).await,
            HashSet::from(["eng".to_string()])
        );
    }

    #[tokio::test]
    async fn test_in_memory_sets_are_order_insensitive() {
        let video = video();
        let a = ContentId::new("ba".to_string());
        let b = ContentId::new("bb".to_string());

        let forward = InMemoryMetadataLink::new();
        forward.add_extracted_subtitle(&video, &a).await.unwrap();
        forward.add_extracted_subtitle(&video, &b).await.unwrap();

        let reverse = InMemoryMetadataLink::new();
        reverse.add_extracted_subtitle(&video, &b).await.unwrap();
        reverse.add_extracted_subtitle(&video, &a).await.unwrap();

        assert_eq!(
            forward.extracted_subtitles(&video).await,
            reverse.extracted_subtitles(&video).await
        );
    }
}
