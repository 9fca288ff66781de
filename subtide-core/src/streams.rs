//! Subtitle stream discovery and classification.
//!
//! Turns a video's reported stream metadata into the ordered list of
//! subtitle tracks worth handing to the extraction tool. Pure data
//! transformation: no I/O, and absent or malformed input yields an empty
//! list rather than an error.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::metadata::MediaMetadata;

/// Codec identifiers stored as textual cues, convertible without image
/// rendering. Anything else is skipped rather than risk emitting a non-text
/// artifact.
const TEXT_CODECS: &[&str] = &[
    "subrip", "srt", "ass", "ssa", "webvtt", "vtt", "mov_text", "text",
];

/// Known image-based codec identifiers, listed for classification clarity;
/// unknown codecs fall into the same unsupported bucket.
const BITMAP_CODECS: &[&str] = &[
    "hdmv_pgs_subtitle",
    "pgssub",
    "pgs",
    "dvd_subtitle",
    "dvdsub",
    "vobsub",
    "dvb_subtitle",
    "dvbsub",
    "xsub",
];

/// Target container format for extracted subtitle artifacts.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleFormat {
    /// SubRip text
    #[default]
    Srt,
    /// WebVTT
    Vtt,
    /// Advanced SubStation Alpha
    Ass,
}

impl SubtitleFormat {
    /// File extension for artifacts in this format.
    pub fn extension(self) -> &'static str {
        match self {
            SubtitleFormat::Srt => "srt",
            SubtitleFormat::Vtt => "vtt",
            SubtitleFormat::Ass => "ass",
        }
    }

    /// Codec name the extraction tool transcodes into.
    pub fn codec_name(self) -> &'static str {
        match self {
            SubtitleFormat::Srt => "srt",
            SubtitleFormat::Vtt => "webvtt",
            SubtitleFormat::Ass => "ass",
        }
    }
}

impl fmt::Display for SubtitleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl std::str::FromStr for SubtitleFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "srt" => Ok(SubtitleFormat::Srt),
            "vtt" | "webvtt" => Ok(SubtitleFormat::Vtt),
            "ass" => Ok(SubtitleFormat::Ass),
            _ => Err(format!("Invalid subtitle format: {s}")),
        }
    }
}

/// One subtitle track as reported by the source metadata.
///
/// `index` is the position among subtitle-only streams, contiguous from 0 in
/// encounter order, which is how the extraction tool addresses tracks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubtitleStream {
    pub index: u32,
    pub codec: String,
    pub language: Option<String>,
    pub title: Option<String>,
}

/// A subtitle stream annotated with its extraction decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedStream {
    pub stream: SubtitleStream,
    /// Text-based and convertible; streams with `supported == false` never
    /// reach the extraction tool.
    pub supported: bool,
    pub target_extension: &'static str,
}

impl ClassifiedStream {
    /// Subtitle-relative index of the underlying stream.
    pub fn index(&self) -> u32 {
        self.stream.index
    }

    /// Language tag of the underlying stream, if known.
    pub fn language(&self) -> Option<&str> {
        self.stream.language.as_deref()
    }
}

/// Whether `codec` is on the text-based allow-list.
pub fn supported_codec(codec: &str) -> bool {
    TEXT_CODECS.contains(&codec.to_ascii_lowercase().as_str())
}

/// Whether `codec` is a known image-based format.
pub fn bitmap_codec(codec: &str) -> bool {
    BITMAP_CODECS.contains(&codec.to_ascii_lowercase().as_str())
}

/// Classifies the subtitle streams reported by `metadata`.
///
/// A full JSON stream descriptor list under [`MediaMetadata::STREAMS`] is
/// preferred; individually-keyed `subtitle_codec_{i}` fields are the
/// fallback, scanned for at most `probe_cap` indexes.
pub fn classify(
    metadata: &MediaMetadata,
    format: SubtitleFormat,
    probe_cap: u32,
) -> Vec<ClassifiedStream> {
    subtitle_streams(metadata, probe_cap)
        .into_iter()
        .map(|stream| {
            let supported = supported_codec(&stream.codec);
            ClassifiedStream {
                stream,
                supported,
                target_extension: format.extension(),
            }
        })
        .collect()
}

/// Shape of one entry in the full stream descriptor list.
#[derive(Debug, Deserialize)]
struct RawStream {
    #[serde(default)]
    codec_type: Option<String>,
    #[serde(default)]
    codec_name: Option<String>,
    #[serde(default)]
    tags: Option<RawStreamTags>,
}

#[derive(Debug, Deserialize)]
struct RawStreamTags {
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

/// Extracts subtitle streams from `metadata`, re-indexed from 0.
fn subtitle_streams(metadata: &MediaMetadata, probe_cap: u32) -> Vec<SubtitleStream> {
    if let Some(streams) = streams_from_descriptor_list(metadata) {
        return streams;
    }
    streams_from_indexed_fields(metadata, probe_cap)
}

fn streams_from_descriptor_list(metadata: &MediaMetadata) -> Option<Vec<SubtitleStream>> {
    let raw = metadata.value(MediaMetadata::STREAMS)?;
    let all: Vec<RawStream> = serde_json::from_str(raw).ok()?;

    let streams = all
        .into_iter()
        .filter(|s| s.codec_type.as_deref() == Some("subtitle"))
        .enumerate()
        .map(|(index, s)| {
            let tags = s.tags.unwrap_or(RawStreamTags {
                language: None,
                title: None,
            });
            SubtitleStream {
                index: index as u32,
                codec: s.codec_name.unwrap_or_default(),
                language: normalize_language(tags.language),
                title: tags.title.filter(|t| !t.is_empty()),
            }
        })
        .collect();

    Some(streams)
}

fn streams_from_indexed_fields(metadata: &MediaMetadata, probe_cap: u32) -> Vec<SubtitleStream> {
    let mut streams = Vec::new();

    for index in 0..probe_cap {
        let Some(codec) = metadata.value(&format!("subtitle_codec_{index}")) else {
            break;
        };

        let language = metadata
            .value(&format!("subtitle_language_{index}"))
            .map(str::to_string);
        let title = metadata
            .value(&format!("subtitle_title_{index}"))
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        streams.push(SubtitleStream {
            index,
            codec: codec.to_string(),
            language: normalize_language(language),
            title,
        });
    }

    streams
}

/// Drops empty and undetermined (`und`) language tags.
fn normalize_language(language: Option<String>) -> Option<String> {
    language.filter(|l| !l.is_empty() && l != "und")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_streams(json: &str) -> MediaMetadata {
        MediaMetadata::new().with(MediaMetadata::STREAMS, json)
    }

    const MIXED_STREAMS: &str = r#"[
        {"codec_type": "video", "codec_name": "h264"},
        {"codec_type": "audio", "codec_name": "aac"},
        {"codec_type": "subtitle", "codec_name": "subrip", "tags": {"language": "eng"}},
        {"codec_type": "subtitle", "codec_name": "hdmv_pgs_subtitle", "tags": {"language": "ger"}},
        {"codec_type": "subtitle", "codec_name": "ass"}
    ]"#;

    #[test]
    fn test_descriptor_list_is_filtered_and_reindexed() {
        let classified = classify(&with_streams(MIXED_STREAMS), SubtitleFormat::Srt, 20);

        assert_eq!(classified.len(), 3);
        assert_eq!(classified[0].stream.index, 0);
        assert_eq!(classified[0].stream.codec, "subrip");
        assert_eq!(classified[0].stream.language.as_deref(), Some("eng"));
        assert!(classified[0].supported);

        assert_eq!(classified[1].stream.index, 1);
        assert!(!classified[1].supported);

        assert_eq!(classified[2].stream.index, 2);
        assert!(classified[2].supported);
        assert_eq!(classified[2].stream.language, None);
    }

    #[test]
    fn test_classify_is_pure() {
        let metadata = with_streams(MIXED_STREAMS);
        let first = classify(&metadata, SubtitleFormat::Vtt, 20);
        let second = classify(&metadata, SubtitleFormat::Vtt, 20);
        assert_eq!(first, second);
        assert!(first.iter().all(|c| c.target_extension == "vtt"));
    }

    #[test]
    fn test_indexed_field_fallback() {
        let metadata = MediaMetadata::new()
            .with("subtitle_codec_0", "subrip")
            .with("subtitle_language_0", "eng")
            .with("subtitle_codec_1", "dvd_subtitle");

        let classified = classify(&metadata, SubtitleFormat::Srt, 20);
        assert_eq!(classified.len(), 2);
        assert!(classified[0].supported);
        assert!(!classified[1].supported);
    }

    #[test]
    fn test_fallback_stops_at_first_gap_and_at_cap() {
        let gapped = MediaMetadata::new()
            .with("subtitle_codec_0", "subrip")
            .with("subtitle_codec_2", "subrip");
        assert_eq!(classify(&gapped, SubtitleFormat::Srt, 20).len(), 1);

        let mut dense = MediaMetadata::new();
        for i in 0..30 {
            dense.insert(format!("subtitle_codec_{i}"), "subrip");
        }
        assert_eq!(classify(&dense, SubtitleFormat::Srt, 20).len(), 20);
    }

    #[test]
    fn test_malformed_descriptor_list_falls_back() {
        let metadata = with_streams("not json").with("subtitle_codec_0", "ass");
        let classified = classify(&metadata, SubtitleFormat::Srt, 20);
        assert_eq!(classified.len(), 1);
        assert_eq!(classified[0].stream.codec, "ass");
    }

    #[test]
    fn test_empty_metadata_yields_no_streams() {
        assert!(classify(&MediaMetadata::new(), SubtitleFormat::Srt, 20).is_empty());
    }

    #[test]
    fn test_codec_policy() {
        for codec in ["subrip", "SRT", "ass", "ssa", "webvtt", "mov_text", "text"] {
            assert!(supported_codec(codec), "{codec} should be supported");
        }
        for codec in ["hdmv_pgs_subtitle", "dvd_subtitle", "dvb_subtitle", "xsub", "PGS"] {
            assert!(!supported_codec(codec), "{codec} should be unsupported");
            assert!(bitmap_codec(codec), "{codec} should be known image-based");
        }
        // Fail-safe default: unknown means unsupported, not image-based.
        assert!(!supported_codec("mystery_codec"));
        assert!(!bitmap_codec("mystery_codec"));
    }

    #[test]
    fn test_undetermined_language_is_dropped() {
        let metadata = with_streams(
            r#"[{"codec_type": "subtitle", "codec_name": "subrip", "tags": {"language": "und"}}]"#,
        );
        let classified = classify(&metadata, SubtitleFormat::Srt, 20);
        assert_eq!(classified[0].stream.language, None);
    }

    #[test]
    fn test_format_names() {
        assert_eq!(SubtitleFormat::Srt.extension(), "srt");
        assert_eq!(SubtitleFormat::Vtt.codec_name(), "webvtt");
        assert_eq!(SubtitleFormat::Ass.to_string(), "ass");
        assert_eq!(SubtitleFormat::default(), SubtitleFormat::Srt);
    }
}
