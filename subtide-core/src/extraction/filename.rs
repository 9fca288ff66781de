//! Deterministic artifact naming.
//!
//! The filename is the entire contract with the downstream ingestion
//! scanner, so its structure is fixed:
//! `{SanitizedTitle}[ (Year)][{SourceVideoCID}]_subtitle.{language-or-index}.{extension}`.

use std::fmt::Write;

use crate::cid::ContentId;

/// Characters never allowed in artifact filenames.
const FORBIDDEN_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Strips forbidden filename characters, collapses whitespace runs to a
/// single space, and trims the ends.
pub fn sanitize_title(raw: &str) -> String {
    let stripped: String = raw.chars().filter(|c| !FORBIDDEN_CHARS.contains(c)).collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Builds the deterministic artifact filename for one extracted stream.
///
/// The language tag is preferred for the suffix; the subtitle-relative
/// stream index stands in when no language is known.
pub fn artifact_file_name(
    title: &str,
    year: Option<u32>,
    video_cid: &ContentId,
    language: Option<&str>,
    stream_index: u32,
    extension: &str,
) -> String {
    let mut name = sanitize_title(title);

    if let Some(year) = year {
        let _ = write!(name, " ({year})");
    }

    let _ = write!(name, "[{video_cid}]_subtitle.");

    match language {
        Some(language) => name.push_str(language),
        None => {
            let _ = write!(name, "{stream_index}");
        }
    }

    let _ = write!(name, ".{extension}");
    name
}
