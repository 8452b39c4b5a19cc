use std::path::{Path, PathBuf};

use chrono::DateTime;
use sha2::{Digest, Sha256};
use url::Url;

/// Maximum number of characters of a title used in a path component
const MAX_TITLE_LENGTH: usize = 100;

const AUDIO_EXTENSION: &str = "mp3";
const MARKER_EXTENSION: &str = "json";
const PARTIAL_SUFFIX: &str = ".partial";

/// Paths belonging to one downloaded item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// Final location of the media file
    pub audio: PathBuf,
    /// Where the media is streamed before being renamed into place
    pub partial: PathBuf,
    /// Sidecar marker proving the download completed
    pub marker: PathBuf,
}

/// Directory holding all downloads of a subscription
pub fn subscription_dir(base_dir: &Path, subscription_title: &str) -> PathBuf {
    base_dir.join(sanitize_title(subscription_title))
}

/// Deterministic stem for an item: `<title>-<YYYY-MM-DD HH-MM-SS>` in UTC.
///
/// `disambiguate` is set when several items in the feed share a publish
/// second; the stem then gets a short hash of the enclosure URL appended.
pub fn file_stem(subscription_title: &str, published: i64, disambiguate: Option<&Url>) -> String {
    let timestamp = DateTime::from_timestamp(published, 0)
        .map(|dt| dt.format("%Y-%m-%d %H-%M-%S").to_string())
        .unwrap_or_else(|| published.to_string());

    let mut stem = format!("{}-{}", sanitize_title(subscription_title), timestamp);
    if let Some(url) = disambiguate {
        stem.push('-');
        stem.push_str(&url_fingerprint(url));
    }
    stem
}

/// Audio, partial and marker paths for `stem` inside `dir`
pub fn artifact_paths(dir: &Path, stem: &str) -> ArtifactPaths {
    let audio_name = format!("{stem}.{AUDIO_EXTENSION}");
    ArtifactPaths {
        partial: dir.join(format!("{audio_name}{PARTIAL_SUFFIX}")),
        audio: dir.join(audio_name),
        marker: dir.join(format!("{stem}.{MARKER_EXTENSION}")),
    }
}

/// Whether a file name is a leftover from an interrupted download
pub fn is_partial_file(filename: &str) -> bool {
    filename.ends_with(PARTIAL_SUFFIX)
}

fn sanitize_title(title: &str) -> String {
    let truncated: String = title.trim().chars().take(MAX_TITLE_LENGTH).collect();
    let sanitized = sanitize_filename::sanitize(truncated.trim());
    let sanitized = sanitized.trim_start_matches('.').trim();

    if sanitized.is_empty() {
        "untitled".to_string()
    } else {
        sanitized.to_string()
    }
}

fn url_fingerprint(url: &Url) -> String {
    let digest = Sha256::digest(url.as_str().as_bytes());
    format!("{digest:x}")[..8].to_string()
}
