use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::PersistError;
use crate::persist::write_json_atomic;

/// Sidecar written next to a downloaded file once it is complete.
///
/// Its presence is what marks the item as done; the watermark is only the
/// fast path in front of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marker {
    pub subscription_title: String,
    pub subscription_url: String,
    pub item_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
    /// Publish time, epoch seconds
    pub published: i64,
    pub enclosure_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub audio_filename: String,
    pub bytes: u64,
    pub content_hash: String,
    pub downloaded_at: String,
}

impl Marker {
    /// Stamp the marker with the current time
    pub fn touch(mut self) -> Self {
        self.downloaded_at = Utc::now().to_rfc3339();
        self
    }
}

/// Atomically write a marker to `path`
pub fn write_marker(marker: &Marker, path: &Path) -> Result<(), PersistError> {
    write_json_atomic(path, marker)
}

/// Read a marker back from disk
pub fn read_marker(path: &Path) -> Result<Marker, PersistError> {
    let content = std::fs::read_to_string(path).map_err(|e| PersistError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(serde_json::from_str(&content)?)
}

/// Whether the item owning `path` has already been downloaded
pub fn marker_exists(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_marker() -> Marker {
        Marker {
            subscription_title: "Show".to_string(),
            subscription_url: "https://example.com/feed.xml".to_string(),
            item_title: "Episode 1".to_string(),
            guid: Some("ep-1".to_string()),
            published: 1_705_321_805,
            enclosure_url: "https://example.com/ep1.mp3".to_string(),
            mime_type: Some("audio/mpeg".to_string()),
            audio_filename: "Show-2024-01-15 12-30-05.mp3".to_string(),
            bytes: 18,
            content_hash: "sha256:abc123".to_string(),
            downloaded_at: String::new(),
        }
        .touch()
    }

    #[test]
    fn write_and_read_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("marker.json");
        let marker = make_marker();

        assert!(!marker_exists(&path));
        write_marker(&marker, &path).unwrap();

        assert!(marker_exists(&path));
        assert_eq!(read_marker(&path).unwrap(), marker);
    }

    #[test]
    fn touch_sets_download_time() {
        assert!(!make_marker().downloaded_at.is_empty());
    }

    #[test]
    fn optional_fields_are_omitted() {
        let mut marker = make_marker();
        marker.guid = None;
        marker.mime_type = None;

        let json = serde_json::to_string(&marker).unwrap();
        assert!(!json.contains("guid"));
        assert!(!json.contains("mime_type"));
    }

    #[test]
    fn read_nonexistent_returns_error() {
        let dir = tempdir().unwrap();
        assert!(read_marker(&dir.path().join("missing.json")).is_err());
    }
}
