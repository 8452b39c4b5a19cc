use std::path::{Path, PathBuf};

use futures::StreamExt;
use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, warn};

use crate::error::DownloadError;
use crate::feed::{Enclosure, FeedItem};
use crate::http::{ByteStream, HttpClient, is_success};
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::store::Subscription;

use super::filename::ArtifactPaths;
use super::marker::{Marker, write_marker};

/// Largest slice written and hashed at once, and the write buffer capacity.
///
/// Network chunks arrive in whatever size the transport yields; larger ones
/// are split before they reach the file.
pub const DOWNLOAD_CHUNK_SIZE: usize = 4096;

/// Everything needed to download one item
#[derive(Debug, Clone)]
pub struct DownloadJob<'a> {
    pub subscription: &'a Subscription,
    pub item: &'a FeedItem,
    pub enclosure: &'a Enclosure,
    pub paths: ArtifactPaths,
    /// Position of this item among the new items of the subscription
    pub index: usize,
    pub total: usize,
}

/// A completed download, backed by a media file and its marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedArtifact {
    pub subscription_title: String,
    pub item_title: String,
    pub published: i64,
    pub path: PathBuf,
    pub marker_path: PathBuf,
    pub bytes: u64,
    pub content_hash: String,
}

/// Download an enclosure and record it with a marker.
///
/// The body is streamed into a `.partial` file which is renamed into place
/// once complete. The marker is written last. On any failure the partial
/// file is removed and no marker exists, so the item is retried next pass.
pub async fn download_enclosure<C: HttpClient + ?Sized>(
    client: &C,
    job: &DownloadJob<'_>,
    reporter: &SharedProgressReporter,
) -> Result<DownloadedArtifact, DownloadError> {
    let url = job.enclosure.url.as_str();

    let response = client
        .get_stream(url)
        .await
        .map_err(|e| DownloadError::HttpFailed {
            url: url.to_string(),
            source: e,
        })?;

    if !is_success(response.status) {
        return Err(DownloadError::HttpStatus {
            url: url.to_string(),
            status: response.status,
        });
    }

    reporter.report(ProgressEvent::DownloadStarting {
        item_title: job.item.title.clone(),
        index: job.index,
        total: job.total,
        content_length: response.content_length,
    });

    let written = stream_to_file(
        response.body,
        response.content_length,
        job,
        &job.paths.partial,
        reporter,
    )
    .await;

    let (bytes, content_hash) = match written {
        Ok(result) => result,
        Err(e) => {
            remove_quietly(&job.paths.partial).await;
            return Err(e);
        }
    };

    if let Err(e) = tokio::fs::rename(&job.paths.partial, &job.paths.audio).await {
        remove_quietly(&job.paths.partial).await;
        return Err(DownloadError::FinalizeFailed {
            from: job.paths.partial.clone(),
            source: e,
        });
    }

    let marker = Marker {
        subscription_title: job.subscription.title.clone(),
        subscription_url: job.subscription.url.clone(),
        item_title: job.item.title.clone(),
        guid: job.item.guid.clone(),
        published: job.item.published,
        enclosure_url: url.to_string(),
        mime_type: job.enclosure.mime_type.clone(),
        audio_filename: file_name(&job.paths.audio),
        bytes,
        content_hash: content_hash.clone(),
        downloaded_at: String::new(),
    }
    .touch();

    if let Err(e) = write_marker(&marker, &job.paths.marker) {
        remove_quietly(&job.paths.audio).await;
        return Err(e.into());
    }

    reporter.report(ProgressEvent::DownloadCompleted {
        item_title: job.item.title.clone(),
        bytes_downloaded: bytes,
    });

    Ok(DownloadedArtifact {
        subscription_title: job.subscription.title.clone(),
        item_title: job.item.title.clone(),
        published: job.item.published,
        path: job.paths.audio.clone(),
        marker_path: job.paths.marker.clone(),
        bytes,
        content_hash,
    })
}

/// Stream `body` into `path`, returning the byte count and content hash
async fn stream_to_file(
    mut body: ByteStream,
    content_length: Option<u64>,
    job: &DownloadJob<'_>,
    path: &Path,
    reporter: &SharedProgressReporter,
) -> Result<(u64, String), DownloadError> {
    let url = job.enclosure.url.as_str();
    let write_err = |e| DownloadError::FileWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    let file = File::create(path)
        .await
        .map_err(|e| DownloadError::FileCreateFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
    let mut writer = BufWriter::with_capacity(DOWNLOAD_CHUNK_SIZE, file);

    let mut hasher = Sha256::new();
    let mut bytes_downloaded: u64 = 0;

    while let Some(chunk_result) = body.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::StreamFailed {
            url: url.to_string(),
            source: e,
        })?;

        for piece in chunk.chunks(DOWNLOAD_CHUNK_SIZE) {
            writer.write_all(piece).await.map_err(write_err)?;
            hasher.update(piece);
        }
        bytes_downloaded += chunk.len() as u64;

        reporter.report(ProgressEvent::DownloadProgress {
            item_title: job.item.title.clone(),
            bytes_downloaded,
            total_bytes: content_length,
        });
    }

    writer.flush().await.map_err(write_err)?;
    writer.get_ref().sync_all().await.map_err(write_err)?;

    debug!(url, bytes = bytes_downloaded, "Stream finished");

    if let Some(expected) = content_length
        && expected != bytes_downloaded
    {
        warn!(
            url,
            expected,
            received = bytes_downloaded,
            "Content-Length mismatch"
        );
    }

    Ok((bytes_downloaded, format!("sha256:{:x}", hasher.finalize())))
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        warn!(path = %path.display(), "Failed to remove incomplete file: {e}");
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
