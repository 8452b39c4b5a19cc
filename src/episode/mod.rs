mod download;
mod filename;
mod marker;

pub use download::{DOWNLOAD_CHUNK_SIZE, DownloadJob, DownloadedArtifact, download_enclosure};
pub use filename::{ArtifactPaths, artifact_paths, file_stem, is_partial_file, subscription_dir};
pub use marker::{Marker, marker_exists, read_marker, write_marker};
