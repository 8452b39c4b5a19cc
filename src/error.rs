use std::path::PathBuf;
use thiserror::Error;

/// Transport-level failure from the HTTP layer
#[derive(Error, Debug)]
pub enum TransportError {
    #[error(transparent)]
    Request(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors that can occur when fetching or parsing a whole feed
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Failed to fetch feed from {url}: {source}")]
    FetchFailed {
        url: String,
        #[source]
        source: TransportError,
    },

    #[error("HTTP error {status} for feed {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to parse feed as RSS ({rss}) or Atom ({atom})")]
    ParseFailed {
        rss: rss::Error,
        atom: atom_syndication::Error,
    },

    #[error("Invalid feed URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl FeedError {
    /// Whether this is a network/status failure rather than a malformed document
    pub fn is_http(&self) -> bool {
        matches!(self, Self::FetchFailed { .. } | Self::HttpStatus { .. })
    }
}

/// A single feed entry that could not be turned into a `FeedItem`.
///
/// These never abort a fetch; the entry is dropped and recorded.
#[derive(Error, Debug)]
pub enum EntryError {
    #[error("Entry '{title}' has no publish date")]
    MissingDate { title: String },

    #[error("Entry '{title}' has unparseable date '{date_str}'")]
    InvalidDate { title: String, date_str: String },

    #[error("Entry '{title}' has invalid enclosure URL: {source}")]
    InvalidEnclosureUrl {
        title: String,
        #[source]
        source: url::ParseError,
    },
}

/// Reasons an item is not eligible for download
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EligibilityError {
    #[error("no enclosure")]
    NoEnclosure,

    #[error("{count} enclosures, expected exactly one")]
    MultipleEnclosures { count: usize },

    #[error("unsupported enclosure type '{mime_type}'")]
    UnsupportedType { mime_type: String },
}

/// Errors that can occur during enclosure downloads
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("HTTP request failed for {url}: {source}")]
    HttpFailed {
        url: String,
        #[source]
        source: TransportError,
    },

    #[error("HTTP error {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to create file {path}: {source}")]
    FileCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write to file {path}: {source}")]
    FileWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Stream error while downloading {url}: {source}")]
    StreamFailed {
        url: String,
        #[source]
        source: TransportError,
    },

    #[error("Failed to move {from} into place: {source}")]
    FinalizeFailed {
        from: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write marker: {0}")]
    MarkerFailed(#[from] PersistError),
}

/// Errors from atomic file persistence
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("I/O error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize JSON: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors from the persisted subscription store. These are fatal to a run.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to read store {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Store {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to save store: {0}")]
    WriteFailed(#[from] PersistError),
}

/// An unsubscribe position that does not name a subscription
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("No subscription at position {index} (there are {len})")]
pub struct IndexError {
    pub index: usize,
    pub len: usize,
}

/// Errors that can occur when preparing a subscription's directory
#[derive(Error, Debug)]
pub enum StateError {
    #[error("Failed to read directory {path}: {source}")]
    ReadDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create directory {path}: {source}")]
    CreateDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Neither POKE_PATH nor HOME is set")]
    NoBaseDir,

    #[error("Failed to read config file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config file {path} is invalid: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to create directory {path}: {source}")]
    CreateDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from `subscribe`
#[derive(Error, Debug)]
pub enum SubscribeError {
    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors from `unsubscribe`
#[derive(Error, Debug)]
pub enum UnsubscribeError {
    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Top-level errors for sync operations.
///
/// Per-feed and per-item failures are logged and counted instead.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
