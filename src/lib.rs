pub mod config;
pub mod episode;
pub mod error;
pub mod feed;
pub mod http;
pub mod logging;
pub mod persist;
pub mod progress;
pub mod select;
pub mod state;
pub mod store;
pub mod subscription;
pub mod sync;

// Re-export main types for convenience
pub use config::Config;
pub use episode::{DownloadJob, DownloadedArtifact, download_enclosure};
pub use error::{
    ConfigError, DownloadError, EligibilityError, EntryError, FeedError, IndexError, StoreError,
    SubscribeError, SyncError, TransportError, UnsubscribeError,
};
pub use feed::{Enclosure, FeedDocument, FeedItem, fetch_feed, parse_feed};
pub use http::{HttpClient, HttpResponse, ReqwestClient};
pub use progress::{NoopReporter, ProgressEvent, ProgressReporter, SharedProgressReporter};
pub use select::{check_eligibility, select_new};
pub use store::{FeedStore, Subscription};
pub use subscription::{SubscribeOutcome, list_subscriptions, subscribe, unsubscribe};
pub use sync::{PassReport, SubscriptionReport, SyncContext, run_periodic, sync_once};
