use std::sync::Arc;

/// Events emitted during synchronization for progress reporting
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Feed is being fetched from URL
    FetchingFeed { title: String, url: String },

    /// Feed could not be fetched or parsed; the subscription is skipped
    FeedFailed { title: String, error: String },

    /// Feed has been parsed and new items selected
    FeedParsed {
        title: String,
        total_items: usize,
        new_items: usize,
    },

    /// A new item is not downloaded (ineligible or already on disk)
    ItemSkipped { item_title: String, reason: String },

    /// A download is starting
    DownloadStarting {
        item_title: String,
        /// Index of this item among the new items
        index: usize,
        total: usize,
        /// Expected content length in bytes, if known
        content_length: Option<u64>,
    },

    /// Download progress update
    DownloadProgress {
        item_title: String,
        bytes_downloaded: u64,
        total_bytes: Option<u64>,
    },

    /// A download completed successfully
    DownloadCompleted {
        item_title: String,
        bytes_downloaded: u64,
    },

    /// A download failed; remaining items of this subscription wait for the next pass
    DownloadFailed { item_title: String, error: String },

    /// Partial files were cleaned up while preparing a directory
    PartialFilesCleanedUp { count: usize },

    /// A subscription has been processed and persisted
    SubscriptionSynced {
        title: String,
        watermark: i64,
        downloaded: usize,
        skipped: usize,
        failed: usize,
    },

    /// A full pass over all subscriptions completed
    PassCompleted {
        subscriptions: usize,
        downloaded: usize,
        skipped: usize,
        failed: usize,
    },
}

/// Trait for reporting progress events during synchronization.
///
/// Implementations can use this to display progress bars, log messages,
/// or collect statistics.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event
    fn report(&self, event: ProgressEvent);
}

/// A shared reference to a progress reporter
pub type SharedProgressReporter = Arc<dyn ProgressReporter>;

/// A no-op progress reporter that silently ignores all events.
/// Useful for tests or quiet mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: ProgressEvent) {
        // Intentionally empty
    }
}

impl NoopReporter {
    /// Create a new NoopReporter wrapped in an Arc
    pub fn shared() -> SharedProgressReporter {
        Arc::new(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_reporter_handles_all_events() {
        let reporter = NoopReporter;

        reporter.report(ProgressEvent::FetchingFeed {
            title: "Test Podcast".to_string(),
            url: "https://example.com/feed.xml".to_string(),
        });

        reporter.report(ProgressEvent::FeedParsed {
            title: "Test Podcast".to_string(),
            total_items: 10,
            new_items: 5,
        });

        reporter.report(ProgressEvent::ItemSkipped {
            item_title: "Video Episode".to_string(),
            reason: "unsupported enclosure type 'video/mp4'".to_string(),
        });

        reporter.report(ProgressEvent::DownloadProgress {
            item_title: "Episode 1".to_string(),
            bytes_downloaded: 512,
            total_bytes: None,
        });

        reporter.report(ProgressEvent::DownloadFailed {
            item_title: "Episode 2".to_string(),
            error: "Connection timeout".to_string(),
        });

        reporter.report(ProgressEvent::PassCompleted {
            subscriptions: 2,
            downloaded: 4,
            skipped: 5,
            failed: 1,
        });
    }
}
