// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashMap;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::episode::{
    ArtifactPaths, DownloadJob, DownloadedArtifact, artifact_paths, download_enclosure, file_stem,
    marker_exists, read_marker, subscription_dir,
};
use crate::error::{DownloadError, EligibilityError, SyncError};
use crate::feed::{Enclosure, FeedItem, fetch_feed};
use crate::http::HttpClient;
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::select::{check_eligibility, select_new};
use crate::state::prepare_destination;
use crate::store::{FeedStore, Subscription};

/// Collaborators shared by every step of a sync, built once per process
pub struct SyncContext<C> {
    pub client: C,
    pub config: Config,
    pub reporter: SharedProgressReporter,
}

impl<C: HttpClient> SyncContext<C> {
    pub fn new(client: C, config: Config, reporter: SharedProgressReporter) -> Self {
        Self {
            client,
            config,
            reporter,
        }
    }
}

/// Outcome of processing one subscription
#[derive(Debug, Clone, Default)]
pub struct SubscriptionReport {
    pub title: String,
    pub url: String,
    /// Watermark after this pass; never below the one the pass started with
    pub watermark: i64,
    /// Feed-declared update time, if the fetch succeeded and the feed has one
    pub updated: Option<i64>,
    /// Set when the feed could not be fetched or the directory prepared
    pub fetch_failed: Option<String>,
    pub downloaded: Vec<DownloadedArtifact>,
    /// New items skipped because of their enclosure
    pub ineligible: usize,
    /// New items whose marker already existed
    pub already_present: usize,
    /// The download that halted this subscription, if any
    pub failed: Option<String>,
}

impl SubscriptionReport {
    fn new(subscription: &Subscription) -> Self {
        Self {
            title: subscription.title.clone(),
            url: subscription.url.clone(),
            watermark: subscription.watermark(),
            ..Default::default()
        }
    }

    pub fn skipped(&self) -> usize {
        self.ineligible + self.already_present
    }
}

/// Outcome of a full pass over the store
#[derive(Debug, Clone, Default)]
pub struct PassReport {
    pub subscriptions: Vec<SubscriptionReport>,
}

impl PassReport {
    pub fn downloaded(&self) -> usize {
        self.subscriptions.iter().map(|s| s.downloaded.len()).sum()
    }

    pub fn skipped(&self) -> usize {
        self.subscriptions.iter().map(SubscriptionReport::skipped).sum()
    }

    /// Subscriptions that failed to fetch or halted on a download
    pub fn failed(&self) -> usize {
        self.subscriptions
            .iter()
            .filter(|s| s.fetch_failed.is_some() || s.failed.is_some())
            .count()
    }
}

enum ItemOutcome {
    Downloaded(DownloadedArtifact),
    Ineligible(EligibilityError),
    AlreadyPresent,
    Failed(DownloadError),
}

/// Run one pass over every subscription in store order.
///
/// Feed and download failures are logged and reported but never abort the
/// pass. The store is saved after each subscription; a store error is the
/// only thing that stops the pass early.
pub async fn sync_once<C: HttpClient>(
    ctx: &SyncContext<C>,
    store: &mut FeedStore,
) -> Result<PassReport, SyncError> {
    info!(subscriptions = store.len(), "Poke update begin");

    let subscriptions = store.list().to_vec();
    let mut pass = PassReport::default();

    for subscription in &subscriptions {
        let report = sync_subscription(ctx, subscription).await;

        if let Some(entry) = store.get_mut(&subscription.url) {
            entry.advance_watermark(report.watermark);
            if report.updated.is_some() {
                entry.updated = report.updated;
            }
        }
        store.save()?;

        ctx.reporter.report(ProgressEvent::SubscriptionSynced {
            title: report.title.clone(),
            watermark: report.watermark,
            downloaded: report.downloaded.len(),
            skipped: report.skipped(),
            failed: usize::from(report.failed.is_some()),
        });
        pass.subscriptions.push(report);
    }

    ctx.reporter.report(ProgressEvent::PassCompleted {
        subscriptions: pass.subscriptions.len(),
        downloaded: pass.downloaded(),
        skipped: pass.skipped(),
        failed: pass.failed(),
    });
    info!(
        downloaded = pass.downloaded(),
        skipped = pass.skipped(),
        failed = pass.failed(),
        "Poke update ends"
    );

    Ok(pass)
}

/// Repeat `sync_once` every `poll_interval` until `cancel` fires.
///
/// The store is reloaded before each pass so subscriptions added by other
/// invocations are picked up.
pub async fn run_periodic<C: HttpClient>(
    ctx: &SyncContext<C>,
    store: &mut FeedStore,
    cancel: CancellationToken,
) -> Result<(), SyncError> {
    while !cancel.is_cancelled() {
        store.reload()?;

        tokio::select! {
            result = sync_once(ctx, store) => {
                result?;
            }
            _ = cancel.cancelled() => {
                warn!("Update cancelled during a pass");
                return Ok(());
            }
        }

        debug!(
            interval_secs = ctx.config.poll_interval.as_secs(),
            "Sleeping until next pass"
        );
        tokio::select! {
            _ = tokio::time::sleep(ctx.config.poll_interval) => {}
            _ = cancel.cancelled() => {}
        }
    }

    info!("Update loop stopped");
    Ok(())
}

/// Fetch one subscription and download its new eligible items, oldest first.
///
/// The returned watermark only covers whole publish-time groups that were
/// fully processed, so a failed download is retried on the next pass even
/// when a sibling with the same publish time succeeded.
pub async fn sync_subscription<C: HttpClient>(
    ctx: &SyncContext<C>,
    subscription: &Subscription,
) -> SubscriptionReport {
    let mut report = SubscriptionReport::new(subscription);
    let title = subscription.title.as_str();

    info!(feed = %title, url = %subscription.url, "Updating");
    ctx.reporter.report(ProgressEvent::FetchingFeed {
        title: title.to_string(),
        url: subscription.url.clone(),
    });

    let dir = subscription_dir(&ctx.config.base_dir, title);
    let destination = match prepare_destination(&dir) {
        Ok(destination) => destination,
        Err(e) => {
            error!(feed = %title, "Cannot prepare download directory: {e}");
            return fail_feed(ctx, report, e.to_string());
        }
    };
    if destination.partial_files_cleaned > 0 {
        ctx.reporter.report(ProgressEvent::PartialFilesCleanedUp {
            count: destination.partial_files_cleaned,
        });
    }

    let document = match fetch_feed(&ctx.client, &subscription.url).await {
        Ok(document) => document,
        Err(e) => {
            error!(feed = %title, "Fetch feed failed: {e}");
            return fail_feed(ctx, report, e.to_string());
        }
    };
    report.updated = document.updated;

    let new_items = select_new(&document.items, subscription.watermark());
    info!(
        feed = %title,
        total = document.items.len(),
        new = new_items.len(),
        "Items found"
    );
    ctx.reporter.report(ProgressEvent::FeedParsed {
        title: title.to_string(),
        total_items: document.items.len(),
        new_items: new_items.len(),
    });

    let shared_times = shared_publish_times(&new_items);

    // Publish time of the group currently being processed; every item of it
    // so far has been handled.
    let mut group: Option<i64> = None;

    for (index, item) in new_items.iter().enumerate() {
        if let Some(time) = group
            && item.published > time
        {
            report.watermark = time;
        }

        debug!(feed = %title, item = %item.title, published = item.published, "Processing item");

        let job_context = JobContext {
            subscription,
            dir: &destination.dir,
            index,
            total: new_items.len(),
            disambiguate: shared_times.get(&item.published).is_some_and(|n| *n > 1),
        };

        match process_item(ctx, &job_context, item).await {
            ItemOutcome::Downloaded(artifact) => {
                info!(feed = %title, item = %item.title, path = %artifact.path.display(), "Download complete");
                report.downloaded.push(artifact);
            }
            ItemOutcome::Ineligible(reason) => {
                warn!(feed = %title, item = %item.title, "Skipped: {reason}");
                ctx.reporter.report(ProgressEvent::ItemSkipped {
                    item_title: item.title.clone(),
                    reason: reason.to_string(),
                });
                report.ineligible += 1;
            }
            ItemOutcome::AlreadyPresent => {
                debug!(feed = %title, item = %item.title, "Already downloaded");
                ctx.reporter.report(ProgressEvent::ItemSkipped {
                    item_title: item.title.clone(),
                    reason: "already downloaded".to_string(),
                });
                report.already_present += 1;
            }
            ItemOutcome::Failed(e) => {
                error!(feed = %title, item = %item.title, "Download failed: {e}");
                ctx.reporter.report(ProgressEvent::DownloadFailed {
                    item_title: item.title.clone(),
                    error: e.to_string(),
                });
                report.failed = Some(e.to_string());
                group = None;
                break;
            }
        }

        group = Some(item.published);
    }

    if let Some(time) = group {
        report.watermark = time;
    }

    report
}

struct JobContext<'a> {
    subscription: &'a Subscription,
    dir: &'a std::path::Path,
    index: usize,
    total: usize,
    disambiguate: bool,
}

async fn process_item<C: HttpClient>(
    ctx: &SyncContext<C>,
    job_context: &JobContext<'_>,
    item: &FeedItem,
) -> ItemOutcome {
    let enclosure = match check_eligibility(item) {
        Ok(enclosure) => enclosure,
        Err(reason) => return ItemOutcome::Ineligible(reason),
    };

    let Some(paths) = locate_artifacts(job_context, item, enclosure) else {
        return ItemOutcome::AlreadyPresent;
    };

    let job = DownloadJob {
        subscription: job_context.subscription,
        item,
        enclosure,
        paths,
        index: job_context.index,
        total: job_context.total,
    };

    match download_enclosure(&ctx.client, &job, &ctx.reporter).await {
        Ok(artifact) => ItemOutcome::Downloaded(artifact),
        Err(e) => ItemOutcome::Failed(e),
    }
}

/// Paths to download `item` to, or `None` when it is already on disk.
///
/// Whether a stem carries the URL hash depends on which siblings were in the
/// feed at the time, so both spellings are checked. The plain one only counts
/// when its marker names this enclosure.
fn locate_artifacts(
    job_context: &JobContext<'_>,
    item: &FeedItem,
    enclosure: &Enclosure,
) -> Option<ArtifactPaths> {
    let title = &job_context.subscription.title;
    let plain = artifact_paths(job_context.dir, &file_stem(title, item.published, None));
    let hashed = artifact_paths(
        job_context.dir,
        &file_stem(title, item.published, Some(&enclosure.url)),
    );

    if marker_exists(&hashed.marker) {
        return None;
    }

    let plain_taken = marker_exists(&plain.marker);
    if plain_taken
        && read_marker(&plain.marker)
            .is_ok_and(|marker| marker.enclosure_url == enclosure.url.as_str())
    {
        return None;
    }

    if job_context.disambiguate || plain_taken {
        Some(hashed)
    } else {
        Some(plain)
    }
}

fn fail_feed<C>(
    ctx: &SyncContext<C>,
    mut report: SubscriptionReport,
    error: String,
) -> SubscriptionReport {
    ctx.reporter.report(ProgressEvent::FeedFailed {
        title: report.title.clone(),
        error: error.clone(),
    });
    report.fetch_failed = Some(error);
    report
}

/// Publish times shared by more than one eligible item, with their counts
fn shared_publish_times(items: &[&FeedItem]) -> HashMap<i64, usize> {
    let mut counts: HashMap<i64, usize> = HashMap::new();
    for item in items.iter().filter(|i| check_eligibility(i).is_ok()) {
        *counts.entry(item.published).or_default() += 1;
    }
    counts.retain(|_, n| *n > 1);
    counts
}
