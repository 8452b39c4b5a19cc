use tracing::info;

use crate::config::Config;
use crate::episode::subscription_dir;
use crate::error::{SubscribeError, UnsubscribeError};
use crate::feed::fetch_feed;
use crate::http::HttpClient;
use crate::state::prepare_destination;
use crate::store::{FeedStore, Subscription};

/// Result of a subscribe request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscribeOutcome {
    Subscribed(Subscription),
    /// The URL was already in the store; nothing changed
    AlreadySubscribed,
}

/// Subscribe to the feed at `url`.
///
/// The feed is fetched once to learn its title and metadata; the new
/// subscription starts with a zero watermark, so the next update downloads
/// its whole back catalogue.
pub async fn subscribe<C: HttpClient + ?Sized>(
    client: &C,
    config: &Config,
    store: &mut FeedStore,
    url: &str,
) -> Result<SubscribeOutcome, SubscribeError> {
    if store.contains_url(url) {
        return Ok(SubscribeOutcome::AlreadySubscribed);
    }

    info!(url, "Checking feed");
    let document = fetch_feed(client, url).await?;

    let mut subscription = Subscription::new(
        url,
        document.title,
        document.link,
        document.description,
    );
    subscription.updated = document.updated;

    prepare_destination(&subscription_dir(&config.base_dir, &subscription.title))?;

    store.add(subscription.clone());
    store.save()?;
    info!(url, title = %subscription.title, "Subscribed");

    Ok(SubscribeOutcome::Subscribed(subscription))
}

/// Remove the subscription at 1-based `index` and persist the store.
///
/// Downloaded files are left on disk.
pub fn unsubscribe(store: &mut FeedStore, index: usize) -> Result<Subscription, UnsubscribeError> {
    let removed = store.remove_at(index)?;
    store.save()?;
    info!(url = %removed.url, title = %removed.title, "Unsubscribed");
    Ok(removed)
}

/// Subscriptions in display order
pub fn list_subscriptions(store: &FeedStore) -> &[Subscription] {
    store.list()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FeedError, IndexError, TransportError};
    use crate::http::{BytesResponse, HttpResponse};
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::{TempDir, tempdir};

    const FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>New Show</title>
    <link>https://new.example.com</link>
    <description>Fresh episodes</description>
    <pubDate>Mon, 01 Jan 2024 12:00:00 +0000</pubDate>
  </channel>
</rss>"#;

    struct FeedClient {
        status: u16,
        fetches: AtomicUsize,
    }

    impl FeedClient {
        fn new(status: u16) -> Self {
            Self {
                status,
                fetches: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl HttpClient for FeedClient {
        async fn get_bytes(&self, _url: &str) -> Result<BytesResponse, TransportError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(BytesResponse {
                status: self.status,
                body: Bytes::from_static(FEED.as_bytes()),
            })
        }

        async fn get_stream(&self, _url: &str) -> Result<HttpResponse, TransportError> {
            unreachable!("subscribe never downloads")
        }
    }

    fn setup() -> (TempDir, Config, FeedStore) {
        let dir = tempdir().unwrap();
        let config = Config::with_base_dir(dir.path());
        let store = FeedStore::load(config.store_path()).unwrap();
        (dir, config, store)
    }

    #[tokio::test]
    async fn subscribe_adds_and_saves() {
        let (_dir, config, mut store) = setup();
        let client = FeedClient::new(200);

        let outcome = subscribe(&client, &config, &mut store, "https://new.example.com/rss")
            .await
            .unwrap();

        let SubscribeOutcome::Subscribed(subscription) = outcome else {
            panic!("expected a new subscription");
        };
        assert_eq!(subscription.title, "New Show");
        assert_eq!(subscription.link, "https://new.example.com");
        assert_eq!(subscription.description, "Fresh episodes");
        assert_eq!(subscription.updated, Some(1_704_110_400));
        assert_eq!(subscription.watermark(), 0);

        assert!(config.base_dir.join("New Show").is_dir());
        let reloaded = FeedStore::load(config.store_path()).unwrap();
        assert_eq!(reloaded.list(), &[subscription]);
    }

    #[tokio::test]
    async fn subscribing_twice_is_a_noop() {
        let (_dir, config, mut store) = setup();
        let client = FeedClient::new(200);
        let url = "https://new.example.com/rss";

        subscribe(&client, &config, &mut store, url).await.unwrap();
        let second = subscribe(&client, &config, &mut store, url).await.unwrap();

        assert_eq!(second, SubscribeOutcome::AlreadySubscribed);
        assert_eq!(store.len(), 1);
        assert_eq!(client.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_fetch_does_not_subscribe() {
        let (_dir, config, mut store) = setup();
        let client = FeedClient::new(404);

        let result = subscribe(&client, &config, &mut store, "https://new.example.com/rss").await;

        assert!(matches!(
            result,
            Err(SubscribeError::Feed(FeedError::HttpStatus { status: 404, .. }))
        ));
        assert!(store.is_empty());
        assert!(!config.store_path().exists());
    }

    #[tokio::test]
    async fn unsubscribe_removes_exactly_one_entry() {
        let (_dir, _config, mut store) = setup();
        for n in 1..=3 {
            store.add(Subscription::new(
                format!("https://example.com/{n}"),
                format!("Show {n}"),
                "",
                "",
            ));
        }
        store.save().unwrap();

        let removed = unsubscribe(&mut store, 2).unwrap();
        assert_eq!(removed.title, "Show 2");

        let reloaded = FeedStore::load(store.path()).unwrap();
        let titles: Vec<_> = list_subscriptions(&reloaded)
            .iter()
            .map(|s| s.title.as_str())
            .collect();
        assert_eq!(titles, ["Show 1", "Show 3"]);
    }

    #[tokio::test]
    async fn unsubscribe_out_of_range_changes_nothing() {
        let (_dir, _config, mut store) = setup();
        store.add(Subscription::new("https://example.com/1", "Show 1", "", ""));
        store.save().unwrap();
        let before = std::fs::read(store.path()).unwrap();

        for index in [0, 2, 99] {
            let err = unsubscribe(&mut store, index).unwrap_err();
            assert!(matches!(
                err,
                UnsubscribeError::Index(IndexError { len: 1, .. })
            ));
        }

        assert_eq!(store.len(), 1);
        assert_eq!(std::fs::read(store.path()).unwrap(), before);
    }
}
