use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, StoreError};
use crate::persist::write_json_atomic;

/// A feed the user is subscribed to, with its download watermark.
///
/// Field names on disk match the `.feed` document written by earlier
/// versions of poke.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    #[serde(rename = "rss")]
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub description: String,
    /// Feed-declared last update time, epoch seconds
    #[serde(rename = "update_time", default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<i64>,
    /// Publish time of the last fully processed item, epoch seconds. 0 means none.
    #[serde(rename = "poke_time", default)]
    watermark: i64,
}

impl Subscription {
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        link: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            link: link.into(),
            description: description.into(),
            updated: None,
            watermark: 0,
        }
    }

    pub fn watermark(&self) -> i64 {
        self.watermark
    }

    /// Move the watermark forward to `published`; never moves it back.
    ///
    /// Returns whether the watermark changed.
    pub fn advance_watermark(&mut self, published: i64) -> bool {
        if published > self.watermark {
            self.watermark = published;
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    feeds: Vec<Subscription>,
}

/// Durable, ordered collection of subscriptions backed by a JSON file
#[derive(Debug)]
pub struct FeedStore {
    path: PathBuf,
    subscriptions: Vec<Subscription>,
}

impl FeedStore {
    /// Read the store at `path`, or start empty if the file does not exist
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let subscriptions = read_document(&path)?.feeds;
        Ok(Self {
            path,
            subscriptions,
        })
    }

    /// Replace the in-memory state with what is on disk
    pub fn reload(&mut self) -> Result<(), StoreError> {
        self.subscriptions = read_document(&self.path)?.feeds;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Subscriptions in insertion order
    pub fn list(&self) -> &[Subscription] {
        &self.subscriptions
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    pub fn contains_url(&self, url: &str) -> bool {
        self.subscriptions.iter().any(|s| s.url == url)
    }

    pub fn get_mut(&mut self, url: &str) -> Option<&mut Subscription> {
        self.subscriptions.iter_mut().find(|s| s.url == url)
    }

    /// Append a subscription. Uniqueness is the caller's responsibility.
    pub fn add(&mut self, subscription: Subscription) {
        self.subscriptions.push(subscription);
    }

    /// Remove the subscription at 1-based `position`
    pub fn remove_at(&mut self, position: usize) -> Result<Subscription, IndexError> {
        if position == 0 || position > self.subscriptions.len() {
            return Err(IndexError {
                index: position,
                len: self.subscriptions.len(),
            });
        }
        Ok(self.subscriptions.remove(position - 1))
    }

    /// Write a full snapshot, atomically replacing the previous file
    pub fn save(&self) -> Result<(), StoreError> {
        let document = StoreDocument {
            feeds: self.subscriptions.clone(),
        };
        write_json_atomic(&self.path, &document)?;
        Ok(())
    }
}

fn read_document(path: &Path) -> Result<StoreDocument, StoreError> {
    if !path.exists() {
        return Ok(StoreDocument::default());
    }

    let content = std::fs::read_to_string(path).map_err(|e| StoreError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
        path: path.to_path_buf(),
        source: e,
    })
}
