// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use chrono::{DateTime, FixedOffset};
use tracing::warn;
use url::Url;

use crate::error::{EntryError, FeedError};

/// A freshly fetched feed. Never persisted.
#[derive(Debug)]
pub struct FeedDocument {
    pub title: String,
    pub link: String,
    pub description: String,
    /// Feed-level last update time, epoch seconds
    pub updated: Option<i64>,
    pub feed_url: Url,
    /// Entries in document order
    pub items: Vec<FeedItem>,
    /// Entries dropped because they could not be parsed
    pub rejected: Vec<EntryError>,
}

/// A single feed entry
#[derive(Debug, Clone)]
pub struct FeedItem {
    pub title: String,
    /// Publish time, epoch seconds
    pub published: i64,
    pub pub_date: DateTime<FixedOffset>,
    pub description: Option<String>,
    pub link: Option<String>,
    pub guid: Option<String>,
    pub enclosures: Vec<Enclosure>,
}

/// A media attachment referenced by an item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enclosure {
    pub url: Url,
    pub mime_type: Option<String>,
    pub length: Option<u64>,
}

/// Parse feed bytes as RSS 2.0, falling back to Atom
pub fn parse_feed(xml_bytes: &[u8], feed_url: Url) -> Result<FeedDocument, FeedError> {
    let document = match rss::Channel::read_from(xml_bytes) {
        Ok(channel) => from_rss(&channel, feed_url),
        Err(rss_err) => match atom_syndication::Feed::read_from(xml_bytes) {
            Ok(feed) => from_atom(&feed, feed_url),
            Err(atom_err) => {
                return Err(FeedError::ParseFailed {
                    rss: rss_err,
                    atom: atom_err,
                });
            }
        },
    };

    for rejected in &document.rejected {
        warn!(feed = %document.title, "Dropping entry: {rejected}");
    }

    Ok(document)
}

fn from_rss(channel: &rss::Channel, feed_url: Url) -> FeedDocument {
    let (items, rejected) = partition(channel.items().iter().map(rss_item));

    let updated = channel
        .last_build_date()
        .or_else(|| channel.pub_date())
        .and_then(|d| parse_date(d).ok())
        .map(|dt| dt.timestamp());

    FeedDocument {
        title: channel.title().to_string(),
        link: channel.link().to_string(),
        description: channel.description().to_string(),
        updated,
        feed_url,
        items,
        rejected,
    }
}

fn rss_item(item: &rss::Item) -> Result<FeedItem, EntryError> {
    let title = item
        .title()
        .map(String::from)
        .unwrap_or_else(|| "Untitled Episode".to_string());

    let date_str = item.pub_date().ok_or_else(|| EntryError::MissingDate {
        title: title.clone(),
    })?;
    let pub_date = parse_date(date_str).map_err(|_| EntryError::InvalidDate {
        title: title.clone(),
        date_str: date_str.to_string(),
    })?;

    let enclosures = item
        .enclosure()
        .map(|enclosure| {
            let url = Url::parse(enclosure.url()).map_err(|e| EntryError::InvalidEnclosureUrl {
                title: title.clone(),
                source: e,
            })?;
            Ok(Enclosure {
                url,
                mime_type: Some(enclosure.mime_type().to_string()).filter(|s| !s.is_empty()),
                length: enclosure.length().parse().ok(),
            })
        })
        .transpose()?
        .into_iter()
        .collect();

    Ok(FeedItem {
        title,
        published: pub_date.timestamp(),
        pub_date,
        description: item.description().map(String::from),
        link: item.link().map(String::from),
        guid: item.guid().map(|g| g.value().to_string()),
        enclosures,
    })
}

fn from_atom(feed: &atom_syndication::Feed, feed_url: Url) -> FeedDocument {
    let (items, rejected) = partition(feed.entries().iter().map(atom_entry));

    let link = feed
        .links()
        .iter()
        .find(|l| l.rel() == "alternate")
        .or_else(|| feed.links().first())
        .map(|l| l.href().to_string())
        .unwrap_or_default();

    FeedDocument {
        title: feed.title().as_str().to_string(),
        link,
        description: feed
            .subtitle()
            .map(|s| s.as_str().to_string())
            .unwrap_or_default(),
        updated: Some(feed.updated().timestamp()),
        feed_url,
        items,
        rejected,
    }
}

fn atom_entry(entry: &atom_syndication::Entry) -> Result<FeedItem, EntryError> {
    let title = entry.title().as_str().to_string();

    let pub_date = *entry.published().unwrap_or_else(|| entry.updated());

    let enclosures = entry
        .links()
        .iter()
        .filter(|l| l.rel() == "enclosure")
        .map(|l| {
            let url = Url::parse(l.href()).map_err(|e| EntryError::InvalidEnclosureUrl {
                title: title.clone(),
                source: e,
            })?;
            Ok(Enclosure {
                url,
                mime_type: l.mime_type().map(String::from),
                length: l.length().and_then(|len| len.parse().ok()),
            })
        })
        .collect::<Result<Vec<_>, EntryError>>()?;

    let link = entry
        .links()
        .iter()
        .find(|l| l.rel() == "alternate")
        .map(|l| l.href().to_string());

    Ok(FeedItem {
        title,
        published: pub_date.timestamp(),
        pub_date,
        description: entry.summary().map(|s| s.as_str().to_string()),
        link,
        guid: Some(entry.id().to_string()),
        enclosures,
    })
}

fn partition(
    results: impl Iterator<Item = Result<FeedItem, EntryError>>,
) -> (Vec<FeedItem>, Vec<EntryError>) {
    let mut items = Vec::new();
    let mut rejected = Vec::new();
    for result in results {
        match result {
            Ok(item) => items.push(item),
            Err(e) => rejected.push(e),
        }
    }
    (items, rejected)
}

/// Parse an RSS date, tolerating common deviations from RFC 2822
fn parse_date(date_str: &str) -> Result<DateTime<FixedOffset>, chrono::ParseError> {
    let date_str = date_str.trim();
    DateTime::parse_from_rfc2822(date_str).or_else(|err| {
        const FORMATS: [&str; 3] = [
            "%a, %d %b %Y %H:%M:%S %z",
            "%d %b %Y %H:%M:%S %z",
            "%Y-%m-%d %H:%M:%S %z",
        ];

        FORMATS
            .iter()
            .find_map(|format| DateTime::parse_from_str(date_str, format).ok())
            .or_else(|| DateTime::parse_from_rfc3339(date_str).ok())
            .ok_or(err)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Test Podcast</title>
    <description>A test podcast for unit testing</description>
    <link>https://example.com</link>
    <lastBuildDate>Tue, 02 Jan 2024 08:00:00 +0000</lastBuildDate>
    <item>
      <title>Episode 1</title>
      <description>First episode</description>
      <link>https://example.com/ep1</link>
      <pubDate>Mon, 01 Jan 2024 12:00:00 +0000</pubDate>
      <guid>ep1-guid</guid>
      <enclosure url="https://example.com/ep1.mp3" length="1234567" type="audio/mpeg"/>
    </item>
    <item>
      <title>Episode 2</title>
      <pubDate>Tue, 02 Jan 2024 12:00:00 +0100</pubDate>
    </item>
    <item>
      <title>Bad Date</title>
      <pubDate>sometime last week</pubDate>
      <enclosure url="https://example.com/bad.mp3" type="audio/mpeg"/>
    </item>
    <item>
      <title>No Date</title>
      <enclosure url="https://example.com/nodate.mp3" type="audio/mpeg"/>
    </item>
  </channel>
</rss>"#;

    const SAMPLE_ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Show</title>
  <subtitle>An atom podcast</subtitle>
  <link rel="alternate" href="https://atom.example.com/"/>
  <id>urn:uuid:feed</id>
  <updated>2024-02-01T00:00:00Z</updated>
  <entry>
    <title>Atom One</title>
    <id>urn:uuid:one</id>
    <updated>2024-01-20T00:00:00Z</updated>
    <published>2024-01-15T10:00:00Z</published>
    <summary>First</summary>
    <link rel="enclosure" type="audio/mpeg" length="42" href="https://atom.example.com/one.mp3"/>
  </entry>
  <entry>
    <title>Atom Two</title>
    <id>urn:uuid:two</id>
    <updated>2024-01-25T00:00:00Z</updated>
    <link rel="enclosure" type="audio/mpeg" href="https://atom.example.com/two-a.mp3"/>
    <link rel="enclosure" type="audio/ogg" href="https://atom.example.com/two-b.ogg"/>
  </entry>
</feed>"#;

    fn feed_url() -> Url {
        Url::parse("https://example.com/feed.xml").unwrap()
    }

    #[test]
    fn parse_rss_extracts_feed_metadata() {
        let doc = parse_feed(SAMPLE_RSS.as_bytes(), feed_url()).unwrap();

        assert_eq!(doc.title, "Test Podcast");
        assert_eq!(doc.description, "A test podcast for unit testing");
        assert_eq!(doc.link, "https://example.com");
        assert_eq!(doc.updated, Some(1_704_182_400));
        assert_eq!(doc.feed_url, feed_url());
    }

    #[test]
    fn parse_rss_extracts_items() {
        let doc = parse_feed(SAMPLE_RSS.as_bytes(), feed_url()).unwrap();

        assert_eq!(doc.items.len(), 2);

        let ep1 = &doc.items[0];
        assert_eq!(ep1.title, "Episode 1");
        assert_eq!(ep1.published, 1_704_110_400);
        assert_eq!(ep1.guid.as_deref(), Some("ep1-guid"));
        assert_eq!(ep1.link.as_deref(), Some("https://example.com/ep1"));
        assert_eq!(
            ep1.enclosures,
            vec![Enclosure {
                url: Url::parse("https://example.com/ep1.mp3").unwrap(),
                mime_type: Some("audio/mpeg".to_string()),
                length: Some(1234567),
            }]
        );

        let ep2 = &doc.items[1];
        assert_eq!(ep2.published, 1_704_193_200);
        assert!(ep2.enclosures.is_empty());
    }

    #[test]
    fn bad_entry_dates_only_drop_that_entry() {
        let doc = parse_feed(SAMPLE_RSS.as_bytes(), feed_url()).unwrap();

        assert_eq!(doc.rejected.len(), 2);
        assert!(matches!(
            &doc.rejected[0],
            EntryError::InvalidDate { title, .. } if title == "Bad Date"
        ));
        assert!(matches!(
            &doc.rejected[1],
            EntryError::MissingDate { title } if title == "No Date"
        ));
    }

    #[test]
    fn parse_atom_feed() {
        let doc = parse_feed(SAMPLE_ATOM.as_bytes(), feed_url()).unwrap();

        assert_eq!(doc.title, "Atom Show");
        assert_eq!(doc.description, "An atom podcast");
        assert_eq!(doc.link, "https://atom.example.com/");
        assert_eq!(doc.items.len(), 2);

        let one = &doc.items[0];
        assert_eq!(one.published, 1_705_312_800);
        assert_eq!(one.enclosures[0].length, Some(42));
        assert_eq!(one.guid.as_deref(), Some("urn:uuid:one"));

        // No <published>, falls back to <updated>
        let two = &doc.items[1];
        assert_eq!(two.published, 1_706_140_800);
        assert_eq!(two.enclosures.len(), 2);
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let result = parse_feed(b"<html><body>nope</body></html>", feed_url());
        assert!(matches!(result, Err(FeedError::ParseFailed { .. })));
    }

    #[test]
    fn relaxed_dates_are_accepted() {
        assert!(parse_date("01 Jan 2024 12:00:00 +0000").is_ok());
        assert!(parse_date("2024-01-01 12:00:00 +0000").is_ok());
        assert!(parse_date("2024-01-01T12:00:00+00:00").is_ok());
        assert!(parse_date("  Mon, 01 Jan 2024 12:00:00 GMT ").is_ok());
        assert!(parse_date("yesterday").is_err());
    }
}
