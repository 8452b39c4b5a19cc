// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use bytes::Bytes;
use tracing::debug;
use url::Url;

use crate::error::FeedError;
use crate::http::{HttpClient, is_success};

use super::parse::{FeedDocument, parse_feed};

/// Fetch raw feed bytes from a URL (without parsing)
pub async fn fetch_feed_bytes<C: HttpClient + ?Sized>(
    client: &C,
    url: &str,
) -> Result<Bytes, FeedError> {
    let response = client
        .get_bytes(url)
        .await
        .map_err(|e| FeedError::FetchFailed {
            url: url.to_string(),
            source: e,
        })?;

    if !is_success(response.status) {
        return Err(FeedError::HttpStatus {
            url: url.to_string(),
            status: response.status,
        });
    }

    debug!(url, bytes = response.body.len(), "Fetched feed document");
    Ok(response.body)
}

/// Fetch and parse a feed from a URL
pub async fn fetch_feed<C: HttpClient + ?Sized>(
    client: &C,
    url: &str,
) -> Result<FeedDocument, FeedError> {
    let feed_url = Url::parse(url)?;
    let bytes = fetch_feed_bytes(client, url).await?;
    parse_feed(&bytes, feed_url)
}
