// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

use crate::config::Config;
use crate::error::TransportError;

/// A streaming response body
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// Fully buffered response, used for feed documents
pub struct BytesResponse {
    /// HTTP status code
    pub status: u16,
    pub body: Bytes,
}

/// HTTP response with status, content length, and body stream
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Content-Length header value, if present
    pub content_length: Option<u64>,
    /// Response body as a stream of bytes
    pub body: ByteStream,
}

/// Whether a status code is in the 2xx range
pub fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

/// HTTP client abstraction for testability
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Fetch the entire response body as bytes
    async fn get_bytes(&self, url: &str) -> Result<BytesResponse, TransportError>;

    /// Get a streaming response for large downloads
    async fn get_stream(&self, url: &str) -> Result<HttpResponse, TransportError>;
}

/// Default HTTP client implementation using reqwest
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
    fetch_timeout: Duration,
}

impl ReqwestClient {
    /// Build a client with the timeouts from `config`.
    ///
    /// Feed fetches are bounded by a total timeout. Downloads can run for a
    /// long time, so they are bounded by connect and read-inactivity timeouts.
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("poke/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(config.download_connect_timeout)
            .read_timeout(config.download_read_timeout)
            .build()?;

        Ok(Self::with_client(client, config.fetch_timeout))
    }

    /// Create a new ReqwestClient with a custom reqwest::Client
    pub fn with_client(client: reqwest::Client, fetch_timeout: Duration) -> Self {
        Self {
            client,
            fetch_timeout,
        }
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get_bytes(&self, url: &str) -> Result<BytesResponse, TransportError> {
        let response = self
            .client
            .get(url)
            .timeout(self.fetch_timeout)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;

        Ok(BytesResponse { status, body })
    }

    async fn get_stream(&self, url: &str) -> Result<HttpResponse, TransportError> {
        use futures::StreamExt;

        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let content_length = response.content_length();

        let body: ByteStream = Box::pin(
            response
                .bytes_stream()
                .map(|result| result.map_err(TransportError::from)),
        );

        Ok(HttpResponse {
            status,
            content_length,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reqwest_client_can_be_created_from_config() {
        let config = Config::with_base_dir("/tmp/poke-test");
        let client = ReqwestClient::new(&config).unwrap();
        let _cloned = client.clone();
    }

    #[test]
    fn success_covers_only_2xx() {
        assert!(is_success(200));
        assert!(is_success(204));
        assert!(!is_success(199));
        assert!(!is_success(301));
        assert!(!is_success(404));
        assert!(!is_success(500));
    }
}
