//!
//! Transport seam between the download core and the network.
//!

use std::io;
use std::pin::Pin;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use headers::HeaderMapExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_RANGES, CONTENT_LENGTH, USER_AGENT};
use reqwest::{Client, StatusCode};
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;
use url::Url;

use crate::download::chunk_range::ByteRange;
use crate::download::error::TransportError;

pub type RangeBody = Pin<Box<dyn AsyncRead + Send>>;

/// Result of the metadata probe. `content_length` is kept raw so that the
/// core decides whether it is a usable size.
#[derive(Debug, Clone)]
pub struct ResourceMetadata {
    pub status: StatusCode,
    pub supports_range_requests: bool,
    pub content_length: Option<String>,
}

pub struct RangeResponse {
    pub status: StatusCode,
    pub body: RangeBody,
}

#[async_trait]
pub trait MetadataProbe: Send + Sync {
    async fn probe(&self, url: &Url) -> Result<ResourceMetadata, TransportError>;
}

#[async_trait]
pub trait RangeTransport: Send + Sync {
    async fn fetch_range(&self, url: &Url, range: ByteRange) -> Result<RangeResponse, TransportError>;
}

/// HTTP implementation of both seams on top of one shared [`Client`].
#[derive(Clone)]
pub struct HttpTransport {
    // Client 内部拥有连接池，clone 即可复用
    client: Client,
    user_agent: Option<HeaderValue>,
}

impl HttpTransport {
    pub fn new(client: Client) -> Self {
        Self { client, user_agent: None }
    }

    pub fn with_user_agent(mut self, agent: &str) -> Self {
        self.user_agent = HeaderValue::from_str(agent).ok();
        self
    }

    fn base_headers(&self) -> HeaderMap {
        let mut header_map = HeaderMap::new();
        header_map.insert(ACCEPT, HeaderValue::from_static("*/*"));
        header_map.typed_insert(headers::Connection::keep_alive());
        if let Some(agent) = &self.user_agent {
            header_map.insert(USER_AGENT, agent.clone());
        }

        header_map
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(Client::new())
    }
}

#[async_trait]
impl MetadataProbe for HttpTransport {
    async fn probe(&self, url: &Url) -> Result<ResourceMetadata, TransportError> {
        let response = self
            .client
            .head(url.clone())
            .headers(self.base_headers())
            .send()
            .await?;

        let headers = response.headers();
        let supports_range_requests = headers
            .get(ACCEPT_RANGES)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("bytes"));
        let content_length = headers
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        Ok(ResourceMetadata {
            status: response.status(),
            supports_range_requests,
            content_length,
        })
    }
}

#[async_trait]
impl RangeTransport for HttpTransport {
    async fn fetch_range(&self, url: &Url, range: ByteRange) -> Result<RangeResponse, TransportError> {
        let mut header_map = self.base_headers();
        if let Some(range_header) = range.to_range_header() {
            header_map.typed_insert(range_header);
        }

        let response = self
            .client
            .get(url.clone())
            .headers(header_map)
            .send()
            .await?;

        let status = response.status();
        let stream = response.bytes_stream().map_err(io::Error::other);

        Ok(RangeResponse {
            status,
            body: Box::pin(StreamReader::new(stream)),
        })
    }
}
