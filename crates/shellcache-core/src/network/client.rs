//! reqwest-backed `Fetcher`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::Client;
use tracing::debug;

use super::{FetchError, Fetcher};
use crate::models::{CacheMode, Request, Response};

/// Connection establishment timeout
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Whole-request timeout, headers and body included.
/// The controller applies its own tighter deadline on top.
const REQUEST_TIMEOUT_SECS: u64 = 30;

const USER_AGENT: &str = concat!("shellcache/", env!("CARGO_PKG_VERSION"));

/// HTTP fetcher.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    fn request_headers(request: &Request) -> HeaderMap {
        let mut headers = request.headers.clone();
        if request.cache == CacheMode::Reload {
            headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
            headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
        }
        headers
    }

    /// Header values that are not valid UTF-8 are dropped
    fn response_headers(headers: &HeaderMap) -> Vec<(String, String)> {
        headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect()
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        let response = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(Self::request_headers(request))
            .send()
            .await?;

        let status = response.status().as_u16();
        let headers = Self::response_headers(response.headers());
        let body = response.bytes().await?.to_vec();

        debug!(url = %request.url, status = status, bytes = body.len(), "Fetched from network");
        Ok(Response {
            status,
            headers,
            body,
        })
    }
}
