//! Per-request routing: cache first, then network, then offline page.

use reqwest::{Method, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, trace, warn};

use super::{ActiveCache, CacheController};
use crate::error::CacheError;
use crate::models::{cache_key, Request, ResourceEntry, Response};
use crate::network::FetchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Cache,
    Network,
    /// Built-in offline placeholder
    Offline,
    /// Generic error response after an internal fault
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Not intercepted; the host performs the request itself
    Passthrough,
    Respond {
        response: Response,
        source: ResponseSource,
    },
}

impl RouteOutcome {
    fn respond(response: Response, source: ResponseSource) -> Self {
        Self::Respond { response, source }
    }

    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::Passthrough => None,
            Self::Respond { response, .. } => Some(response),
        }
    }

    pub fn source(&self) -> Option<ResponseSource> {
        match self {
            Self::Passthrough => None,
            Self::Respond { source, .. } => Some(*source),
        }
    }
}

#[derive(Debug, Error)]
enum RouteError {
    #[error(transparent)]
    Network(#[from] FetchError),
    #[error(transparent)]
    Internal(#[from] CacheError),
}

impl CacheController {
    /// Only same-origin GETs are intercepted
    pub fn intercepts(&self, request: &Request) -> bool {
        request.method == Method::GET && self.settings.is_same_origin(&request.url)
    }

    fn is_own_script(&self, url: &Url) -> bool {
        url.path() == self.settings.script_url.path()
    }

    /// Decide how to answer an intercepted fetch.
    ///
    /// A network failure is returned as `Err` only for non-page requests;
    /// page requests get the offline page instead. Internal faults become a
    /// 500 response.
    pub async fn handle_fetch(&self, request: &Request) -> Result<RouteOutcome, FetchError> {
        if !self.intercepts(request) {
            trace!(method = %request.method, url = %request.url, "Not intercepted");
            return Ok(RouteOutcome::Passthrough);
        }

        if self.is_own_script(&request.url) {
            debug!(url = %request.url, "Controller script, bypassing cache");
            let response = self
                .fetch_with_timeout(&request.clone().bypassing_cache())
                .await?;
            return Ok(RouteOutcome::respond(response, ResponseSource::Network));
        }

        match self.route(request).await {
            Ok(outcome) => Ok(outcome),
            Err(RouteError::Network(e)) => Err(e),
            Err(RouteError::Internal(e)) => {
                error!(url = %request.url, error = %e, "Routing failed");
                Ok(RouteOutcome::respond(
                    Response::internal_error(),
                    ResponseSource::Error,
                ))
            }
        }
    }

    async fn route(&self, request: &Request) -> Result<RouteOutcome, RouteError> {
        let is_page = request.is_page_request();
        let active = self.active().await;

        if let Some(ref active) = active {
            if let Some(entry) = self.lookup(active, request, is_page).await? {
                debug!(url = %request.url, key = %entry.url, "Cache hit");
                if is_page {
                    self.schedule_refresh(entry.url.clone()).await;
                }
                return Ok(RouteOutcome::respond(entry.response, ResponseSource::Cache));
            }
        }

        debug!(url = %request.url, page = is_page, "Cache miss, trying network");
        match self.fetch_with_timeout(request).await {
            Ok(response) => {
                if response.is_success() {
                    if let Some(ref active) = active {
                        let key = request.cache_key();
                        let entry = ResourceEntry::new(key.clone(), response.clone());
                        if let Err(e) = active.store.put(&key, entry).await {
                            warn!(url = %key, error = %e, "Failed to cache network response");
                        }
                    }
                }
                Ok(RouteOutcome::respond(response, ResponseSource::Network))
            }
            Err(e) if is_page => {
                warn!(url = %request.url, error = %e, "Network failed, serving offline page");
                Ok(RouteOutcome::respond(
                    Response::offline_page(),
                    ResponseSource::Offline,
                ))
            }
            Err(e) => {
                if e.is_timeout() {
                    warn!(url = %request.url, error = %e, "Network timed out");
                } else {
                    debug!(url = %request.url, error = %e, "Network failed");
                }
                Err(e.into())
            }
        }
    }

    /// Exact match first; page requests then try the fallback documents in order.
    async fn lookup(
        &self,
        active: &ActiveCache,
        request: &Request,
        is_page: bool,
    ) -> Result<Option<ResourceEntry>, CacheError> {
        if let Some(entry) = active.store.get(&request.cache_key()).await? {
            return Ok(Some(entry));
        }
        if !is_page {
            return Ok(None);
        }
        for fallback in &self.settings.page_fallbacks {
            if let Some(entry) = active.store.get(&cache_key(fallback)).await? {
                debug!(url = %request.url, fallback = %fallback, "Serving fallback document");
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// Refresh `key` in the background without delaying the response
    async fn schedule_refresh(&self, key: String) {
        let controller = self.clone();
        let handle = tokio::spawn(async move {
            let outcome = controller.background_refresh(&key).await;
            trace!(url = %key, outcome = ?outcome, "Background refresh finished");
        });
        self.state.track_background(handle).await;
    }
}
