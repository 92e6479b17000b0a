//! Background refresh and on-demand update checks.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::CacheController;
use crate::error::{CacheError, CacheResult};
use crate::models::{cache_key, ControllerEvent, Request, ResourceEntry};
use crate::network::FetchError;
use crate::store::CacheStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Another refresh ran within the refresh interval
    Throttled,
    NoActiveCache,
    /// Nothing cached to compare against
    NotCached,
    Unchanged,
    Updated,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCheckReport {
    pub checked: usize,
    pub updated: Vec<String>,
    /// Identifiers whose live copy could not be fetched or stored
    pub skipped: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl UpdateCheckReport {
    pub fn has_updates(&self) -> bool {
        !self.updated.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryCheck {
    NotCached,
    Unchanged,
    Updated,
}

impl CacheController {
    /// Opportunistic refresh of a resource just served from cache.
    ///
    /// Runs at most once per refresh interval across the whole controller,
    /// whichever resource asks.
    pub async fn background_refresh(&self, key: &str) -> RefreshOutcome {
        if !self
            .state
            .try_begin_refresh(self.settings.refresh_interval)
            .await
        {
            debug!(url = %key, "Background refresh throttled");
            return RefreshOutcome::Throttled;
        }
        let Some(active) = self.active().await else {
            return RefreshOutcome::NoActiveCache;
        };

        match self.check_entry(active.store.as_ref(), key).await {
            Ok(EntryCheck::Updated) => {
                info!(url = %key, "Cached resource changed upstream");
                self.clients
                    .broadcast(ControllerEvent::UpdateAvailable {
                        url: Some(key.to_string()),
                        timestamp: Utc::now(),
                    })
                    .await;
                RefreshOutcome::Updated
            }
            Ok(EntryCheck::Unchanged) => RefreshOutcome::Unchanged,
            Ok(EntryCheck::NotCached) => RefreshOutcome::NotCached,
            Err(e) => {
                let reason = format!("{:#}", e);
                debug!(url = %key, error = %reason, "Background refresh failed");
                RefreshOutcome::Failed(reason)
            }
        }
    }

    /// Compare every critical resource with its live copy, right now.
    ///
    /// Sessions receive `UPDATE_CHECK_STARTED`, then either
    /// `UPDATE_AVAILABLE` or `NO_UPDATES`, or `UPDATE_CHECK_FAILED` when the
    /// check cannot run at all.
    pub async fn check_for_updates(&self) -> CacheResult<UpdateCheckReport> {
        info!("Checking for updates");
        self.clients
            .broadcast(ControllerEvent::UpdateCheckStarted {
                timestamp: Utc::now(),
            })
            .await;

        match self.run_update_check().await {
            Ok(report) => {
                let event = if report.has_updates() {
                    ControllerEvent::UpdateAvailable {
                        url: None,
                        timestamp: report.timestamp,
                    }
                } else {
                    ControllerEvent::NoUpdates {
                        timestamp: report.timestamp,
                    }
                };
                info!(
                    checked = report.checked,
                    updated = report.updated.len(),
                    skipped = report.skipped.len(),
                    "Update check finished"
                );
                self.clients.broadcast(event).await;
                Ok(report)
            }
            Err(e) => {
                error!(error = %e, "Update check failed");
                self.clients
                    .broadcast(ControllerEvent::UpdateCheckFailed {
                        error: e.to_string(),
                        timestamp: Utc::now(),
                    })
                    .await;
                Err(e)
            }
        }
    }

    async fn run_update_check(&self) -> CacheResult<UpdateCheckReport> {
        let active = self.active().await.ok_or(CacheError::NoActiveCache)?;

        let mut updated = Vec::new();
        let mut skipped = Vec::new();
        for url in &self.settings.critical_resources {
            let key = cache_key(url);
            match self.check_entry(active.store.as_ref(), &key).await {
                Ok(EntryCheck::Updated) => updated.push(key),
                Ok(EntryCheck::Unchanged) | Ok(EntryCheck::NotCached) => {}
                Err(e) => {
                    let reason = format!("{:#}", e);
                    warn!(url = %key, error = %reason, "Skipping update check for resource");
                    skipped.push(key);
                }
            }
        }

        Ok(UpdateCheckReport {
            checked: self.settings.critical_resources.len(),
            updated,
            skipped,
            timestamp: Utc::now(),
        })
    }

    /// Fetch the live copy of `key`, bypassing intermediate caches, and
    /// replace the cached entry if the content differs.
    async fn check_entry(&self, store: &dyn CacheStore, key: &str) -> Result<EntryCheck> {
        let url = Url::parse(key).with_context(|| format!("Invalid cache key {}", key))?;
        let live = self
            .fetch_with_timeout(&Request::get(url).bypassing_cache())
            .await
            .context("Fetch failed")?;
        if !live.is_success() {
            return Err(FetchError::Status(live.status).into());
        }

        let Some(cached) = store.get(key).await.context("Cache read failed")? else {
            return Ok(EntryCheck::NotCached);
        };
        if cached.same_content(&live) {
            return Ok(EntryCheck::Unchanged);
        }

        store
            .put(key, ResourceEntry::new(key, live))
            .await
            .context("Cache write failed")?;
        Ok(EntryCheck::Updated)
    }
}
