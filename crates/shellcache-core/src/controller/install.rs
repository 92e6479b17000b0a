//! Install: populate a new version's store from the manifest.

use anyhow::{Context, Result};
use futures::future::join_all;
use futures::FutureExt;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::CacheController;
use crate::models::{cache_key, CacheVersion, Request, ResourceEntry};
use crate::network::FetchError;
use crate::store::CacheStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallFailure {
    pub url: String,
    pub reason: String,
}

/// Outcome of one install attempt. An install always completes; failures
/// are recorded here rather than aborting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallReport {
    pub version: String,
    pub total: usize,
    pub stored: usize,
    pub failed: Vec<InstallFailure>,
    /// Set when the store itself could not be opened
    pub setup_error: Option<String>,
}

impl InstallReport {
    fn new(version: &str, total: usize) -> Self {
        Self {
            version: version.to_string(),
            total,
            stored: 0,
            failed: Vec::new(),
            setup_error: None,
        }
    }

    pub fn is_partial(&self) -> bool {
        self.stored < self.total
    }
}

impl CacheController {
    /// Install a freshly generated version
    pub async fn handle_install(&self) -> InstallReport {
        let version = CacheVersion::generate(&self.settings.cache_prefix);
        self.install(version).await
    }

    /// Install `version`. Concurrent and repeated calls for the same version
    /// share one attempt and receive its report.
    pub async fn install(&self, version: CacheVersion) -> InstallReport {
        let attempt = {
            let mut installs = self.state.installs.lock().await;
            installs
                .entry(version.name())
                .or_insert_with(|| {
                    let controller = self.clone();
                    async move { controller.run_install(version).await }
                        .boxed()
                        .shared()
                })
                .clone()
        };
        attempt.await
    }

    async fn run_install(&self, version: CacheVersion) -> InstallReport {
        let name = version.name();
        let manifest = &self.settings.manifest;
        info!(version = %name, resources = manifest.len(), "Installing cache version");

        let mut report = InstallReport::new(&name, manifest.len());
        match self.storage.open(&name).await {
            Ok(store) => {
                let attempts = manifest.iter().map(|url| self.precache(store.as_ref(), url));
                let results = join_all(attempts).await;
                for (url, result) in manifest.iter().zip(results) {
                    match result {
                        Ok(()) => report.stored += 1,
                        Err(e) => {
                            let reason = format!("{:#}", e);
                            warn!(url = %url, error = %reason, "Failed to cache resource");
                            report.failed.push(InstallFailure {
                                url: url.to_string(),
                                reason,
                            });
                        }
                    }
                }
            }
            Err(e) => {
                error!(version = %name, error = %e, "Failed to open cache store for install");
                report.setup_error = Some(e.to_string());
            }
        }

        info!(
            version = %name,
            stored = report.stored,
            failed = report.failed.len(),
            "Install settled"
        );

        // Ready to activate whatever happened above
        *self.state.waiting.lock().await = Some(version);
        report
    }

    async fn precache(&self, store: &dyn CacheStore, url: &Url) -> Result<()> {
        let request = Request::get(url.clone()).bypassing_cache();
        let response = self
            .fetch_with_timeout(&request)
            .await
            .context("Fetch failed")?;
        if !response.is_success() {
            return Err(FetchError::Status(response.status).into());
        }

        let key = cache_key(url);
        store
            .put(&key, ResourceEntry::new(key.clone(), response))
            .await
            .context("Store failed")?;
        debug!(url = %key, "Resource cached");
        Ok(())
    }
}
