//! Activation: promote the waiting version and retire the old ones.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::{ActiveCache, CacheController};
use crate::error::CacheResult;
use crate::models::{CacheVersion, ControllerEvent};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationReport {
    pub version: String,
    pub evicted: Vec<String>,
    pub eviction_failures: Vec<String>,
    /// Sessions taken over
    pub claimed: usize,
    /// Sessions that received the activation notice
    pub notified: usize,
}

impl CacheController {
    /// Activate the version left waiting by the last install.
    ///
    /// Returns `Ok(None)` when nothing is waiting. Eviction problems are
    /// logged and never stop the claim and notification steps.
    pub async fn handle_activate(&self) -> CacheResult<Option<ActivationReport>> {
        let mut waiting = self.state.waiting.lock().await;
        let Some(version) = waiting.take() else {
            debug!("No installed version waiting for activation");
            return Ok(None);
        };

        let name = version.name();
        let store = match self.storage.open(&name).await {
            Ok(store) => store,
            Err(e) => {
                error!(version = %name, error = %e, "Failed to open cache for activation");
                *waiting = Some(version);
                return Err(e);
            }
        };
        drop(waiting);

        info!(version = %name, "Activating cache version");
        *self.state.current.write().await = Some(ActiveCache {
            version,
            store,
        });

        let (evicted, eviction_failures) = self.evict_superseded(&name).await;
        if !evicted.is_empty() {
            let mut installs = self.state.installs.lock().await;
            for old in &evicted {
                installs.remove(old);
            }
        }

        let claimed = self.clients.claim().await;
        let notified = self
            .clients
            .broadcast(ControllerEvent::SwActivated {
                version: name.clone(),
            })
            .await;
        info!(
            version = %name,
            evicted = evicted.len(),
            claimed = claimed,
            notified = notified,
            "Cache version active"
        );

        Ok(Some(ActivationReport {
            version: name,
            evicted,
            eviction_failures,
            claimed,
            notified,
        }))
    }

    /// Delete every version of this prefix except `keep`.
    /// Returns (deleted, failed) version names.
    async fn evict_superseded(&self, keep: &str) -> (Vec<String>, Vec<String>) {
        let mut evicted = Vec::new();
        let mut failed = Vec::new();

        let versions = match self.storage.versions().await {
            Ok(versions) => versions,
            Err(e) => {
                warn!(error = %e, "Failed to list cache versions, skipping eviction");
                return (evicted, failed);
            }
        };

        let prefix = &self.settings.cache_prefix;
        for old in versions
            .into_iter()
            .filter(|name| name != keep && CacheVersion::matches_prefix(prefix, name))
        {
            match self.storage.delete(&old).await {
                Ok(_) => {
                    info!(version = %old, "Evicted superseded cache version");
                    evicted.push(old);
                }
                Err(e) => {
                    warn!(version = %old, error = %e, "Failed to evict cache version");
                    failed.push(old);
                }
            }
        }
        (evicted, failed)
    }
}
