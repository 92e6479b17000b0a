//! The cache lifecycle controller.
//!
//! `CacheController` is the single entry point a host drives:
//!
//! | Host event | Method | Module |
//! |------------|--------|--------|
//! | install | `handle_install` | `install` |
//! | activate | `handle_activate` | `activate` |
//! | fetch | `handle_fetch` | `router` |
//! | message | `handle_message` | `messages` |
//!
//! Install builds a new version's store while the current version keeps
//! serving. Activation swaps it in, evicts older versions of the same prefix,
//! claims connected sessions and announces the new version. Routing answers
//! from the active store, falls back to the network, and refreshes cached
//! pages in the background.

mod activate;
mod install;
mod messages;
mod router;
mod state;
mod update;

use std::sync::Arc;

use tracing::{info, warn};

use crate::clients::ClientRegistry;
use crate::config::Settings;
use crate::error::CacheResult;
use crate::models::{CacheVersion, Request, ResourceEntry, Response};
use crate::network::{FetchError, Fetcher};
use crate::store::CacheStorage;

pub use activate::ActivationReport;
pub use install::{InstallFailure, InstallReport};
pub use router::{ResponseSource, RouteOutcome};
pub use state::ActiveCache;
pub use update::{RefreshOutcome, UpdateCheckReport};

use state::ControllerState;

/// Cache lifecycle controller.
/// Clone is cheap; clones share storage, network, sessions and state.
#[derive(Clone)]
pub struct CacheController {
    settings: Arc<Settings>,
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Fetcher>,
    clients: Arc<ClientRegistry>,
    state: Arc<ControllerState>,
}

impl CacheController {
    pub fn new(
        settings: Settings,
        storage: Arc<dyn CacheStorage>,
        network: Arc<dyn Fetcher>,
        clients: Arc<ClientRegistry>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            storage,
            network,
            clients,
            state: Arc::new(ControllerState::default()),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn clients(&self) -> &Arc<ClientRegistry> {
        &self.clients
    }

    pub async fn active(&self) -> Option<ActiveCache> {
        self.state.active().await
    }

    pub async fn current_version(&self) -> Option<String> {
        self.active().await.map(|active| active.version.name())
    }

    pub async fn waiting_version(&self) -> Option<String> {
        self.state.waiting.lock().await.as_ref().map(CacheVersion::name)
    }

    /// Adopt the newest persisted version of this prefix after a restart.
    /// Leaves an already active version in place.
    pub async fn resume(&self) -> CacheResult<Option<String>> {
        let mut current = self.state.current.write().await;
        if let Some(ref active) = *current {
            return Ok(Some(active.version.name()));
        }

        let prefix = &self.settings.cache_prefix;
        let newest = self
            .storage
            .versions()
            .await?
            .iter()
            .filter_map(|name| CacheVersion::parse(prefix, name))
            .max_by_key(CacheVersion::stamp);

        let Some(version) = newest else {
            info!(prefix = %prefix, "No persisted cache version to resume");
            return Ok(None);
        };

        let name = version.name();
        let store = self.storage.open(&name).await?;
        info!(version = %name, "Resumed persisted cache version");
        *current = Some(ActiveCache { version, store });
        Ok(Some(name))
    }

    /// Every entry of the active store, in key order
    pub async fn cache_entries(&self) -> CacheResult<Vec<ResourceEntry>> {
        let Some(active) = self.active().await else {
            return Ok(Vec::new());
        };
        let mut entries = Vec::new();
        for key in active.store.keys().await? {
            match active.store.get(&key).await {
                Ok(Some(entry)) => entries.push(entry),
                Ok(None) => {}
                Err(e) => warn!(url = %key, error = %e, "Skipping unreadable entry"),
            }
        }
        Ok(entries)
    }

    /// Network fetch bounded by the configured timeout.
    /// Every controller fetch goes through here.
    async fn fetch_with_timeout(&self, request: &Request) -> Result<Response, FetchError> {
        let timeout = self.settings.network_timeout;
        match tokio::time::timeout(timeout, self.network.fetch(request)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(timeout)),
        }
    }

    /// Wait for every background refresh spawned so far
    pub async fn wait_background(&self) {
        let handles: Vec<_> = self.state.background.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Background refresh task failed");
            }
        }
    }
}
