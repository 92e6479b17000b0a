use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, Shared};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::InstallReport;
use crate::models::CacheVersion;
use crate::store::CacheStore;

/// An install attempt that concurrent callers can all await
pub(crate) type SharedInstall = Shared<BoxFuture<'static, InstallReport>>;

/// The version currently serving requests, with its open store
#[derive(Clone)]
pub struct ActiveCache {
    pub version: CacheVersion,
    pub store: Arc<dyn CacheStore>,
}

/// Mutable state shared by every clone of a controller.
///
/// `current` is only written by activation and restart recovery.
#[derive(Default)]
pub(crate) struct ControllerState {
    pub current: RwLock<Option<ActiveCache>>,
    /// Installed version awaiting activation
    pub waiting: Mutex<Option<CacheVersion>>,
    /// Install attempts keyed by version name
    pub installs: Mutex<HashMap<String, SharedInstall>>,
    pub last_refresh: Mutex<Option<Instant>>,
    pub background: Mutex<Vec<JoinHandle<()>>>,
}

impl ControllerState {
    pub async fn active(&self) -> Option<ActiveCache> {
        self.current.read().await.clone()
    }

    /// Claim the refresh slot if `interval` has passed since the last claim.
    pub async fn try_begin_refresh(&self, interval: Duration) -> bool {
        let mut last = self.last_refresh.lock().await;
        let now = Instant::now();
        match *last {
            Some(previous) if now.duration_since(previous) < interval => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }

    pub async fn track_background(&self, handle: JoinHandle<()>) {
        let mut background = self.background.lock().await;
        background.retain(|task| !task.is_finished());
        background.push(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_refresh_slot_is_rate_limited() {
        let state = ControllerState::default();
        let interval = Duration::from_secs(30);

        assert!(state.try_begin_refresh(interval).await);
        assert!(!state.try_begin_refresh(interval).await);

        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(!state.try_begin_refresh(interval).await);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(state.try_begin_refresh(interval).await);
    }
}
