//! Control messages from client sessions.

use tracing::{debug, info, warn};

use super::CacheController;
use crate::models::{ClientMessage, MessageReply};

impl CacheController {
    /// Handle a control message. Queries get a reply; commands report
    /// through broadcasts and return `None`.
    pub async fn handle_message(&self, message: ClientMessage) -> Option<MessageReply> {
        match message {
            ClientMessage::GetCacheName => Some(self.cache_name_reply().await),
            ClientMessage::SkipWaiting => {
                info!("Skip waiting requested");
                if let Err(e) = self.handle_activate().await {
                    warn!(error = %e, "Forced activation failed");
                }
                None
            }
            ClientMessage::CheckUpdates => {
                // Failures are broadcast as UPDATE_CHECK_FAILED
                if let Err(e) = self.check_for_updates().await {
                    debug!(error = %e, "Update check did not run");
                }
                None
            }
            ClientMessage::LanguageChanged { language } => {
                info!(language = %language, "Client language changed");
                None
            }
            ClientMessage::GetCacheStats => Some(self.cache_stats_reply().await),
        }
    }

    async fn cache_name_reply(&self) -> MessageReply {
        let active = self.active().await;
        let cache_name = active.as_ref().map(|a| a.version.name());
        let exists = match cache_name {
            Some(ref name) => match self.storage.versions().await {
                Ok(versions) => versions.contains(name),
                Err(e) => {
                    warn!(error = %e, "Failed to list cache versions");
                    false
                }
            },
            None => false,
        };
        MessageReply::CacheName {
            cache_name,
            exists,
            ready: active.is_some(),
        }
    }

    async fn cache_stats_reply(&self) -> MessageReply {
        let Some(active) = self.active().await else {
            return MessageReply::CacheStats {
                cache_name: None,
                count: 0,
                urls: Vec::new(),
            };
        };
        let urls = active.store.keys().await.unwrap_or_else(|e| {
            warn!(error = %e, "Failed to list cache entries");
            Vec::new()
        });
        MessageReply::CacheStats {
            cache_name: Some(active.version.name()),
            count: urls.len(),
            urls,
        }
    }
}
