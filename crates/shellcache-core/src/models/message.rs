//! Control messages exchanged between the controller and client sessions.
//!
//! All messages are JSON objects tagged by `type`, e.g.
//! `{"type":"LANGUAGE_CHANGED","language":"ar"}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Requests sent to the controller by a client session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    GetCacheName,
    SkipWaiting,
    CheckUpdates,
    /// Informational only
    LanguageChanged { language: String },
    GetCacheStats,
}

/// Direct replies to a `ClientMessage`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageReply {
    CacheName {
        #[serde(rename = "cacheName")]
        cache_name: Option<String>,
        exists: bool,
        ready: bool,
    },
    CacheStats {
        #[serde(rename = "cacheName")]
        cache_name: Option<String>,
        count: usize,
        urls: Vec<String>,
    },
}

/// Notifications broadcast to every connected session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControllerEvent {
    SwActivated {
        version: String,
    },
    /// `url` is set for a single refreshed resource and absent for the
    /// summary of an on-demand check
    UpdateAvailable {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        timestamp: DateTime<Utc>,
    },
    UpdateCheckStarted {
        timestamp: DateTime<Utc>,
    },
    NoUpdates {
        timestamp: DateTime<Utc>,
    },
    UpdateCheckFailed {
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl ControllerEvent {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::SwActivated { .. } => "SW_ACTIVATED",
            Self::UpdateAvailable { .. } => "UPDATE_AVAILABLE",
            Self::UpdateCheckStarted { .. } => "UPDATE_CHECK_STARTED",
            Self::NoUpdates { .. } => "NO_UPDATES",
            Self::UpdateCheckFailed { .. } => "UPDATE_CHECK_FAILED",
        }
    }
}
