use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Response;

/// A stored response. Entries are never edited in place: a newer response
/// for the same URL is written as a whole new entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceEntry {
    pub url: String,
    pub response: Response,
    pub stored_at: DateTime<Utc>,
}

impl ResourceEntry {
    pub fn new(url: impl Into<String>, response: Response) -> Self {
        Self {
            url: url.into(),
            response,
            stored_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        let now = Utc::now();
        (now - self.stored_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Includes negative ages from clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }

    /// Byte-for-byte body comparison with a live response
    pub fn same_content(&self, live: &Response) -> bool {
        self.response.body == live.body
    }
}
