use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Network unreachable: {0}")]
    Unreachable(String),

    #[error("Unexpected HTTP status {0}")]
    Status(u16),
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Transport(e) => e.is_timeout(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display_and_flag() {
        let err = FetchError::Timeout(Duration::from_secs(5));
        assert_eq!(err.to_string(), "Request timed out after 5000ms");
        assert!(err.is_timeout());
    }

    #[test]
    fn test_other_errors_are_not_timeouts() {
        assert!(!FetchError::Unreachable("offline".to_string()).is_timeout());
        assert!(!FetchError::Status(503).is_timeout());
    }
}
