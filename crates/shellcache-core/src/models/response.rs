use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Placeholder page served for page requests when neither the cache nor the
/// network can answer. Fully self-contained: no scripts, styles or images
/// that would need another fetch.
pub const OFFLINE_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Offline</title>
<style>
body { font-family: system-ui, sans-serif; margin: 0; min-height: 100vh; display: flex; align-items: center; justify-content: center; background: #f4f4f5; color: #18181b; }
main { max-width: 28rem; padding: 2rem; text-align: center; }
h1 { font-size: 1.5rem; margin-bottom: 0.5rem; }
button { margin-top: 1rem; padding: 0.5rem 1.25rem; border: 0; border-radius: 0.375rem; background: #2563eb; color: #fff; font-size: 1rem; cursor: pointer; }
</style>
</head>
<body>
<main>
<h1>You are offline</h1>
<p>This page is not available offline yet. Check your connection and try again.</p>
<button onclick="location.reload()">Retry</button>
</main>
</body>
</html>
"#;

const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";
const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// A response as returned to the requesting client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn offline_page() -> Self {
        Self::new(200, OFFLINE_PAGE).with_header("content-type", HTML_CONTENT_TYPE)
    }

    pub fn internal_error() -> Self {
        Self::new(500, "Cache controller error").with_header("content-type", TEXT_CONTENT_TYPE)
    }

    /// 2xx, the same rule a browser applies for `response.ok`
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup; first value wins
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_page_is_html_200() {
        let page = Response::offline_page();
        assert_eq!(page.status, 200);
        assert!(page.is_success());
        assert_eq!(page.content_type(), Some("text/html; charset=utf-8"));
        assert!(page.text().contains("You are offline"));
    }

    #[test]
    fn test_offline_page_has_no_external_references() {
        assert!(!OFFLINE_PAGE.contains("src="));
        assert!(!OFFLINE_PAGE.contains("href="));
    }

    #[test]
    fn test_internal_error_status() {
        let err = Response::internal_error();
        assert_eq!(err.status, 500);
        assert!(!err.is_success());
    }

    #[test]
    fn test_header_lookup_ignores_case() {
        let response = Response::new(200, "x").with_header("Content-Type", "text/css");
        assert_eq!(response.header("content-type"), Some("text/css"));
        assert_eq!(response.header("etag"), None);
    }

    #[test]
    fn test_is_success_bounds() {
        assert!(Response::new(204, "").is_success());
        assert!(!Response::new(304, "").is_success());
        assert!(!Response::new(404, "").is_success());
    }
}
