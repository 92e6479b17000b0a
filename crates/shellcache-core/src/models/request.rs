use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use reqwest::{Method, Url};
use serde::{Deserialize, Serialize};

/// What the requester intends to do with the response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    #[default]
    Empty,
    Document,
    Script,
    Style,
    Image,
    Font,
    Manifest,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    Navigate,
    SameOrigin,
    Cors,
    #[default]
    NoCors,
}

/// How intermediate HTTP caches should treat the request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheMode {
    #[default]
    Default,
    /// Always revalidate with the origin
    Reload,
}

/// An intercepted fetch.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub destination: Destination,
    pub mode: RequestMode,
    pub cache: CacheMode,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            destination: Destination::default(),
            mode: RequestMode::default(),
            cache: CacheMode::default(),
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// A top-level page navigation, as a browser issues it
    pub fn navigate(url: Url) -> Self {
        Self::get(url)
            .with_mode(RequestMode::Navigate)
            .with_destination(Destination::Document)
            .with_header(ACCEPT, HeaderValue::from_static("text/html,application/xhtml+xml"))
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn bypassing_cache(mut self) -> Self {
        self.cache = CacheMode::Reload;
        self
    }

    pub fn cache_key(&self) -> String {
        cache_key(&self.url)
    }

    pub fn accepts_html(&self) -> bool {
        self.headers
            .get_all(ACCEPT)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .any(|value| value.contains("text/html"))
    }

    /// Whether the response is expected to be a navigable HTML page.
    pub fn is_page_request(&self) -> bool {
        self.destination == Destination::Document
            || self.mode == RequestMode::Navigate
            || self.url.path().ends_with('/')
            || self.accepts_html()
    }
}

/// Key under which a URL is stored. Fragments never reach the server, so
/// they are not part of the identity.
pub fn cache_key(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.into()
}
