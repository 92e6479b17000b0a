//! Shared fixtures: a scripted network and storage that fails on demand.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use shellcache_core::{
    CacheController, CacheError, CacheMode, CacheResult, CacheStorage, CacheStore,
    ClientRegistry, ControllerConfig, FetchError, Fetcher, MemoryStorage, Request,
    ResourceEntry, Response, Settings, Url,
};

pub const SCOPE: &str = "https://app.test/";

#[derive(Debug, Clone)]
pub enum Route {
    Respond(Response),
    Fail,
    /// Never completes
    Hang,
}

/// Network with a fixed response per URL; unknown URLs get a 404
#[derive(Default)]
pub struct MockNetwork {
    routes: Mutex<HashMap<String, Route>>,
    calls: Mutex<Vec<Request>>,
}

impl MockNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Serve every default manifest entry with a distinct body
    pub fn serving_app() -> Arc<Self> {
        let network = Self::new();
        network.serve("./", html("<h1>home</h1>"));
        network.serve("./index.html", html("<h1>index</h1>"));
        network.serve("./app.js", Response::new(200, "console.log('v1')"));
        network.serve("./styles.css", Response::new(200, "body{}"));
        network.serve("./manifest.json", Response::new(200, "{}"));
        network
    }

    pub fn route(&self, path: &str, route: Route) {
        self.routes
            .lock()
            .unwrap()
            .insert(url(path).to_string(), route);
    }

    pub fn serve(&self, path: &str, response: Response) {
        self.route(path, Route::Respond(response));
    }

    pub fn calls(&self) -> Vec<Request> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        let target = url(path);
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|request| request.url == target)
            .count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl Fetcher for MockNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        self.calls.lock().unwrap().push(request.clone());
        let mut target = request.url.clone();
        target.set_fragment(None);
        let route = self.routes.lock().unwrap().get(target.as_str()).cloned();
        match route {
            Some(Route::Respond(response)) => Ok(response),
            Some(Route::Fail) => Err(FetchError::Unreachable(target.to_string())),
            Some(Route::Hang) => std::future::pending().await,
            None => Ok(Response::new(404, "not found")),
        }
    }
}

/// Memory storage with switchable faults
#[derive(Default)]
pub struct FlakyStorage {
    inner: MemoryStorage,
    fail_open: AtomicBool,
    fail_get: Arc<AtomicBool>,
    fail_delete: Mutex<Option<String>>,
}

impl FlakyStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inner(&self) -> &MemoryStorage {
        &self.inner
    }

    pub fn fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    pub fn fail_get(&self, fail: bool) {
        self.fail_get.store(fail, Ordering::SeqCst);
    }

    pub fn fail_delete_of(&self, version: &str) {
        *self.fail_delete.lock().unwrap() = Some(version.to_string());
    }
}

fn injected(what: &str) -> CacheError {
    CacheError::io(
        what,
        std::io::Error::new(std::io::ErrorKind::Other, "injected fault"),
    )
}

#[async_trait]
impl CacheStorage for FlakyStorage {
    async fn open(&self, version: &str) -> CacheResult<Arc<dyn CacheStore>> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(injected("open"));
        }
        let inner = self.inner.open(version).await?;
        let store: Arc<dyn CacheStore> = Arc::new(FlakyStore {
            inner,
            fail_get: self.fail_get.clone(),
        });
        Ok(store)
    }

    async fn versions(&self) -> CacheResult<Vec<String>> {
        self.inner.versions().await
    }

    async fn delete(&self, version: &str) -> CacheResult<bool> {
        if self.fail_delete.lock().unwrap().as_deref() == Some(version) {
            return Err(injected("delete"));
        }
        self.inner.delete(version).await
    }
}

struct FlakyStore {
    inner: Arc<dyn CacheStore>,
    fail_get: Arc<AtomicBool>,
}

#[async_trait]
impl CacheStore for FlakyStore {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn get(&self, key: &str) -> CacheResult<Option<ResourceEntry>> {
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(injected("get"));
        }
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, entry: ResourceEntry) -> CacheResult<()> {
        self.inner.put(key, entry).await
    }

    async fn keys(&self) -> CacheResult<Vec<String>> {
        self.inner.keys().await
    }
}

pub fn url(path: &str) -> Url {
    Url::parse(SCOPE)
        .and_then(|scope| scope.join(path))
        .expect("valid test url")
}

pub fn html(body: &str) -> Response {
    Response::new(200, body).with_header("content-type", "text/html")
}

pub fn config() -> ControllerConfig {
    ControllerConfig {
        scope: SCOPE.to_string(),
        ..ControllerConfig::default()
    }
}

pub fn settings() -> Settings {
    config().settings().expect("valid test config")
}

pub fn controller(storage: Arc<dyn CacheStorage>, network: Arc<MockNetwork>) -> CacheController {
    controller_with(settings(), storage, network)
}

pub fn controller_with(
    settings: Settings,
    storage: Arc<dyn CacheStorage>,
    network: Arc<MockNetwork>,
) -> CacheController {
    CacheController::new(settings, storage, network, Arc::new(ClientRegistry::new()))
}

/// Install and activate a version, then forget the install's network calls
pub async fn installed(controller: &CacheController, network: &MockNetwork) -> String {
    let report = controller.handle_install().await;
    assert_eq!(report.setup_error, None);
    let activation = controller
        .handle_activate()
        .await
        .expect("activation")
        .expect("a waiting version");
    network.clear_calls();
    activation.version
}

pub fn bypasses_cache(request: &Request) -> bool {
    request.cache == CacheMode::Reload
}
