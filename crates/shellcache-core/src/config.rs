//! Controller configuration.
//!
//! Configuration is stored at `~/.config/shellcache/config.json` unless a
//! path is given explicitly. Every field has a default, so a partial file is
//! fine. `ControllerConfig::settings` validates it into the resolved form the
//! controller works with.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{CacheError, CacheResult};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "shellcache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Lookup order for page requests missing from the cache: the scope root,
/// its index document, then the origin root. Order matters.
pub const PAGE_FALLBACKS: [&str; 3] = ["./", "./index.html", "/"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Base name shared by every cache version of this application
    pub cache_prefix: String,
    /// Origin and base path the controller serves
    pub scope: String,
    /// The controller's own script, never served from cache
    pub script_path: String,
    /// Resources required for offline use, relative to `scope`
    pub manifest: Vec<String>,
    /// Resources compared on an explicit update check
    pub critical_resources: Vec<String>,
    pub network_timeout_ms: u64,
    /// Minimum spacing between background refreshes, across all requests
    pub refresh_interval_secs: u64,
    /// Activate as soon as an install settles
    pub skip_waiting: bool,
    pub storage_dir: Option<PathBuf>,
    pub language: String,
    pub locales_dir: Option<PathBuf>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            cache_prefix: "app-cache".to_string(),
            scope: "http://localhost:8080/".to_string(),
            script_path: "./sw.js".to_string(),
            manifest: vec![
                "./".to_string(),
                "./index.html".to_string(),
                "./app.js".to_string(),
                "./styles.css".to_string(),
                "./manifest.json".to_string(),
            ],
            critical_resources: vec![
                "./".to_string(),
                "./index.html".to_string(),
                "./app.js".to_string(),
                "./styles.css".to_string(),
            ],
            network_timeout_ms: 5000,
            refresh_interval_secs: 30,
            skip_waiting: true,
            storage_dir: None,
            language: "en".to_string(),
            locales_dir: None,
        }
    }
}

impl ControllerConfig {
    /// Load from the default location, falling back to defaults if absent
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Root of the on-disk cache versions
    pub fn storage_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.storage_dir {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Validate and resolve every URL against the scope
    pub fn settings(&self) -> CacheResult<Settings> {
        if self.cache_prefix.is_empty() {
            return Err(CacheError::ConfigInvalid("cache_prefix is empty".to_string()));
        }
        let scope = Url::parse(&self.scope)
            .map_err(|e| CacheError::ConfigInvalid(format!("scope {:?}: {}", self.scope, e)))?;
        if scope.cannot_be_a_base() {
            return Err(CacheError::ConfigInvalid(format!(
                "scope {:?} cannot be a base URL",
                self.scope
            )));
        }

        let resolve_all = |paths: &[String]| -> CacheResult<Vec<Url>> {
            paths.iter().map(|path| resolve(&scope, path)).collect()
        };

        Ok(Settings {
            cache_prefix: self.cache_prefix.clone(),
            script_url: resolve(&scope, &self.script_path)?,
            manifest: resolve_all(&self.manifest)?,
            critical_resources: resolve_all(&self.critical_resources)?,
            page_fallbacks: PAGE_FALLBACKS
                .iter()
                .map(|path| resolve(&scope, path))
                .collect::<CacheResult<_>>()?,
            network_timeout: Duration::from_millis(self.network_timeout_ms),
            refresh_interval: Duration::from_secs(self.refresh_interval_secs),
            skip_waiting: self.skip_waiting,
            scope,
        })
    }
}

fn resolve(scope: &Url, path: &str) -> CacheResult<Url> {
    scope
        .join(path)
        .map_err(|e| CacheError::ConfigInvalid(format!("path {:?}: {}", path, e)))
}

/// Validated, resolved configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub cache_prefix: String,
    pub scope: Url,
    pub script_url: Url,
    pub manifest: Vec<Url>,
    pub critical_resources: Vec<Url>,
    pub page_fallbacks: Vec<Url>,
    pub network_timeout: Duration,
    pub refresh_interval: Duration,
    pub skip_waiting: bool,
}

impl Settings {
    pub fn resolve(&self, path: &str) -> CacheResult<Url> {
        resolve(&self.scope, path)
    }

    pub fn is_same_origin(&self, url: &Url) -> bool {
        url.origin() == self.scope.origin()
    }
}
