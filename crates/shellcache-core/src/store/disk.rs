//! Filesystem-backed cache storage.
//!
//! Layout: one directory per version under the storage root. Each entry is a
//! single file named by the SHA-256 of its key:
//!
//! ```text
//! <root>/<version>/<sha256(key)>.entry
//! ```
//!
//! The file holds a one-line JSON header followed by the raw body. Writes go
//! to a temporary file that is renamed into place, so readers only ever see a
//! complete old entry or a complete new one.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

use super::{CacheStorage, CacheStore};
use crate::error::{CacheError, CacheResult};
use crate::models::{ResourceEntry, Response};

const ENTRY_EXTENSION: &str = "entry";

/// Distinguishes concurrent temporary files for the same key
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Serialize, Deserialize)]
struct EntryHeader {
    url: String,
    status: u16,
    headers: Vec<(String, String)>,
    stored_at: DateTime<Utc>,
    body_len: usize,
    body_sha256: String,
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub struct DiskStorage {
    root: PathBuf,
}

impl DiskStorage {
    pub fn new(root: impl Into<PathBuf>) -> CacheResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| {
            CacheError::io(
                format!("Failed to create storage directory {}", root.display()),
                e,
            )
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn version_dir(&self, version: &str) -> CacheResult<PathBuf> {
        let valid =
            !version.is_empty() && !version.starts_with('.') && !version.contains(['/', '\\']);
        if !valid {
            return Err(CacheError::InvalidVersion(version.to_string()));
        }
        Ok(self.root.join(version))
    }
}

#[async_trait]
impl CacheStorage for DiskStorage {
    async fn open(&self, version: &str) -> CacheResult<Arc<dyn CacheStore>> {
        let dir = self.version_dir(version)?;
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            CacheError::io(format!("Failed to create cache directory for {}", version), e)
        })?;
        let store: Arc<dyn CacheStore> = Arc::new(DiskStore {
            name: version.to_string(),
            dir,
        });
        Ok(store)
    }

    async fn versions(&self) -> CacheResult<Vec<String>> {
        let mut dir = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| CacheError::io("Failed to list cache versions", e))?;

        let mut names = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| CacheError::io("Failed to list cache versions", e))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            if !is_dir {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    async fn delete(&self, version: &str) -> CacheResult<bool> {
        let dir = self.version_dir(version)?;
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                debug!(version = version, "Cache directory removed");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::io(format!("Failed to delete cache {}", version), e)),
        }
    }
}

pub struct DiskStore {
    name: String,
    dir: PathBuf,
}

impl DiskStore {
    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", sha256_hex(key.as_bytes()), ENTRY_EXTENSION))
    }

    fn encode(key: &str, entry: &ResourceEntry) -> CacheResult<Vec<u8>> {
        let body = &entry.response.body;
        let header = EntryHeader {
            url: key.to_string(),
            status: entry.response.status,
            headers: entry.response.headers.clone(),
            stored_at: entry.stored_at,
            body_len: body.len(),
            body_sha256: sha256_hex(body),
        };
        let mut bytes = serde_json::to_vec(&header)?;
        bytes.push(b'\n');
        bytes.extend_from_slice(body);
        Ok(bytes)
    }

    fn decode(path: &Path, bytes: &[u8]) -> CacheResult<ResourceEntry> {
        let split = bytes
            .iter()
            .position(|&b| b == b'\n')
            .ok_or_else(|| CacheError::corrupt(path, "missing header line"))?;
        let header: EntryHeader = serde_json::from_slice(&bytes[..split])
            .map_err(|e| CacheError::corrupt(path, format!("unreadable header: {}", e)))?;
        let body = &bytes[split + 1..];

        if body.len() != header.body_len {
            return Err(CacheError::corrupt(
                path,
                format!("expected {} body bytes, found {}", header.body_len, body.len()),
            ));
        }
        if sha256_hex(body) != header.body_sha256 {
            return Err(CacheError::corrupt(path, "body digest mismatch"));
        }

        Ok(ResourceEntry {
            url: header.url,
            response: Response {
                status: header.status,
                headers: header.headers,
                body: body.to_vec(),
            },
            stored_at: header.stored_at,
        })
    }

    async fn read_header(path: &Path) -> CacheResult<EntryHeader> {
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| CacheError::io(format!("Failed to open {}", path.display()), e))?;
        let mut line = Vec::new();
        BufReader::new(file)
            .read_until(b'\n', &mut line)
            .await
            .map_err(|e| CacheError::io(format!("Failed to read {}", path.display()), e))?;
        if line.last() == Some(&b'\n') {
            line.pop();
        }
        serde_json::from_slice(&line)
            .map_err(|e| CacheError::corrupt(path, format!("unreadable header: {}", e)))
    }
}

#[async_trait]
impl CacheStore for DiskStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &str) -> CacheResult<Option<ResourceEntry>> {
        let path = self.entry_path(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CacheError::io(format!("Failed to read entry for {}", key), e))
            }
        };
        Self::decode(&path, &bytes).map(Some)
    }

    async fn put(&self, key: &str, entry: ResourceEntry) -> CacheResult<()> {
        let path = self.entry_path(key);
        let bytes = Self::encode(key, &entry)?;

        let counter = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let temp = self.dir.join(format!(
            ".{}.{}.{}.tmp",
            sha256_hex(key.as_bytes()),
            std::process::id(),
            counter
        ));

        tokio::fs::write(&temp, &bytes)
            .await
            .map_err(|e| CacheError::io(format!("Failed to write entry for {}", key), e))?;
        if let Err(e) = tokio::fs::rename(&temp, &path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(CacheError::io(format!("Failed to commit entry for {}", key), e));
        }
        Ok(())
    }

    async fn keys(&self) -> CacheResult<Vec<String>> {
        let mut dir = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| CacheError::io(format!("Failed to list cache {}", self.name), e))?;

        let mut keys = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| CacheError::io(format!("Failed to list cache {}", self.name), e))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            match Self::read_header(&path).await {
                Ok(header) => keys.push(header.url),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable cache entry"),
            }
        }
        keys.sort();
        Ok(keys)
    }
}
