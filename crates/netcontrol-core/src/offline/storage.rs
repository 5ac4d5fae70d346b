use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use super::request::CachedResponse;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache entry is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Cache entry body is not base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("Invalid cache name '{0}'")]
    InvalidName(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Cache storage unavailable: {0}")]
    Unavailable(String),
}

/// Summary of one stored entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub url: String,
    pub status: u16,
    pub size: usize,
    pub cached_at: DateTime<Utc>,
}

impl EntryInfo {
    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            format!("{}h ago", minutes / 60)
        } else {
            format!("{}d ago", minutes / 1440)
        }
    }
}

/// Named cache generations, each mapping request URL to response.
///
/// Every call is atomic for its entry.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open (creating if needed) the named generation.
    async fn open(&self, name: &str) -> Result<(), CacheError>;

    /// Names of every existing generation.
    async fn keys(&self) -> Result<Vec<String>, CacheError>;

    /// Delete a generation. Returns whether it existed.
    async fn delete(&self, name: &str) -> Result<bool, CacheError>;

    async fn get(&self, name: &str, url: &str) -> Result<Option<CachedResponse>, CacheError>;

    async fn put(&self, name: &str, url: &str, response: &CachedResponse)
        -> Result<(), CacheError>;

    async fn entries(&self, name: &str) -> Result<Vec<EntryInfo>, CacheError>;
}

// ============================================================================
// Memory
// ============================================================================

struct MemoryEntry {
    response: CachedResponse,
    cached_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct MemoryCacheStorage {
    generations: Mutex<BTreeMap<String, BTreeMap<String, MemoryEntry>>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn generations(&self) -> MutexGuard<'_, BTreeMap<String, BTreeMap<String, MemoryEntry>>> {
        match self.generations.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open(&self, name: &str) -> Result<(), CacheError> {
        self.generations().entry(name.to_string()).or_default();
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, CacheError> {
        Ok(self.generations().keys().cloned().collect())
    }

    async fn delete(&self, name: &str) -> Result<bool, CacheError> {
        Ok(self.generations().remove(name).is_some())
    }

    async fn get(&self, name: &str, url: &str) -> Result<Option<CachedResponse>, CacheError> {
        Ok(self
            .generations()
            .get(name)
            .and_then(|g| g.get(url))
            .map(|e| e.response.clone()))
    }

    async fn put(
        &self,
        name: &str,
        url: &str,
        response: &CachedResponse,
    ) -> Result<(), CacheError> {
        self.generations().entry(name.to_string()).or_default().insert(
            url.to_string(),
            MemoryEntry {
                response: response.clone(),
                cached_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn entries(&self, name: &str) -> Result<Vec<EntryInfo>, CacheError> {
        Ok(self
            .generations()
            .get(name)
            .map(|g| {
                g.iter()
                    .map(|(url, e)| EntryInfo {
                        url: url.clone(),
                        status: e.response.status,
                        size: e.response.body.len(),
                        cached_at: e.cached_at,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}

// ============================================================================
// Disk
// ============================================================================

/// On-disk form of one entry.
#[derive(Serialize, Deserialize)]
struct StoredEntry {
    url: String,
    cached_at: DateTime<Utc>,
    status: u16,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    /// Base64 of the response body.
    body: String,
}

impl StoredEntry {
    fn into_response(self) -> Result<CachedResponse, CacheError> {
        Ok(CachedResponse {
            status: self.status,
            headers: self.headers,
            body: STANDARD.decode(self.body)?,
        })
    }
}

/// One directory per generation under `root`, one JSON file per entry named
/// by the SHA-256 of its URL.
pub struct DiskCacheStorage {
    root: PathBuf,
}

impl DiskCacheStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn generation_dir(&self, name: &str) -> Result<PathBuf, CacheError> {
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\']);
        if !valid {
            return Err(CacheError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(name))
    }

    fn entry_path(&self, name: &str, url: &str) -> Result<PathBuf, CacheError> {
        let digest = Sha256::digest(url.as_bytes());
        Ok(self
            .generation_dir(name)?
            .join(format!("{}.json", hex::encode(digest))))
    }

    async fn read_entry(path: &Path) -> Result<Option<StoredEntry>, CacheError> {
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl CacheStorage for DiskCacheStorage {
    async fn open(&self, name: &str) -> Result<(), CacheError> {
        tokio::fs::create_dir_all(self.generation_dir(name)?).await?;
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, CacheError> {
        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut names = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn delete(&self, name: &str) -> Result<bool, CacheError> {
        match tokio::fs::remove_dir_all(self.generation_dir(name)?).await {
            Ok(()) => {
                debug!(cache = name, "Deleted cache generation");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, name: &str, url: &str) -> Result<Option<CachedResponse>, CacheError> {
        let path = self.entry_path(name, url)?;
        match Self::read_entry(&path).await? {
            // A digest collision would surface as a different stored URL.
            Some(entry) if entry.url == url => Ok(Some(entry.into_response()?)),
            _ => Ok(None),
        }
    }

    async fn put(
        &self,
        name: &str,
        url: &str,
        response: &CachedResponse,
    ) -> Result<(), CacheError> {
        let path = self.entry_path(name, url)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let entry = StoredEntry {
            url: url.to_string(),
            cached_at: Utc::now(),
            status: response.status,
            headers: response.headers.clone(),
            body: STANDARD.encode(&response.body),
        };
        let contents = serde_json::to_vec_pretty(&entry)?;
        // Write then rename so readers never see a partial entry.
        let tmp = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(cache = name, url, "Stored cache entry");
        Ok(())
    }

    async fn entries(&self, name: &str) -> Result<Vec<EntryInfo>, CacheError> {
        let mut dir = match tokio::fs::read_dir(self.generation_dir(name)?).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut infos = Vec::new();
        while let Some(file) = dir.next_entry().await? {
            let path = file.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(entry) = Self::read_entry(&path).await? {
                let size = STANDARD.decode(&entry.body)?.len();
                infos.push(EntryInfo {
                    url: entry.url,
                    status: entry.status,
                    size,
                    cached_at: entry.cached_at,
                });
            }
        }
        infos.sort_by(|a, b| a.url.cmp(&b.url));
        Ok(infos)
    }
}
