//! Account storage.
//!
//! `FileUserStore` keeps every account in one JSON document under the data
//! directory and rewrites it atomically on insert. `MemoryUserStore` backs the
//! tests.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use netcontrol_core::models::User;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// File name of the account document inside the data directory
const USERS_FILE: &str = "users.json";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("An account already exists for {0}")]
    Duplicate(String),

    #[error("User store unavailable: {0}")]
    Unavailable(String),

    #[error("User store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("User store is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// A stored account. `password_hash` is an Argon2 PHC string and never leaves
/// the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

impl UserRecord {
    pub fn new(name: impl Into<String>, email: impl Into<String>, password_hash: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            email: email.into(),
            password_hash,
        }
    }

    /// Public profile returned to clients.
    pub fn profile(&self) -> User {
        User {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Look an account up by email, ignoring ASCII case.
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;

    /// Insert a new account. Fails with `Duplicate` if the email is taken.
    async fn insert(&self, record: UserRecord) -> Result<(), StoreError>;
}

fn find_in<'a>(records: &'a [UserRecord], email: &str) -> Option<&'a UserRecord> {
    records.iter().find(|r| r.email.eq_ignore_ascii_case(email))
}

// ============================================================================
// MEMORY STORE
// ============================================================================

#[derive(Default)]
pub struct MemoryUserStore {
    records: RwLock<Vec<UserRecord>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(find_in(&self.records.read().await, email).cloned())
    }

    async fn insert(&self, record: UserRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        if find_in(&records, &record.email).is_some() {
            return Err(StoreError::Duplicate(record.email));
        }
        records.push(record);
        Ok(())
    }
}

// ============================================================================
// FILE STORE
// ============================================================================

pub struct FileUserStore {
    path: PathBuf,
    records: RwLock<Vec<UserRecord>>,
}

impl FileUserStore {
    /// Open (or create) the account document in `data_dir`.
    ///
    /// An unreadable directory or a corrupt document is an error; the server
    /// refuses to start rather than run without its accounts.
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let data_dir = data_dir.as_ref();
        tokio::fs::create_dir_all(data_dir).await.map_err(|e| {
            StoreError::Unavailable(format!("cannot create {}: {}", data_dir.display(), e))
        })?;

        let path = data_dir.join(USERS_FILE);
        let records = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Vec::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(StoreError::Unavailable(format!(
                    "cannot read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        info!(path = %path.display(), accounts = records.len(), "User store opened");
        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, records: &[UserRecord]) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(records)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl UserStore for FileUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(find_in(&self.records.read().await, email).cloned())
    }

    async fn insert(&self, record: UserRecord) -> Result<(), StoreError> {
        // Hold the write lock across the disk write so concurrent
        // registrations for one email cannot both succeed.
        let mut records = self.records.write().await;
        if find_in(&records, &record.email).is_some() {
            return Err(StoreError::Duplicate(record.email));
        }
        records.push(record);
        if let Err(e) = self.persist(&records).await {
            records.pop();
            return Err(e);
        }
        debug!(path = %self.path.display(), accounts = records.len(), "User store written");
        Ok(())
    }
}
