//! Offline asset cache.
//!
//! A worker installs a versioned generation of assets from a fixed manifest,
//! deletes every older generation when it activates, and then answers GET
//! requests cache-first:
//!
//! - same-site and allow-listed assets come from the cache when present
//! - anything else goes to the network, and successful same-site or
//!   allow-listed responses are written through to the cache
//! - offline page loads fall back to the cached app shell
//!
//! Bumping the manifest version is the only refresh mechanism.

pub mod manifest;
pub mod network;
pub mod policy;
pub mod registration;
pub mod request;
pub mod storage;
pub mod worker;

pub use manifest::CacheManifest;
pub use network::{HttpNetwork, Network, NetworkError};
pub use policy::CachePolicy;
pub use registration::Registration;
pub use request::{CacheRequest, CachedResponse};
pub use storage::{CacheError, CacheStorage, DiskCacheStorage, EntryInfo, MemoryCacheStorage};
pub use worker::{
    FetchError, FetchOutcome, InstallReport, OfflineWorker, ResponseSource, WorkerState,
    APP_SHELL_PATH,
};
