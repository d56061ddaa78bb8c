//! Offline-first caching for guide content.
//!
//! This module provides:
//! - Storage traits mirroring the two platform stores the site relies on: a
//!   response cache (get/put/delete/keys) and a durable key-value store
//! - In-memory and SQLite-backed implementations of both
//! - [`CacheManager`], which orchestrates fetch-with-cache: strict TTL
//!   expiry, in-flight request de-duplication, offline fallback, and a
//!   pending-sync queue replayed when connectivity returns

pub mod manager;
mod storage;
mod traits;

pub use manager::{
  reqwest_transport, CacheManager, FetchOptions, FetchSource, FetchedResponse, SyncRequest,
  Transport, TransportResponse, OFFLINE_STORAGE_KEY,
};
pub use storage::{MemoryStore, SqliteStore, CACHE_STORE_NAME};
pub use traits::{CachedResponse, KeyValueStore, ResponseStore, StoreError, StoreResult};
