//! Storage traits and the cached-response record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A cached HTTP response body with its expiry window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
  pub body: String,
  pub status: u16,
  pub cached_at: DateTime<Utc>,
  pub expires_at: DateTime<Utc>,
}

impl CachedResponse {
  pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
    now > self.expires_at
  }
}

/// Backend storage failure. Callers treat these as soft: log and degrade to
/// a cache miss or no-op, never propagate.
#[derive(Debug, Clone, Error)]
#[error("storage error: {0}")]
pub struct StoreError(pub String);

pub type StoreResult<T> = Result<T, StoreError>;

/// Response cache behind the fetch pipeline.
///
/// Expiry is the manager's job: implementations store and return entries
/// verbatim, including expired ones.
pub trait ResponseStore: Send + Sync {
  fn get(&self, key: &str) -> StoreResult<Option<CachedResponse>>;
  fn put(&self, key: &str, response: &CachedResponse) -> StoreResult<()>;
  /// Returns whether an entry existed.
  fn delete(&self, key: &str) -> StoreResult<bool>;
  fn keys(&self) -> StoreResult<Vec<String>>;
}

/// Durable string key-value store.
pub trait KeyValueStore: Send + Sync {
  fn get_item(&self, key: &str) -> StoreResult<Option<String>>;
  fn set_item(&self, key: &str, value: &str) -> StoreResult<()>;
  fn remove_item(&self, key: &str) -> StoreResult<()>;
}
