//! Fetch orchestration: de-duplication, strict TTL expiry, offline fallback.

use chrono::{Duration, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use super::traits::{CachedResponse, KeyValueStore, ResponseStore};
use crate::config::CacheConfig;
use crate::error::FetchError;

/// Key-value key under which the offline data blob lives.
pub const OFFLINE_STORAGE_KEY: &str = "crypto-guide-offline";

/// Per-request cache policy. Serialized canonically as part of the request
/// key, so identical options always collide into the same in-flight fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchOptions {
  /// Consult the cache before attempting the network.
  pub cache_first: bool,
  /// Persist a successful response body into the cache.
  pub use_cache: bool,
}

impl Default for FetchOptions {
  fn default() -> Self {
    Self {
      cache_first: false,
      use_cache: true,
    }
  }
}

impl FetchOptions {
  pub fn cache_first() -> Self {
    Self {
      cache_first: true,
      use_cache: true,
    }
  }
}

/// Where a fetched body came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSource {
  Network,
  Cache,
}

/// Result of a fetch-with-cache call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedResponse {
  pub body: String,
  pub status: u16,
  pub source: FetchSource,
}

/// Raw network response, before any cache handling.
#[derive(Debug, Clone)]
pub struct TransportResponse {
  pub status: u16,
  pub body: String,
}

/// The network side of a fetch, injected so tests can count and fail calls.
/// Errors are plain reason strings; the manager wraps them.
pub type Transport =
  Arc<dyn Fn(String) -> BoxFuture<'static, Result<TransportResponse, String>> + Send + Sync>;

/// GET transport backed by a shared reqwest client.
pub fn reqwest_transport(client: reqwest::Client) -> Transport {
  Arc::new(move |url: String| {
    let client = client.clone();
    async move {
      let resp = client.get(&url).send().await.map_err(|e| e.to_string())?;
      let status = resp.status().as_u16();
      let body = resp.text().await.map_err(|e| e.to_string())?;
      Ok(TransportResponse { status, body })
    }
    .boxed()
  })
}

/// A failed request queued for replay once connectivity returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
  pub url: String,
  pub options: FetchOptions,
}

type SharedFetch = Shared<BoxFuture<'static, Result<FetchedResponse, FetchError>>>;

/// Cache manager handle. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct CacheManager {
  inner: Arc<Inner>,
  /// Response lifetime stamped at write time; lives on the handle so the
  /// builder can adjust it without touching shared state.
  ttl: Duration,
}

struct Inner {
  responses: Arc<dyn ResponseStore>,
  kv: Arc<dyn KeyValueStore>,
  transport: Transport,
  persist: bool,
  online: AtomicBool,
  pending: Mutex<HashMap<String, SharedFetch>>,
  sync_queue: Mutex<Vec<SyncRequest>>,
}

/// One logical key inside the offline data blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct OfflineEntry {
  data: serde_json::Value,
  /// Epoch milliseconds at write time.
  timestamp: i64,
  /// Epoch milliseconds past which the entry is dead.
  expiry: i64,
}

/// Stable request identity: URL plus the canonical JSON of its options.
fn request_key(url: &str, options: &FetchOptions) -> String {
  let opts = serde_json::to_string(options).unwrap_or_default();
  let mut hasher = Sha256::new();
  hasher.update(url.as_bytes());
  hasher.update(b"|");
  hasher.update(opts.as_bytes());
  hex::encode(hasher.finalize())
}

impl CacheManager {
  pub fn new(
    responses: Arc<dyn ResponseStore>,
    kv: Arc<dyn KeyValueStore>,
    transport: Transport,
    config: &CacheConfig,
  ) -> Self {
    Self {
      inner: Arc::new(Inner {
        responses,
        kv,
        transport,
        persist: config.enabled,
        online: AtomicBool::new(true),
        pending: Mutex::new(HashMap::new()),
        sync_queue: Mutex::new(Vec::new()),
      }),
      ttl: Duration::hours(config.ttl_hours),
    }
  }

  /// Override the response TTL (defaults to the configured hours).
  pub fn with_ttl(mut self, ttl: Duration) -> Self {
    self.ttl = ttl;
    self
  }

  pub fn is_online(&self) -> bool {
    self.inner.online.load(Ordering::SeqCst)
  }

  /// Flip the connectivity flag. The offline-to-online transition drains the
  /// pending-sync queue before returning.
  pub async fn set_online(&self, online: bool) {
    let was = self.inner.online.swap(online, Ordering::SeqCst);
    if online && !was {
      self.process_sync_queue().await;
    }
  }

  /// Number of in-flight de-duplicated requests (diagnostics).
  pub fn pending_count(&self) -> usize {
    self
      .inner
      .pending
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .len()
  }

  pub fn sync_queue_len(&self) -> usize {
    self
      .inner
      .sync_queue
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .len()
  }

  /// Fetch a URL through the cache.
  ///
  /// Concurrent calls with the same URL and options share a single in-flight
  /// fetch; the shared entry is removed when the fetch completes, success or
  /// failure, so the pending set never leaks.
  pub async fn fetch_with_cache(
    &self,
    url: &str,
    options: &FetchOptions,
  ) -> Result<FetchedResponse, FetchError> {
    let key = request_key(url, options);

    let shared = {
      let mut pending = self.inner.pending.lock().unwrap_or_else(|e| e.into_inner());
      if let Some(existing) = pending.get(&key) {
        debug!(url, "joining in-flight request");
        existing.clone()
      } else {
        let inner = Arc::clone(&self.inner);
        let url = url.to_string();
        let options = options.clone();
        let cleanup_key = key.clone();
        let ttl = self.ttl;

        let fut: BoxFuture<'static, Result<FetchedResponse, FetchError>> = async move {
          let result = inner.fetch_sequence(&url, &options, &cleanup_key, ttl).await;
          inner
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&cleanup_key);
          result
        }
        .boxed();

        let shared = fut.shared();
        pending.insert(key, shared.clone());
        shared
      }
    };

    shared.await
  }

  /// Persist a response body for a request, stamped with the configured TTL.
  pub fn cache_content(&self, url: &str, options: &FetchOptions, body: &str, status: u16) {
    let key = request_key(url, options);
    self.inner.put_cached(&key, body, status, self.ttl);
  }

  /// Read a previously cached response. Strict expiry: a read past the
  /// expiry deletes the entry and reports a miss.
  pub fn get_cached_content(&self, url: &str, options: &FetchOptions) -> Option<CachedResponse> {
    let key = request_key(url, options);
    self.inner.get_cached(&key)
  }

  /// Store a value in the offline data blob with its own expiry.
  pub fn store_offline_data(&self, key: &str, data: &serde_json::Value, ttl: Option<Duration>) {
    let now = Utc::now();
    let ttl = ttl.unwrap_or(self.ttl);
    let entry = OfflineEntry {
      data: data.clone(),
      timestamp: now.timestamp_millis(),
      expiry: (now + ttl).timestamp_millis(),
    };

    let mut blob = self.inner.read_offline_blob();
    blob.insert(key.to_string(), entry);
    self.inner.write_offline_blob(&blob);
  }

  /// Read a value from the offline data blob. Expired keys report missing
  /// without mutating storage; pruning is the sweep's job.
  pub fn get_offline_data(&self, key: &str) -> Option<serde_json::Value> {
    let blob = self.inner.read_offline_blob();
    let entry = blob.get(key)?;
    if Utc::now().timestamp_millis() > entry.expiry {
      return None;
    }
    Some(entry.data.clone())
  }

  /// Sweep both stores, removing everything past expiry. Intended to run
  /// once at startup; per-item failures are logged and skipped.
  pub fn clean_expired_cache(&self) {
    let now = Utc::now();

    match self.inner.responses.keys() {
      Ok(keys) => {
        for key in keys {
          match self.inner.responses.get(&key) {
            Ok(Some(entry)) if entry.is_expired(now) => {
              if let Err(e) = self.inner.responses.delete(&key) {
                warn!(key, error = %e, "failed to delete expired cache entry");
              }
            }
            Ok(_) => {}
            Err(e) => warn!(key, error = %e, "failed to read cache entry during sweep"),
          }
        }
      }
      Err(e) => warn!(error = %e, "failed to list cache keys during sweep"),
    }

    let now_ms = now.timestamp_millis();
    let mut blob = self.inner.read_offline_blob();
    let before = blob.len();
    blob.retain(|_, entry| now_ms <= entry.expiry);
    if blob.len() != before {
      self.inner.write_offline_blob(&blob);
    }
  }

  /// Replay every queued request, then clear the queue. Individual failures
  /// are logged and do not stop the pass; their entries are still dropped
  /// when the queue is cleared.
  async fn process_sync_queue(&self) {
    let queued: Vec<SyncRequest> = {
      let queue = self
        .inner
        .sync_queue
        .lock()
        .unwrap_or_else(|e| e.into_inner());
      queue.clone()
    };

    if queued.is_empty() {
      return;
    }

    debug!(count = queued.len(), "replaying pending sync requests");
    for request in &queued {
      if let Err(e) = self.fetch_with_cache(&request.url, &request.options).await {
        warn!(url = %request.url, error = %e, "sync replay failed; request dropped");
      }
    }

    self
      .inner
      .sync_queue
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .clear();
  }
}

impl Inner {
  async fn fetch_sequence(
    &self,
    url: &str,
    options: &FetchOptions,
    key: &str,
    ttl: Duration,
  ) -> Result<FetchedResponse, FetchError> {
    let offline = !self.online.load(Ordering::SeqCst);

    if offline || options.cache_first {
      if let Some(hit) = self.get_cached(key) {
        debug!(url, "serving from cache");
        return Ok(FetchedResponse {
          body: hit.body,
          status: hit.status,
          source: FetchSource::Cache,
        });
      }
    }

    if offline {
      self.enqueue_sync(url, options);
      return Err(FetchError::Offline {
        url: url.to_string(),
      });
    }

    match (self.transport)(url.to_string()).await {
      Ok(resp) if (200..300).contains(&resp.status) => {
        if self.persist && options.use_cache {
          self.put_cached(key, &resp.body, resp.status, ttl);
        }
        Ok(FetchedResponse {
          body: resp.body,
          status: resp.status,
          source: FetchSource::Network,
        })
      }
      Ok(resp) => {
        self.enqueue_sync(url, options);
        match self.get_cached(key) {
          Some(hit) => {
            warn!(url, status = resp.status, "HTTP error, serving cached copy");
            Ok(FetchedResponse {
              body: hit.body,
              status: hit.status,
              source: FetchSource::Cache,
            })
          }
          None => Err(FetchError::Http {
            status: resp.status,
            url: url.to_string(),
          }),
        }
      }
      Err(reason) => {
        self.enqueue_sync(url, options);
        match self.get_cached(key) {
          Some(hit) => {
            warn!(url, %reason, "network failure, serving cached copy");
            Ok(FetchedResponse {
              body: hit.body,
              status: hit.status,
              source: FetchSource::Cache,
            })
          }
          None => Err(FetchError::Network {
            url: url.to_string(),
            reason,
          }),
        }
      }
    }
  }

  /// Strict-expiry read: expired entries are deleted and reported missing.
  fn get_cached(&self, key: &str) -> Option<CachedResponse> {
    match self.responses.get(key) {
      Ok(Some(entry)) => {
        if entry.is_expired(Utc::now()) {
          if let Err(e) = self.responses.delete(key) {
            warn!(key, error = %e, "failed to delete expired cache entry");
          }
          None
        } else {
          Some(entry)
        }
      }
      Ok(None) => None,
      Err(e) => {
        warn!(key, error = %e, "cache read failed, treating as miss");
        None
      }
    }
  }

  fn put_cached(&self, key: &str, body: &str, status: u16, ttl: Duration) {
    let now = Utc::now();
    let entry = CachedResponse {
      body: body.to_string(),
      status,
      cached_at: now,
      expires_at: now + ttl,
    };
    if let Err(e) = self.responses.put(key, &entry) {
      warn!(key, error = %e, "failed to store cache entry");
    }
  }

  fn enqueue_sync(&self, url: &str, options: &FetchOptions) {
    let request = SyncRequest {
      url: url.to_string(),
      options: options.clone(),
    };
    let mut queue = self.sync_queue.lock().unwrap_or_else(|e| e.into_inner());
    if !queue.contains(&request) {
      queue.push(request);
    }
  }

  fn read_offline_blob(&self) -> HashMap<String, OfflineEntry> {
    match self.kv.get_item(OFFLINE_STORAGE_KEY) {
      Ok(Some(raw)) => match serde_json::from_str(&raw) {
        Ok(blob) => blob,
        Err(e) => {
          warn!(error = %e, "offline data blob is corrupt, starting fresh");
          HashMap::new()
        }
      },
      Ok(None) => HashMap::new(),
      Err(e) => {
        warn!(error = %e, "failed to read offline data blob");
        HashMap::new()
      }
    }
  }

  fn write_offline_blob(&self, blob: &HashMap<String, OfflineEntry>) {
    match serde_json::to_string(blob) {
      Ok(raw) => {
        if let Err(e) = self.kv.set_item(OFFLINE_STORAGE_KEY, &raw) {
          warn!(error = %e, "failed to write offline data blob");
        }
      }
      Err(e) => warn!(error = %e, "failed to serialize offline data blob"),
    }
  }
}
