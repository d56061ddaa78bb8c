//! In-memory and SQLite-backed implementations of the storage traits.

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use super::traits::{CachedResponse, KeyValueStore, ResponseStore, StoreError, StoreResult};

/// Name of the persistent cache store, versioned so a schema change can
/// roll over to a fresh file.
pub const CACHE_STORE_NAME: &str = "crypto-guide-cache-v1";

/// Purely in-memory store. Implements both traits; used in tests and for
/// ephemeral runs where nothing should touch disk.
#[derive(Debug, Default)]
pub struct MemoryStore {
  responses: Mutex<HashMap<String, CachedResponse>>,
  items: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

impl ResponseStore for MemoryStore {
  fn get(&self, key: &str) -> StoreResult<Option<CachedResponse>> {
    let responses = self.responses.lock().unwrap_or_else(|e| e.into_inner());
    Ok(responses.get(key).cloned())
  }

  fn put(&self, key: &str, response: &CachedResponse) -> StoreResult<()> {
    let mut responses = self.responses.lock().unwrap_or_else(|e| e.into_inner());
    responses.insert(key.to_string(), response.clone());
    Ok(())
  }

  fn delete(&self, key: &str) -> StoreResult<bool> {
    let mut responses = self.responses.lock().unwrap_or_else(|e| e.into_inner());
    Ok(responses.remove(key).is_some())
  }

  fn keys(&self) -> StoreResult<Vec<String>> {
    let responses = self.responses.lock().unwrap_or_else(|e| e.into_inner());
    Ok(responses.keys().cloned().collect())
  }
}

impl KeyValueStore for MemoryStore {
  fn get_item(&self, key: &str) -> StoreResult<Option<String>> {
    let items = self.items.lock().unwrap_or_else(|e| e.into_inner());
    Ok(items.get(key).cloned())
  }

  fn set_item(&self, key: &str, value: &str) -> StoreResult<()> {
    let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());
    items.insert(key.to_string(), value.to_string());
    Ok(())
  }

  fn remove_item(&self, key: &str) -> StoreResult<()> {
    let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());
    items.remove(key);
    Ok(())
  }
}

/// SQLite-backed store for both the response cache and the key-value blob.
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

impl SqliteStore {
  /// Open (or create) the store at the default location.
  pub fn open() -> StoreResult<Self> {
    let path = Self::default_path()?;

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| StoreError(format!("failed to create cache directory: {e}")))?;
    }

    Self::open_at(&path)
  }

  /// Open a store at an explicit path.
  pub fn open_at(path: &Path) -> StoreResult<Self> {
    let conn = Connection::open(path)
      .map_err(|e| StoreError(format!("failed to open cache db at {}: {e}", path.display())))?;
    Self::from_connection(conn)
  }

  /// Transient store, handy in tests.
  pub fn open_in_memory() -> StoreResult<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| StoreError(format!("failed to open in-memory cache db: {e}")))?;
    Self::from_connection(conn)
  }

  fn from_connection(conn: Connection) -> StoreResult<Self> {
    let store = Self {
      conn: Mutex::new(conn),
    };
    store.run_migrations()?;
    Ok(store)
  }

  /// Default database path.
  fn default_path() -> StoreResult<std::path::PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| StoreError("could not determine data directory".to_string()))?;

    Ok(
      data_dir
        .join("crypto-guide")
        .join(format!("{CACHE_STORE_NAME}.db")),
    )
  }

  fn run_migrations(&self) -> StoreResult<()> {
    let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| StoreError(format!("failed to run cache migrations: {e}")))
  }
}

/// Schema for the cache tables. Timestamps are epoch milliseconds.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS response_cache (
    key TEXT PRIMARY KEY,
    body TEXT NOT NULL,
    status INTEGER NOT NULL,
    cached_at INTEGER NOT NULL,
    expires_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_response_cache_expires
    ON response_cache(expires_at);

CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

fn millis_to_datetime(ms: i64) -> StoreResult<DateTime<Utc>> {
  Utc
    .timestamp_millis_opt(ms)
    .single()
    .ok_or_else(|| StoreError(format!("invalid timestamp {ms}")))
}

impl ResponseStore for SqliteStore {
  fn get(&self, key: &str) -> StoreResult<Option<CachedResponse>> {
    let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());

    let row: Option<(String, u16, i64, i64)> = conn
      .query_row(
        "SELECT body, status, cached_at, expires_at FROM response_cache WHERE key = ?",
        params![key],
        |row| {
          Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
          ))
        },
      )
      .optional()
      .map_err(|e| StoreError(format!("failed to read cache entry: {e}")))?;

    match row {
      Some((body, status, cached_ms, expires_ms)) => Ok(Some(CachedResponse {
        body,
        status,
        cached_at: millis_to_datetime(cached_ms)?,
        expires_at: millis_to_datetime(expires_ms)?,
      })),
      None => Ok(None),
    }
  }

  fn put(&self, key: &str, response: &CachedResponse) -> StoreResult<()> {
    let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
    conn
      .execute(
        "INSERT OR REPLACE INTO response_cache (key, body, status, cached_at, expires_at)
         VALUES (?, ?, ?, ?, ?)",
        params![
          key,
          response.body,
          response.status,
          response.cached_at.timestamp_millis(),
          response.expires_at.timestamp_millis(),
        ],
      )
      .map_err(|e| StoreError(format!("failed to store cache entry: {e}")))?;
    Ok(())
  }

  fn delete(&self, key: &str) -> StoreResult<bool> {
    let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
    let affected = conn
      .execute("DELETE FROM response_cache WHERE key = ?", params![key])
      .map_err(|e| StoreError(format!("failed to delete cache entry: {e}")))?;
    Ok(affected > 0)
  }

  fn keys(&self) -> StoreResult<Vec<String>> {
    let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
    let mut stmt = conn
      .prepare("SELECT key FROM response_cache")
      .map_err(|e| StoreError(format!("failed to prepare key query: {e}")))?;

    let keys = stmt
      .query_map([], |row| row.get::<_, String>(0))
      .map_err(|e| StoreError(format!("failed to list cache keys: {e}")))?
      .filter_map(|r| r.ok())
      .collect();

    Ok(keys)
  }
}

impl KeyValueStore for SqliteStore {
  fn get_item(&self, key: &str) -> StoreResult<Option<String>> {
    let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
    conn
      .query_row(
        "SELECT value FROM kv_store WHERE key = ?",
        params![key],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| StoreError(format!("failed to read kv item: {e}")))
  }

  fn set_item(&self, key: &str, value: &str) -> StoreResult<()> {
    let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
    conn
      .execute(
        "INSERT OR REPLACE INTO kv_store (key, value) VALUES (?, ?)",
        params![key, value],
      )
      .map_err(|e| StoreError(format!("failed to store kv item: {e}")))?;
    Ok(())
  }

  fn remove_item(&self, key: &str) -> StoreResult<()> {
    let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
    conn
      .execute("DELETE FROM kv_store WHERE key = ?", params![key])
      .map_err(|e| StoreError(format!("failed to remove kv item: {e}")))?;
    Ok(())
  }
}
