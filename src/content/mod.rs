//! Guide content: the typed content tree, translation merging, and the
//! sources that produce content JSON.
//!
//! Base content and translations are fetched separately and merged with
//! translation keys winning, so a partially translated language still renders
//! with original-language fallbacks.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::future::Future;
use tracing::warn;

use crate::cache::{CacheManager, FetchOptions};
use crate::error::{FetchError, RouteError};
use crate::route::ContentType;

/// A guide document for one content track, after translation merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuideDocument {
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub phases: Vec<GuidePhase>,
  /// Keys this layer does not model (hero copy, metadata, ...).
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuidePhase {
  pub id: String,
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub subsections: Vec<GuideSubsection>,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuideSubsection {
  pub id: String,
  #[serde(default)]
  pub title: String,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl GuideDocument {
  pub fn phase(&self, id: &str) -> Option<&GuidePhase> {
    self.phases.iter().find(|p| p.id == id)
  }
}

impl GuidePhase {
  pub fn subsection(&self, id: &str) -> Option<&GuideSubsection> {
    self.subsections.iter().find(|s| s.id == id)
  }
}

/// Fully resolved content for a route: the merged document plus the nested
/// node the route addresses, when it addresses one.
#[derive(Debug, Clone)]
pub struct RouteContent {
  pub content_type: ContentType,
  pub document: GuideDocument,
  pub phase: Option<GuidePhase>,
  pub subsection: Option<GuideSubsection>,
}

/// Recursive object merge. Overlay keys win on conflict; non-object values
/// (including arrays) are replaced wholesale.
pub fn deep_merge(base: &mut Value, overlay: &Value) {
  match (base, overlay) {
    (Value::Object(base_map), Value::Object(overlay_map)) => {
      for (key, value) in overlay_map {
        match base_map.get_mut(key) {
          Some(slot) => deep_merge(slot, value),
          None => {
            base_map.insert(key.clone(), value.clone());
          }
        }
      }
    }
    (slot, value) => *slot = value.clone(),
  }
}

/// Where guide JSON comes from.
pub trait ContentSource: Send + Sync {
  /// Base (untranslated) content for a track.
  fn load_content(
    &self,
    content_type: ContentType,
  ) -> impl Future<Output = Result<Value, RouteError>> + Send;

  /// Translation overlay for a track in a given language. An empty object
  /// means "nothing to overlay".
  fn load_translations(
    &self,
    language: &str,
    content_type: ContentType,
  ) -> impl Future<Output = Result<Value, RouteError>> + Send;
}

/// Content source fetching site JSON over HTTP through the cache manager.
#[derive(Clone)]
pub struct HttpContentSource {
  cache: CacheManager,
  base_url: String,
}

impl HttpContentSource {
  pub fn new(cache: CacheManager, base_url: impl Into<String>) -> Self {
    let base_url = base_url.into().trim_end_matches('/').to_string();
    Self { cache, base_url }
  }

  fn content_url(&self, content_type: ContentType) -> String {
    format!("{}/data/{}.json", self.base_url, content_type.slug())
  }

  fn translations_url(&self, language: &str, content_type: ContentType) -> String {
    format!(
      "{}/i18n/{}/{}.json",
      self.base_url,
      language,
      content_type.slug()
    )
  }
}

impl ContentSource for HttpContentSource {
  async fn load_content(&self, content_type: ContentType) -> Result<Value, RouteError> {
    let url = self.content_url(content_type);
    let resp = self
      .cache
      .fetch_with_cache(&url, &FetchOptions::default())
      .await?;
    serde_json::from_str(&resp.body)
      .map_err(|e| RouteError::Content(format!("invalid content JSON for {content_type}: {e}")))
  }

  async fn load_translations(
    &self,
    language: &str,
    content_type: ContentType,
  ) -> Result<Value, RouteError> {
    let url = self.translations_url(language, content_type);
    // Translations change rarely; serve from cache when we have them.
    match self
      .cache
      .fetch_with_cache(&url, &FetchOptions::cache_first())
      .await
    {
      Ok(resp) => match serde_json::from_str(&resp.body) {
        Ok(value) => Ok(value),
        Err(e) => {
          warn!(url, error = %e, "invalid translation JSON, skipping overlay");
          Ok(Value::Object(Map::new()))
        }
      },
      // A track without a translation file for this language is normal;
      // the base content renders untranslated.
      Err(FetchError::Http { status: 404, .. }) => Ok(Value::Object(Map::new())),
      Err(e) => Err(e.into()),
    }
  }
}

/// Content source serving from in-memory maps. Used in tests and for bundled
/// deployments with no origin to fetch from.
#[derive(Debug, Clone, Default)]
pub struct StaticContentSource {
  content: HashMap<ContentType, Value>,
  translations: HashMap<(String, ContentType), Value>,
}

impl StaticContentSource {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_content(mut self, content_type: ContentType, value: Value) -> Self {
    self.content.insert(content_type, value);
    self
  }

  pub fn with_translations(
    mut self,
    language: &str,
    content_type: ContentType,
    value: Value,
  ) -> Self {
    self
      .translations
      .insert((language.to_string(), content_type), value);
    self
  }
}

impl ContentSource for StaticContentSource {
  async fn load_content(&self, content_type: ContentType) -> Result<Value, RouteError> {
    self.content.get(&content_type).cloned().ok_or_else(|| {
      RouteError::Fetch(FetchError::Http {
        status: 404,
        url: format!("/data/{}.json", content_type.slug()),
      })
    })
  }

  async fn load_translations(
    &self,
    language: &str,
    content_type: ContentType,
  ) -> Result<Value, RouteError> {
    Ok(
      self
        .translations
        .get(&(language.to_string(), content_type))
        .cloned()
        .unwrap_or(Value::Object(Map::new())),
    )
  }
}
