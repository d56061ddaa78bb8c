//! URL-driven navigation: parse the location, load content, emit events.
//!
//! The router owns the current route and a bounded trail of visited routes.
//! Navigation is all-or-nothing: the route-changed event always carries the
//! fully resolved route and content, or the call fails and nothing is
//! emitted. In-flight loads that resolve after a newer navigation started
//! are dropped instead of clobbering the newer state.

pub mod history;

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::config::RouterConfig;
use crate::content::{deep_merge, ContentSource, GuideDocument, RouteContent};
use crate::error::RouteError;
use crate::event::{AppEvent, EventBus};
use crate::i18n::I18n;
use crate::route::{matcher, Breadcrumb, ContentType, Location, Route, RouteKind};
use history::{HistoryBackend, HistoryState};

/// A visited route with its timestamp.
#[derive(Debug, Clone)]
pub struct RouteHistoryEntry {
  pub route: Route,
  pub at: DateTime<Utc>,
}

pub struct Router<S, H> {
  source: S,
  history: H,
  i18n: I18n,
  events: EventBus,
  current: Mutex<Option<Route>>,
  visited: Mutex<VecDeque<RouteHistoryEntry>>,
  history_limit: usize,
  /// Monotonic navigation id; loads that finish under an older id are stale.
  nav_seq: AtomicU64,
}

impl<S: ContentSource, H: HistoryBackend> Router<S, H> {
  pub fn new(source: S, history: H, i18n: I18n, events: EventBus, config: &RouterConfig) -> Self {
    Self {
      source,
      history,
      i18n,
      events,
      current: Mutex::new(None),
      visited: Mutex::new(VecDeque::new()),
      history_limit: config.history_limit,
      nav_seq: AtomicU64::new(0),
    }
  }

  /// Parse the history backend's current location into a route and cache it
  /// as the current route. No other side effects.
  pub fn parse_current_route(&self) -> Route {
    let location = self.history.current();
    let route = self.parse_route(&location);
    *self.current.lock().unwrap_or_else(|e| e.into_inner()) = Some(route.clone());
    route
  }

  fn parse_route(&self, location: &Location) -> Route {
    Route {
      kind: matcher::match_path(&location.path),
      language: self.resolve_language(location),
      path: location.path.clone(),
      query: location.query.clone(),
      fragment: location.fragment.clone(),
      full_url: location.to_url(),
    }
  }

  /// `?lang=` wins when it names a supported code, otherwise the active
  /// language applies.
  fn resolve_language(&self, location: &Location) -> String {
    match location.query_param("lang") {
      Some(code) if self.i18n.is_supported(&code) => code,
      _ => self.i18n.current_language(),
    }
  }

  pub fn current_route(&self) -> Option<Route> {
    self
      .current
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .clone()
  }

  pub fn route_history(&self) -> Vec<RouteHistoryEntry> {
    self
      .visited
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .iter()
      .cloned()
      .collect()
  }

  /// Pre-flight link validation: does this path address anything?
  pub fn is_valid_route(&self, path: &str) -> bool {
    matcher::is_valid_path(path)
  }

  /// Navigate to a path, optionally switching language and pushing a history
  /// entry. Emits `RouteChanged` with the fully resolved route and content,
  /// or returns the load error without emitting.
  pub async fn navigate_to(
    &self,
    path: &str,
    language: Option<&str>,
    push_state: bool,
  ) -> Result<(), RouteError> {
    let seq = self.nav_seq.fetch_add(1, Ordering::SeqCst) + 1;

    let language = match language {
      Some(code) => {
        if !self.i18n.is_supported(code) {
          return Err(RouteError::UnsupportedLanguage(code.to_string()));
        }
        code.to_string()
      }
      None => self.i18n.current_language(),
    };

    let location = self.with_lang_param(Location::parse(path), &language);

    if push_state {
      if let Some(previous) = self.current_route() {
        self.record_visited(previous);
      }
      self.history.push(
        HistoryState {
          path: location.path.clone(),
          language: language.clone(),
        },
        &location.to_url(),
      );
    }

    let mut route = self.parse_route(&location);
    route.language = language.clone();
    *self.current.lock().unwrap_or_else(|e| e.into_inner()) = Some(route.clone());

    if self.i18n.current_language() != language {
      self.i18n.set_language(&language)?;
    }

    let content = self.load_route_content(&route).await?;

    if self.nav_seq.load(Ordering::SeqCst) != seq {
      debug!(path = %route.path, "navigation superseded, dropping stale result");
      return Ok(());
    }
    self.events.emit(AppEvent::RouteChanged { route, content });
    Ok(())
  }

  /// Load and merge content for a route. `None` for routes that have no
  /// content type (home, unknown).
  pub async fn load_route_content(
    &self,
    route: &Route,
  ) -> Result<Option<RouteContent>, RouteError> {
    let Some(content_type) = route.content_type() else {
      return Ok(None);
    };

    let mut merged = self.source.load_content(content_type).await?;
    let overlay = self
      .source
      .load_translations(&route.language, content_type)
      .await?;
    deep_merge(&mut merged, &overlay);

    let document: GuideDocument = serde_json::from_value(merged)
      .map_err(|e| RouteError::Content(format!("malformed content tree for {content_type}: {e}")))?;

    let (phase, subsection) = match &route.kind {
      RouteKind::Phase { phase, .. } => {
        let p = document
          .phase(phase)
          .ok_or_else(|| RouteError::PhaseNotFound {
            content_type,
            phase: phase.clone(),
          })?;
        (Some(p.clone()), None)
      }
      RouteKind::Subsection {
        phase, subsection, ..
      } => {
        let p = document
          .phase(phase)
          .ok_or_else(|| RouteError::PhaseNotFound {
            content_type,
            phase: phase.clone(),
          })?;
        let s = p
          .subsection(subsection)
          .ok_or_else(|| RouteError::SubsectionNotFound {
            content_type,
            phase: phase.clone(),
            subsection: subsection.clone(),
          })?;
        (Some(p.clone()), Some(s.clone()))
      }
      _ => (None, None),
    };

    Ok(Some(RouteContent {
      content_type,
      document,
      phase,
      subsection,
    }))
  }

  /// Reload after the backend's location changed underneath us
  /// (back/forward). There is no caller to report to, so failures are logged
  /// and swallowed.
  pub async fn handle_pop_state(&self) {
    let seq = self.nav_seq.fetch_add(1, Ordering::SeqCst) + 1;
    let route = self.parse_current_route();

    match self.load_route_content(&route).await {
      Ok(content) => {
        if self.nav_seq.load(Ordering::SeqCst) == seq {
          self.events.emit(AppEvent::RouteChanged { route, content });
        }
      }
      Err(e) => {
        warn!(path = %route.path, error = %e, "content reload after history navigation failed");
      }
    }
  }

  /// Switch the active language in place: rewrite the current URL's query
  /// without a new history entry, reload content, re-emit.
  pub async fn handle_language_change(&self, new_language: &str) -> Result<(), RouteError> {
    self.i18n.set_language(new_language)?;
    self.events.emit(AppEvent::LanguageChanged {
      new_language: new_language.to_string(),
    });
    let seq = self.nav_seq.fetch_add(1, Ordering::SeqCst) + 1;

    let location = self.with_lang_param(self.history.current(), new_language);
    self.history.replace(
      HistoryState {
        path: location.path.clone(),
        language: new_language.to_string(),
      },
      &location.to_url(),
    );

    let mut route = match self.current_route() {
      Some(route) => route,
      None => self.parse_route(&location),
    };
    route.language = new_language.to_string();
    route.query = location.query.clone();
    route.full_url = location.to_url();
    *self.current.lock().unwrap_or_else(|e| e.into_inner()) = Some(route.clone());

    let content = self.load_route_content(&route).await?;
    if self.nav_seq.load(Ordering::SeqCst) == seq {
      self.events.emit(AppEvent::RouteChanged { route, content });
    }
    Ok(())
  }

  /// Canonical path for any addressable content node. The language parameter
  /// appears only when the effective language is not the default.
  pub fn generate_url(
    &self,
    content_type: ContentType,
    phase: Option<&str>,
    subsection: Option<&str>,
    language: Option<&str>,
  ) -> String {
    let path = match (phase, subsection) {
      (Some(p), Some(s)) => format!("/{}/{}/{}.html", content_type.slug(), p, s),
      (Some(p), None) => format!("/{}/{}/", content_type.slug(), p),
      _ => format!("/{}/", content_type.slug()),
    };
    self.append_lang(path, language)
  }

  fn append_lang(&self, path: String, language: Option<&str>) -> String {
    let effective = match language {
      Some(code) => code.to_string(),
      None => self.i18n.current_language(),
    };
    if effective != self.i18n.default_language() {
      format!("{path}?lang={effective}")
    } else {
      path
    }
  }

  /// Home > Section > Phase > Subsection trail for the current route, labeled
  /// from the merged (translated) content tree. Empty when the route has no
  /// content type.
  pub async fn breadcrumbs(&self) -> Result<Vec<Breadcrumb>, RouteError> {
    let Some(route) = self.current_route() else {
      return Ok(Vec::new());
    };
    let Some(content) = self.load_route_content(&route).await? else {
      return Ok(Vec::new());
    };

    let lang = Some(route.language.as_str());
    let content_type = content.content_type;

    let mut crumbs = vec![Breadcrumb {
      label: "Home".to_string(),
      url: self.append_lang("/".to_string(), lang),
    }];

    let section_label = if content.document.title.is_empty() {
      content_type.to_string()
    } else {
      content.document.title.clone()
    };
    crumbs.push(Breadcrumb {
      label: section_label,
      url: self.generate_url(content_type, None, None, lang),
    });

    if let Some(phase) = &content.phase {
      let label = if phase.title.is_empty() {
        phase.id.clone()
      } else {
        phase.title.clone()
      };
      crumbs.push(Breadcrumb {
        label,
        url: self.generate_url(content_type, Some(&phase.id), None, lang),
      });

      if let Some(sub) = &content.subsection {
        let label = if sub.title.is_empty() {
          sub.id.clone()
        } else {
          sub.title.clone()
        };
        crumbs.push(Breadcrumb {
          label,
          url: self.generate_url(content_type, Some(&phase.id), Some(&sub.id), lang),
        });
      }
    }

    Ok(crumbs)
  }

  /// Rewrite a location's query so `lang` is present exactly when the given
  /// language is not the default; every other parameter is preserved.
  fn with_lang_param(&self, mut location: Location, language: &str) -> Location {
    let retained: Vec<(String, String)> = location
      .query
      .as_deref()
      .map(|q| {
        url::form_urlencoded::parse(q.as_bytes())
          .filter(|(k, _)| k != "lang")
          .map(|(k, v)| (k.into_owned(), v.into_owned()))
          .collect()
      })
      .unwrap_or_default();

    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (k, v) in &retained {
      serializer.append_pair(k, v);
    }
    if language != self.i18n.default_language() {
      serializer.append_pair("lang", language);
    }
    let query = serializer.finish();
    location.query = (!query.is_empty()).then_some(query);
    location
  }

  fn record_visited(&self, route: Route) {
    let mut visited = self.visited.lock().unwrap_or_else(|e| e.into_inner());
    while visited.len() >= self.history_limit {
      visited.pop_front();
    }
    visited.push_back(RouteHistoryEntry {
      route,
      at: Utc::now(),
    });
  }
}

#[cfg(test)]
mod tests {
  use super::history::InMemoryHistory;
  use super::*;
  use crate::content::StaticContentSource;
  use serde_json::json;

  fn roadmap_content() -> serde_json::Value {
    json!({
      "title": "Development Roadmap",
      "phases": [
        {"id": "phase-1", "title": "Foundations", "subsections": [
          {"id": "database-schemas", "title": "Database Schemas"},
          {"id": "api-design", "title": "API Design"}
        ]},
        {"id": "phase-2", "title": "Hardening", "subsections": []}
      ]
    })
  }

  fn node_guides_content() -> serde_json::Value {
    json!({
      "title": "Node Guides",
      "phases": [
        {"id": "procurement-provisioning", "title": "Procurement", "subsections": [
          {"id": "hardware", "title": "Hardware Selection"}
        ]}
      ]
    })
  }

  fn test_source() -> StaticContentSource {
    StaticContentSource::new()
      .with_content(ContentType::DevelopmentRoadmap, roadmap_content())
      .with_content(ContentType::NodeGuides, node_guides_content())
      .with_translations(
        "es",
        ContentType::DevelopmentRoadmap,
        json!({"title": "Hoja de Ruta"}),
      )
  }

  fn test_router(initial_url: &str) -> Router<StaticContentSource, InMemoryHistory> {
    Router::new(
      test_source(),
      InMemoryHistory::new(initial_url),
      I18n::default(),
      EventBus::default(),
      &RouterConfig::default(),
    )
  }

  #[test]
  fn test_parse_current_route_subsection() {
    let router = test_router("/development-roadmap/phase-1/database-schemas.html");
    let route = router.parse_current_route();
    assert_eq!(
      route.kind,
      RouteKind::Subsection {
        content_type: ContentType::DevelopmentRoadmap,
        phase: "phase-1".to_string(),
        subsection: "database-schemas".to_string(),
      }
    );
    assert_eq!(route.language, "en");
    assert_eq!(router.current_route(), Some(route));
  }

  #[test]
  fn test_lang_query_param_overrides_active_language() {
    let router = test_router("/node-guides/?lang=es");
    assert_eq!(router.parse_current_route().language, "es");

    // unsupported codes fall back to the active language
    let router = test_router("/node-guides/?lang=zz");
    assert_eq!(router.parse_current_route().language, "en");
  }

  #[test]
  fn test_generate_url_roundtrips_through_matcher() {
    let router = test_router("/");
    let cases = [
      (ContentType::DevelopmentRoadmap, None, None),
      (ContentType::NodeGuides, Some("phase-1"), None),
      (
        ContentType::DevelopmentRoadmap,
        Some("phase-1"),
        Some("database-schemas"),
      ),
    ];

    for (ct, phase, sub) in cases {
      let url = router.generate_url(ct, phase, sub, None);
      let location = Location::parse(&url);
      let route = Route {
        kind: matcher::match_path(&location.path),
        language: "en".to_string(),
        path: location.path.clone(),
        query: location.query.clone(),
        fragment: None,
        full_url: url.clone(),
      };
      assert_eq!(route.content_type(), Some(ct), "url: {url}");
      assert_eq!(route.phase(), phase, "url: {url}");
      assert_eq!(route.subsection(), sub, "url: {url}");
      // default language never appears in the query
      assert!(location.query.is_none(), "url: {url}");
    }

    let url = router.generate_url(ContentType::NodeGuides, Some("phase-1"), None, Some("es"));
    assert_eq!(url, "/node-guides/phase-1/?lang=es");
  }

  #[tokio::test]
  async fn test_navigate_records_history_and_pushes_state() {
    let router = test_router("/");
    router.parse_current_route();
    let depth_before = router.history.depth();

    router.navigate_to("/node-guides/", None, true).await.unwrap();
    router
      .navigate_to("/development-roadmap/", None, true)
      .await
      .unwrap();

    let visited = router.route_history();
    let last = visited.last().unwrap();
    assert_eq!(last.route.path, "/node-guides/");
    assert_eq!(router.history.depth(), depth_before + 2);
    assert_eq!(
      router.current_route().unwrap().path,
      "/development-roadmap/"
    );
  }

  #[tokio::test]
  async fn test_visited_history_is_bounded() {
    let router = Router::new(
      test_source(),
      InMemoryHistory::new("/"),
      I18n::default(),
      EventBus::default(),
      &RouterConfig { history_limit: 3 },
    );
    router.parse_current_route();

    for _ in 0..5 {
      router.navigate_to("/node-guides/", None, true).await.unwrap();
      router
        .navigate_to("/development-roadmap/", None, true)
        .await
        .unwrap();
    }
    assert_eq!(router.route_history().len(), 3);
  }

  #[tokio::test]
  async fn test_navigate_emits_route_changed_with_content() {
    let bus = EventBus::default();
    let mut rx = bus.subscribe();
    let router = Router::new(
      test_source(),
      InMemoryHistory::new("/"),
      I18n::default(),
      bus,
      &RouterConfig::default(),
    );

    router
      .navigate_to("/development-roadmap/phase-1/api-design.html", None, true)
      .await
      .unwrap();

    match rx.recv().await.unwrap() {
      AppEvent::RouteChanged { route, content } => {
        assert_eq!(route.subsection(), Some("api-design"));
        let content = content.unwrap();
        assert_eq!(content.document.title, "Development Roadmap");
        assert_eq!(content.subsection.unwrap().title, "API Design");
      }
      other => panic!("unexpected event: {other:?}"),
    }
  }

  #[tokio::test]
  async fn test_missing_subsection_rejects_without_emitting() {
    let bus = EventBus::default();
    let mut rx = bus.subscribe();
    let router = Router::new(
      test_source(),
      InMemoryHistory::new("/"),
      I18n::default(),
      bus,
      &RouterConfig::default(),
    );

    let err = router
      .navigate_to(
        "/development-roadmap/phase-1/no-such-topic.html",
        None,
        true,
      )
      .await
      .unwrap_err();
    assert!(matches!(
      err,
      RouteError::SubsectionNotFound { ref subsection, .. } if subsection == "no-such-topic"
    ));
    assert!(rx.try_recv().is_err());
  }

  #[tokio::test]
  async fn test_missing_phase_rejects() {
    let router = test_router("/");
    let err = router
      .navigate_to("/node-guides/phase-9/", None, true)
      .await
      .unwrap_err();
    assert!(matches!(
      err,
      RouteError::PhaseNotFound { ref phase, .. } if phase == "phase-9"
    ));
  }

  #[tokio::test]
  async fn test_routes_without_content_type_emit_none_content() {
    let bus = EventBus::default();
    let mut rx = bus.subscribe();
    let router = Router::new(
      test_source(),
      InMemoryHistory::new("/"),
      I18n::default(),
      bus,
      &RouterConfig::default(),
    );

    router.navigate_to("/", None, true).await.unwrap();
    match rx.recv().await.unwrap() {
      AppEvent::RouteChanged { route, content } => {
        assert_eq!(route.kind, RouteKind::Home);
        assert!(content.is_none());
      }
      other => panic!("unexpected event: {other:?}"),
    }
  }

  #[tokio::test]
  async fn test_pop_state_reemits_for_restored_location() {
    let bus = EventBus::default();
    let mut rx = bus.subscribe();
    let router = Router::new(
      test_source(),
      InMemoryHistory::new("/"),
      I18n::default(),
      bus,
      &RouterConfig::default(),
    );

    router.navigate_to("/node-guides/", None, true).await.unwrap();
    let _ = rx.recv().await.unwrap();

    router.history.back().unwrap();
    router.handle_pop_state().await;

    match rx.recv().await.unwrap() {
      AppEvent::RouteChanged { route, .. } => assert_eq!(route.kind, RouteKind::Home),
      other => panic!("unexpected event: {other:?}"),
    }
  }

  #[tokio::test]
  async fn test_language_change_rewrites_url_in_place() {
    let router = test_router("/development-roadmap/");
    router.parse_current_route();
    let depth_before = router.history.depth();

    router.handle_language_change("es").await.unwrap();

    assert_eq!(router.history.depth(), depth_before);
    let location = router.history.current();
    assert_eq!(location.query.as_deref(), Some("lang=es"));
    let current = router.current_route().unwrap();
    assert_eq!(current.language, "es");

    // switching back to the default removes the parameter
    router.handle_language_change("en").await.unwrap();
    assert!(router.history.current().query.is_none());
  }

  #[tokio::test]
  async fn test_breadcrumbs_for_subsection_route() {
    let router = test_router("/development-roadmap/phase-1/database-schemas.html?lang=es");
    router.parse_current_route();

    let crumbs = router.breadcrumbs().await.unwrap();
    let labels: Vec<&str> = crumbs.iter().map(|c| c.label.as_str()).collect();
    // section title comes from the Spanish overlay, the rest from base content
    assert_eq!(
      labels,
      vec!["Home", "Hoja de Ruta", "Foundations", "Database Schemas"]
    );
    assert_eq!(
      crumbs[3].url,
      "/development-roadmap/phase-1/database-schemas.html?lang=es"
    );
  }

  #[tokio::test]
  async fn test_breadcrumbs_empty_without_content_type() {
    let router = test_router("/");
    router.parse_current_route();
    assert!(router.breadcrumbs().await.unwrap().is_empty());
  }

  #[test]
  fn test_is_valid_route() {
    let router = test_router("/");
    assert!(router.is_valid_route("/node-guides/"));
    assert!(!router.is_valid_route("/Node-Guides/"));
  }

  /// Content source that parks loads for one track until released, so a test
  /// can interleave a slow navigation with a fast one.
  struct GatedSource {
    inner: StaticContentSource,
    slow: ContentType,
    gate: std::sync::Arc<tokio::sync::Notify>,
  }

  impl ContentSource for GatedSource {
    async fn load_content(&self, content_type: ContentType) -> Result<serde_json::Value, RouteError> {
      if content_type == self.slow {
        self.gate.notified().await;
      }
      self.inner.load_content(content_type).await
    }

    async fn load_translations(
      &self,
      language: &str,
      content_type: ContentType,
    ) -> Result<serde_json::Value, RouteError> {
      self.inner.load_translations(language, content_type).await
    }
  }

  #[tokio::test]
  async fn test_superseded_navigation_does_not_emit_or_clobber() {
    let gate = std::sync::Arc::new(tokio::sync::Notify::new());
    let bus = EventBus::default();
    let mut rx = bus.subscribe();
    let router = Router::new(
      GatedSource {
        inner: test_source(),
        slow: ContentType::NodeGuides,
        gate: gate.clone(),
      },
      InMemoryHistory::new("/"),
      I18n::default(),
      bus,
      &RouterConfig::default(),
    );

    // first navigation stalls in content loading; the second completes and
    // then releases the first
    let (slow, _) = tokio::join!(router.navigate_to("/node-guides/", None, true), async {
      router
        .navigate_to("/development-roadmap/", None, true)
        .await
        .unwrap();
      gate.notify_one();
    });

    // the superseded load finished cleanly but was dropped
    slow.unwrap();
    match rx.recv().await.unwrap() {
      AppEvent::RouteChanged { route, .. } => assert_eq!(route.path, "/development-roadmap/"),
      other => panic!("unexpected event: {other:?}"),
    }
    assert!(rx.try_recv().is_err());
    assert_eq!(
      router.current_route().unwrap().path,
      "/development-roadmap/"
    );
  }
}
