//! Application root: builds the component graph once and drives the router.

use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;

use crate::cache::{reqwest_transport, CacheManager, SqliteStore};
use crate::config::Config;
use crate::content::{HttpContentSource, RouteContent};
use crate::event::{AppEvent, EventBus};
use crate::i18n::I18n;
use crate::route::Route;
use crate::router::history::InMemoryHistory;
use crate::router::Router;

pub struct App {
  config: Config,
  cache: CacheManager,
  events: EventBus,
  router: Router<HttpContentSource, InMemoryHistory>,
}

impl App {
  pub async fn new(config: Config, offline: bool) -> Result<Self> {
    let store =
      Arc::new(SqliteStore::open().map_err(|e| eyre!("failed to open cache store: {e}"))?);
    let client = reqwest::Client::builder()
      .user_agent(concat!("crypto-guide/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("failed to build HTTP client: {e}"))?;

    let cache = CacheManager::new(
      store.clone(),
      store,
      reqwest_transport(client),
      &config.cache,
    );
    // expiry sweep runs once at startup, not continuously
    cache.clean_expired_cache();
    if offline {
      cache.set_online(false).await;
    }

    let events = EventBus::default();
    let i18n = I18n::new(&config.i18n);
    let source = HttpContentSource::new(cache.clone(), &config.site.base_url);
    let history = InMemoryHistory::new("/");
    let router = Router::new(source, history, i18n, events.clone(), &config.router);

    Ok(Self {
      config,
      cache,
      events,
      router,
    })
  }

  /// Navigate to a site path and print what a page visitor would see.
  pub async fn open(&self, path: &str, language: Option<&str>, crumbs: bool) -> Result<()> {
    if !self.router.is_valid_route(path) {
      return Err(eyre!("'{path}' does not match any guide route"));
    }

    let mut rx = self.events.subscribe();
    self.router.navigate_to(path, language, true).await?;

    if let Ok(AppEvent::RouteChanged { route, content }) = rx.try_recv() {
      self.render(&route, content.as_ref());
    }

    if crumbs {
      let trail = self.router.breadcrumbs().await?;
      let rendered: Vec<String> = trail
        .iter()
        .map(|c| format!("{} ({})", c.label, c.url))
        .collect();
      println!("\n{}", rendered.join(" > "));
    }

    if !self.cache.is_online() {
      println!("\n[offline mode: content served from cache]");
    }

    Ok(())
  }

  fn render(&self, route: &Route, content: Option<&RouteContent>) {
    let site_title = self
      .config
      .site
      .title
      .as_deref()
      .unwrap_or("The Road to Crypto");
    println!("{site_title} - {} [{}]", route.full_url, route.language);

    let Some(content) = content else {
      println!("(no content for this route)");
      return;
    };

    match (&content.phase, &content.subsection) {
      (Some(phase), Some(sub)) => {
        println!("\n{} / {}", phase.title, sub.title);
      }
      (Some(phase), None) => {
        println!("\n{}", phase.title);
        for sub in &phase.subsections {
          println!("  - {} ({})", sub.title, sub.id);
        }
      }
      _ => {
        println!("\n{}", content.document.title);
        if let Some(description) = &content.document.description {
          println!("{description}");
        }
        for phase in &content.document.phases {
          println!("  - {} ({})", phase.title, phase.id);
        }
      }
    }
  }
}
