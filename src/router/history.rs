//! Session history behind a trait, so native targets and tests supply their
//! own backing instead of a browser History API.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::route::Location;

/// State object carried by each history entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryState {
  pub path: String,
  pub language: String,
}

/// Browser-style session history: a current location, push, and replace.
pub trait HistoryBackend: Send + Sync {
  fn current(&self) -> Location;
  /// Append a new entry and make it current.
  fn push(&self, state: HistoryState, url: &str);
  /// Overwrite the current entry without growing the history.
  fn replace(&self, state: HistoryState, url: &str);
  fn depth(&self) -> usize;
}

/// In-memory session history with back/forward traversal.
pub struct InMemoryHistory {
  inner: Mutex<HistoryInner>,
}

struct HistoryInner {
  entries: Vec<(HistoryState, Location)>,
  index: usize,
}

impl InMemoryHistory {
  pub fn new(initial_url: &str) -> Self {
    let location = Location::parse(initial_url);
    let state = HistoryState {
      path: location.path.clone(),
      language: String::new(),
    };
    Self {
      inner: Mutex::new(HistoryInner {
        entries: vec![(state, location)],
        index: 0,
      }),
    }
  }

  /// Step back one entry, returning the new current location. The caller is
  /// expected to follow up with the router's pop-state handler.
  pub fn back(&self) -> Option<Location> {
    let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
    if inner.index == 0 {
      return None;
    }
    inner.index -= 1;
    Some(inner.entries[inner.index].1.clone())
  }

  /// Step forward one entry, returning the new current location.
  pub fn forward(&self) -> Option<Location> {
    let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
    if inner.index + 1 >= inner.entries.len() {
      return None;
    }
    inner.index += 1;
    Some(inner.entries[inner.index].1.clone())
  }

  pub fn current_state(&self) -> HistoryState {
    let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
    inner.entries[inner.index].0.clone()
  }
}

impl HistoryBackend for InMemoryHistory {
  fn current(&self) -> Location {
    let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
    inner.entries[inner.index].1.clone()
  }

  fn push(&self, state: HistoryState, url: &str) {
    let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
    let index = inner.index;
    // pushing from mid-history discards the forward entries, like a browser
    inner.entries.truncate(index + 1);
    inner.entries.push((state, Location::parse(url)));
    inner.index += 1;
  }

  fn replace(&self, state: HistoryState, url: &str) {
    let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
    let index = inner.index;
    inner.entries[index] = (state, Location::parse(url));
  }

  fn depth(&self) -> usize {
    let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
    inner.entries.len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn state(path: &str) -> HistoryState {
    HistoryState {
      path: path.to_string(),
      language: "en".to_string(),
    }
  }

  #[test]
  fn test_push_back_forward() {
    let history = InMemoryHistory::new("/");
    history.push(state("/node-guides/"), "/node-guides/");
    history.push(state("/development-roadmap/"), "/development-roadmap/");
    assert_eq!(history.depth(), 3);

    let back = history.back().unwrap();
    assert_eq!(back.path, "/node-guides/");
    let fwd = history.forward().unwrap();
    assert_eq!(fwd.path, "/development-roadmap/");
    assert!(history.forward().is_none());
  }

  #[test]
  fn test_replace_does_not_grow_history() {
    let history = InMemoryHistory::new("/node-guides/");
    history.replace(state("/node-guides/"), "/node-guides/?lang=es");
    assert_eq!(history.depth(), 1);
    assert_eq!(history.current().query.as_deref(), Some("lang=es"));
  }

  #[test]
  fn test_push_from_mid_history_discards_forward_entries() {
    let history = InMemoryHistory::new("/");
    history.push(state("/node-guides/"), "/node-guides/");
    history.back();
    history.push(state("/development-roadmap/"), "/development-roadmap/");
    assert_eq!(history.depth(), 2);
    assert_eq!(history.current().path, "/development-roadmap/");
  }
}
