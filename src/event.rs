//! Typed event bus for cross-component notification.
//!
//! Fire-and-forget fan-out: any number of listeners may subscribe, emitting
//! with zero listeners is not an error, and emitters never wait on receivers.

use tokio::sync::broadcast;

use crate::content::RouteContent;
use crate::route::Route;

/// Events produced and consumed by the router and UI layers.
#[derive(Debug, Clone)]
pub enum AppEvent {
  /// Navigation completed with fully resolved route and content.
  RouteChanged {
    route: Route,
    content: Option<RouteContent>,
  },
  /// The active language was switched.
  LanguageChanged { new_language: String },
}

/// Broadcast-backed event bus handle. Cheap to clone.
#[derive(Debug, Clone)]
pub struct EventBus {
  tx: broadcast::Sender<AppEvent>,
}

impl EventBus {
  pub fn new(capacity: usize) -> Self {
    let (tx, _) = broadcast::channel(capacity);
    Self { tx }
  }

  pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
    self.tx.subscribe()
  }

  /// Emit to all current subscribers, if any.
  pub fn emit(&self, event: AppEvent) {
    // send only errs when there are no receivers, which is fine here
    let _ = self.tx.send(event);
  }
}

impl Default for EventBus {
  fn default() -> Self {
    Self::new(16)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_multiple_listeners_receive_the_same_event() {
    let bus = EventBus::default();
    let mut a = bus.subscribe();
    let mut b = bus.subscribe();

    bus.emit(AppEvent::LanguageChanged {
      new_language: "es".to_string(),
    });

    for rx in [&mut a, &mut b] {
      match rx.recv().await.unwrap() {
        AppEvent::LanguageChanged { new_language } => assert_eq!(new_language, "es"),
        other => panic!("unexpected event: {other:?}"),
      }
    }
  }

  #[test]
  fn test_emit_without_subscribers_is_a_noop() {
    let bus = EventBus::default();
    bus.emit(AppEvent::LanguageChanged {
      new_language: "fr".to_string(),
    });
  }
}
