//! Ordered route pattern matching.
//!
//! Patterns are tried in a fixed order - home, then section/phase/subsection
//! for each content type - and the first satisfying pattern wins. A path that
//! satisfies no pattern (wrong case, stray segment, missing `.html`) falls
//! through to [`RouteKind::Unknown`] rather than partially matching.

use super::{ContentType, RouteKind};

/// One typed pattern in the ordered match list.
#[derive(Debug, Clone, Copy)]
enum Pattern {
  Home,
  Section(ContentType),
  Phase(ContentType),
  Subsection(ContentType),
}

impl Pattern {
  fn matches(&self, path: &str) -> Option<RouteKind> {
    match self {
      Pattern::Home => matches!(path, "/" | "/index.html").then_some(RouteKind::Home),
      Pattern::Section(ct) => {
        let rest = path.strip_prefix('/')?.strip_prefix(ct.slug())?;
        matches!(rest, "" | "/").then_some(RouteKind::Section { content_type: *ct })
      }
      Pattern::Phase(ct) => {
        let rest = strip_track(path, *ct)?;
        let phase = rest.strip_suffix('/').unwrap_or(rest);
        is_slug(phase).then(|| RouteKind::Phase {
          content_type: *ct,
          phase: phase.to_string(),
        })
      }
      Pattern::Subsection(ct) => {
        let rest = strip_track(path, *ct)?;
        let (phase, file) = rest.split_once('/')?;
        let subsection = file.strip_suffix(".html")?;
        (is_slug(phase) && is_slug(subsection)).then(|| RouteKind::Subsection {
          content_type: *ct,
          phase: phase.to_string(),
          subsection: subsection.to_string(),
        })
      }
    }
  }
}

/// Strip `/<track>/` from the front of a path, requiring an exact slug match.
fn strip_track(path: &str, ct: ContentType) -> Option<&str> {
  path
    .strip_prefix('/')?
    .strip_prefix(ct.slug())?
    .strip_prefix('/')
}

/// Lowercase kebab slug: the only segment shape the site generates.
fn is_slug(s: &str) -> bool {
  !s.is_empty()
    && s
      .bytes()
      .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

fn ordered_patterns() -> impl Iterator<Item = Pattern> {
  std::iter::once(Pattern::Home).chain(ContentType::ALL.into_iter().flat_map(|ct| {
    [
      Pattern::Section(ct),
      Pattern::Phase(ct),
      Pattern::Subsection(ct),
    ]
  }))
}

/// Match a path against the full ordered pattern list, first match wins.
pub fn match_path(path: &str) -> RouteKind {
  ordered_patterns()
    .find_map(|p| p.matches(path))
    .unwrap_or(RouteKind::Unknown)
}

/// Whether a path addresses anything at all (pre-flight link validation).
pub fn is_valid_path(path: &str) -> bool {
  !matches!(match_path(path), RouteKind::Unknown)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_home_routes() {
    assert_eq!(match_path("/"), RouteKind::Home);
    assert_eq!(match_path("/index.html"), RouteKind::Home);
  }

  #[test]
  fn test_section_routes() {
    assert_eq!(
      match_path("/development-roadmap/"),
      RouteKind::Section {
        content_type: ContentType::DevelopmentRoadmap
      }
    );
    assert_eq!(
      match_path("/node-guides"),
      RouteKind::Section {
        content_type: ContentType::NodeGuides
      }
    );
  }

  #[test]
  fn test_phase_routes() {
    assert_eq!(
      match_path("/development-roadmap/phase-1/"),
      RouteKind::Phase {
        content_type: ContentType::DevelopmentRoadmap,
        phase: "phase-1".to_string(),
      }
    );
    assert_eq!(
      match_path("/node-guides/procurement-provisioning"),
      RouteKind::Phase {
        content_type: ContentType::NodeGuides,
        phase: "procurement-provisioning".to_string(),
      }
    );
  }

  #[test]
  fn test_subsection_routes() {
    assert_eq!(
      match_path("/development-roadmap/phase-1/database-schemas.html"),
      RouteKind::Subsection {
        content_type: ContentType::DevelopmentRoadmap,
        phase: "phase-1".to_string(),
        subsection: "database-schemas".to_string(),
      }
    );
  }

  #[test]
  fn test_malformed_paths_fall_through_to_unknown() {
    // wrong case on the track name
    assert_eq!(match_path("/Development-Roadmap/phase-1/"), RouteKind::Unknown);
    // wrong case on a slug
    assert_eq!(match_path("/node-guides/Phase-1/"), RouteKind::Unknown);
    // subsection without .html
    assert_eq!(
      match_path("/development-roadmap/phase-1/database-schemas"),
      RouteKind::Unknown
    );
    // trailing slash after a subsection file
    assert_eq!(
      match_path("/development-roadmap/phase-1/database-schemas.html/"),
      RouteKind::Unknown
    );
    // empty phase segment
    assert_eq!(match_path("/node-guides//setup.html"), RouteKind::Unknown);
    // unknown track
    assert_eq!(match_path("/blog/post-1/"), RouteKind::Unknown);
    // relative path
    assert_eq!(match_path("node-guides/"), RouteKind::Unknown);
  }

  #[test]
  fn test_is_valid_path() {
    assert!(is_valid_path("/"));
    assert!(is_valid_path("/node-guides/"));
    assert!(is_valid_path("/node-guides/phase-2/wallet-setup.html"));
    assert!(!is_valid_path("/nonsense/"));
    assert!(!is_valid_path(""));
  }
}
