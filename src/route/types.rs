use serde::{Deserialize, Serialize};
use std::fmt;

/// The two guide tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentType {
  DevelopmentRoadmap,
  NodeGuides,
}

impl ContentType {
  /// Match order matters: development-roadmap patterns are tried first.
  pub const ALL: [ContentType; 2] = [ContentType::DevelopmentRoadmap, ContentType::NodeGuides];

  /// Canonical lowercase path segment for this track.
  pub fn slug(&self) -> &'static str {
    match self {
      ContentType::DevelopmentRoadmap => "development-roadmap",
      ContentType::NodeGuides => "node-guides",
    }
  }

  /// Case-sensitive reverse of [`slug`](Self::slug); anything else is not a track.
  pub fn from_slug(s: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|ct| ct.slug() == s)
  }
}

impl fmt::Display for ContentType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.slug())
  }
}

/// Where a path landed after pattern matching.
///
/// Nesting is enforced by construction: a subsection always carries its phase
/// and content type, a phase always carries its content type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RouteKind {
  Home,
  Section {
    content_type: ContentType,
  },
  Phase {
    content_type: ContentType,
    phase: String,
  },
  Subsection {
    content_type: ContentType,
    phase: String,
    subsection: String,
  },
  Unknown,
}

/// Structured description of "where the user is", derived from a URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
  pub kind: RouteKind,
  /// Effective language for this route (query parameter wins over the active
  /// language when it names a supported code).
  pub language: String,
  pub path: String,
  pub query: Option<String>,
  pub fragment: Option<String>,
  pub full_url: String,
}

impl Route {
  pub fn content_type(&self) -> Option<ContentType> {
    match &self.kind {
      RouteKind::Section { content_type }
      | RouteKind::Phase { content_type, .. }
      | RouteKind::Subsection { content_type, .. } => Some(*content_type),
      RouteKind::Home | RouteKind::Unknown => None,
    }
  }

  pub fn phase(&self) -> Option<&str> {
    match &self.kind {
      RouteKind::Phase { phase, .. } | RouteKind::Subsection { phase, .. } => Some(phase),
      _ => None,
    }
  }

  pub fn subsection(&self) -> Option<&str> {
    match &self.kind {
      RouteKind::Subsection { subsection, .. } => Some(subsection),
      _ => None,
    }
  }
}

/// A location as reported by the history backend: path plus optional query
/// and fragment, i.e. everything after the origin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
  pub path: String,
  pub query: Option<String>,
  pub fragment: Option<String>,
}

impl Location {
  /// Split a relative URL like `/node-guides/?lang=es#setup` into parts.
  pub fn parse(relative: &str) -> Self {
    let (rest, fragment) = match relative.split_once('#') {
      Some((r, f)) => (r, Some(f.to_string())),
      None => (relative, None),
    };
    let (path, query) = match rest.split_once('?') {
      Some((p, q)) => (p.to_string(), Some(q.to_string())),
      None => (rest.to_string(), None),
    };
    Location {
      path,
      query,
      fragment,
    }
  }

  /// Reassemble the relative URL.
  pub fn to_url(&self) -> String {
    let mut out = self.path.clone();
    if let Some(q) = &self.query {
      out.push('?');
      out.push_str(q);
    }
    if let Some(f) = &self.fragment {
      out.push('#');
      out.push_str(f);
    }
    out
  }

  /// First value of a query parameter, percent-decoded.
  pub fn query_param(&self, name: &str) -> Option<String> {
    let query = self.query.as_deref()?;
    url::form_urlencoded::parse(query.as_bytes())
      .find(|(k, _)| k == name)
      .map(|(_, v)| v.into_owned())
  }
}

/// One crumb of the Home > Section > Phase > Subsection trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breadcrumb {
  pub label: String,
  pub url: String,
}
