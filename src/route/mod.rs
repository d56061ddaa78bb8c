//! Typed route model and URL pattern matching.
//!
//! A [`Route`] describes where the user is on the guide site. Routes are
//! produced by [`matcher::match_path`] and are recreated wholesale on every
//! navigation - nothing mutates a route in place.

pub mod matcher;
mod types;

pub use types::{Breadcrumb, ContentType, Location, Route, RouteKind};
