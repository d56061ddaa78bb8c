//! Language registry: which languages exist, which one is active.
//!
//! Translations themselves travel through the content source; this type only
//! tracks codes and validates switches.

use std::sync::{Arc, RwLock};

use crate::config::I18nConfig;
use crate::error::RouteError;

#[derive(Debug, Clone)]
pub struct I18n {
  default_language: String,
  supported: Vec<String>,
  current: Arc<RwLock<String>>,
}

impl I18n {
  pub fn new(config: &I18nConfig) -> Self {
    let mut supported = config.supported.clone();
    if !supported.iter().any(|l| l == &config.default_language) {
      supported.insert(0, config.default_language.clone());
    }
    Self {
      default_language: config.default_language.clone(),
      supported,
      current: Arc::new(RwLock::new(config.default_language.clone())),
    }
  }

  pub fn current_language(&self) -> String {
    self
      .current
      .read()
      .unwrap_or_else(|e| e.into_inner())
      .clone()
  }

  pub fn default_language(&self) -> &str {
    &self.default_language
  }

  pub fn supported_languages(&self) -> &[String] {
    &self.supported
  }

  pub fn is_supported(&self, code: &str) -> bool {
    self.supported.iter().any(|l| l == code)
  }

  /// Switch the active language, rejecting unknown codes.
  pub fn set_language(&self, code: &str) -> Result<(), RouteError> {
    if !self.is_supported(code) {
      return Err(RouteError::UnsupportedLanguage(code.to_string()));
    }
    *self.current.write().unwrap_or_else(|e| e.into_inner()) = code.to_string();
    Ok(())
  }
}

impl Default for I18n {
  fn default() -> Self {
    Self::new(&I18nConfig::default())
  }
}
