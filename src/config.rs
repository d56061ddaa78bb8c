use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
  pub site: SiteConfig,
  pub i18n: I18nConfig,
  pub cache: CacheConfig,
  pub router: RouterConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
  /// Origin the guide content is served from.
  pub base_url: String,
  /// Custom site title (defaults to the canonical one).
  pub title: Option<String>,
}

impl Default for SiteConfig {
  fn default() -> Self {
    Self {
      base_url: "http://localhost:8000".to_string(),
      title: None,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct I18nConfig {
  pub default_language: String,
  pub supported: Vec<String>,
}

impl Default for I18nConfig {
  fn default() -> Self {
    Self {
      default_language: "en".to_string(),
      supported: vec![
        "en".to_string(),
        "es".to_string(),
        "fr".to_string(),
        "de".to_string(),
      ],
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// How long a cached response stays servable.
  pub ttl_hours: i64,
  /// Disable to skip persisting fetched responses entirely.
  pub enabled: bool,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      ttl_hours: 24,
      enabled: true,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
  /// Bounded route-history capacity, oldest entries evicted first.
  pub history_limit: usize,
}

impl Default for RouterConfig {
  fn default() -> Self {
    Self { history_limit: 50 }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./crypto-guide.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/crypto-guide/config.yaml
  ///
  /// Unlike tools that need credentials, the site layout is fixed, so a
  /// missing config file just means defaults.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("crypto-guide.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("crypto-guide").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults() {
    let config = Config::default();
    assert_eq!(config.cache.ttl_hours, 24);
    assert!(config.cache.enabled);
    assert_eq!(config.router.history_limit, 50);
    assert_eq!(config.i18n.default_language, "en");
    assert!(config.i18n.supported.iter().any(|l| l == "es"));
  }

  #[test]
  fn test_partial_yaml_keeps_defaults_elsewhere() {
    let config: Config = serde_yaml::from_str(
      "site:\n  base_url: https://guide.example.org\ncache:\n  ttl_hours: 1\n",
    )
    .unwrap();
    assert_eq!(config.site.base_url, "https://guide.example.org");
    assert_eq!(config.cache.ttl_hours, 1);
    assert_eq!(config.router.history_limit, 50);
  }
}
