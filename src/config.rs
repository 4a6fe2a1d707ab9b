//! Configuration: site origin, cache generation label, asset manifest.

use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
  pub site: SiteConfig,
  pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
  /// Origin that site-relative manifest paths are fetched against.
  pub origin: String,
}

impl Default for SiteConfig {
  fn default() -> Self {
    Self {
      origin: "http://localhost:5000".to_string(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Current cache generation label. Bumping this is the whole
  /// versioning contract: the next activation purges every other label.
  pub label: String,
  /// Assets guaranteed to be cached for offline use.
  pub manifest: Vec<String>,
  /// Last-resort path served when both cache and network fail.
  pub fallback_path: String,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      label: "association-chat-v1".to_string(),
      manifest: vec![
        "/".to_string(),
        "/static/style.css".to_string(),
        "/static/manifest.json".to_string(),
      ],
      fallback_path: "/".to_string(),
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./offcache.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/offcache/config.yaml
  ///
  /// With no file anywhere, the compiled defaults apply (they carry the
  /// fixed label/manifest contract, so the worker runs unconfigured).
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
    let local = PathBuf::from("offcache.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("offcache").join("config.yaml");
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
  fn test_defaults_carry_fixed_contract() {
    let config = Config::default();
    assert_eq!(config.cache.label, "association-chat-v1");
    assert_eq!(
      config.cache.manifest,
      vec!["/", "/static/style.css", "/static/manifest.json"]
    );
    assert_eq!(config.cache.fallback_path, "/");
  }

  #[test]
  fn test_parse_partial_yaml_keeps_defaults() {
    let config: Config = serde_yaml::from_str(
      r#"
site:
  origin: "https://chat.example.org"
cache:
  label: "association-chat-v2"
"#,
    )
    .unwrap();

    assert_eq!(config.site.origin, "https://chat.example.org");
    assert_eq!(config.cache.label, "association-chat-v2");
    // Untouched fields fall back to defaults
    assert_eq!(config.cache.manifest.len(), 3);
    assert_eq!(config.cache.fallback_path, "/");
  }

  #[test]
  fn test_parse_full_yaml() {
    let config: Config = serde_yaml::from_str(
      r#"
site:
  origin: "https://chat.example.org"
cache:
  label: "v9"
  manifest: ["/", "/app.js"]
  fallback_path: "/offline.html"
"#,
    )
    .unwrap();

    assert_eq!(config.cache.manifest, vec!["/", "/app.js"]);
    assert_eq!(config.cache.fallback_path, "/offline.html");
  }
}
