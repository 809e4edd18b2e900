use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::query::QueryConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub catalog: CatalogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL of the document service, e.g. https://docs.example.com/api
  pub url: String,
  /// Login email, also used to scope per-user data when a token is supplied
  pub email: String,
  #[serde(default = "default_request_timeout")]
  pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
  30
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Fetches running longer than this fail with a timeout (0 disables)
  #[serde(default = "default_fetch_timeout")]
  pub fetch_timeout_secs: u64,
  /// Drop entries nobody watches after this long (unset keeps them)
  #[serde(default)]
  pub gc_time_secs: Option<u64>,
}

fn default_fetch_timeout() -> u64 {
  30
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      fetch_timeout_secs: default_fetch_timeout(),
      gc_time_secs: None,
    }
  }
}

impl CacheConfig {
  pub fn query_config(&self) -> QueryConfig {
    let fetch_timeout = match self.fetch_timeout_secs {
      0 => None,
      secs => Some(Duration::from_secs(secs)),
    };
    QueryConfig::default()
      .with_fetch_timeout(fetch_timeout)
      .with_gc_time(self.gc_time_secs.map(Duration::from_secs))
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
  /// Keep an offline copy of document listings
  #[serde(default = "default_catalog_enabled")]
  pub enabled: bool,
  /// Database location (default: $XDG_DATA_HOME/docdesk/catalog.db)
  #[serde(default)]
  pub path: Option<PathBuf>,
}

fn default_catalog_enabled() -> bool {
  true
}

impl Default for CatalogConfig {
  fn default() -> Self {
    Self {
      enabled: default_catalog_enabled(),
      path: None,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./docdesk.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/docdesk/config.yaml
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
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/docdesk/config.yaml\n\
                 See config.example.yaml for the format."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("docdesk.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("docdesk").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    url::Url::parse(&config.api.url)
      .map_err(|e| eyre!("api.url is not a valid URL ({}): {}", config.api.url, e))?;
    Ok(config)
  }

  /// Get a pre-issued API token from the environment.
  ///
  /// Checks DOCDESK_TOKEN.
  pub fn get_api_token() -> Option<String> {
    std::env::var("DOCDESK_TOKEN")
      .ok()
      .filter(|token| !token.trim().is_empty())
  }

  /// Get the login password from environment variables.
  ///
  /// Checks DOCDESK_PASSWORD.
  pub fn get_password() -> Result<String> {
    std::env::var("DOCDESK_PASSWORD").map_err(|_| {
      eyre!("Password not found. Set DOCDESK_PASSWORD or provide DOCDESK_TOKEN.")
    })
  }
}
