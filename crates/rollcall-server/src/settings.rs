//! Server configuration: a TOML file layered under `ROLLCALL_*` environment
//! variables.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::Context as _;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:             String,
  #[serde(default = "default_port")]
  pub port:             u16,
  #[serde(default = "default_store_path")]
  pub store_path:       PathBuf,
  /// Quiet period after each accepted scan, in milliseconds.
  #[serde(default = "default_scan_cooldown_ms")]
  pub scan_cooldown_ms: u64,
  /// Idle time after which an HTTP scan session is dropped, in seconds.
  #[serde(default = "default_session_idle_secs")]
  pub session_idle_secs: u64,
}

fn default_host() -> String { "127.0.0.1".into() }

fn default_port() -> u16 { 8080 }

fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/rollcall/rollcall.db") }

fn default_scan_cooldown_ms() -> u64 { 2000 }

fn default_session_idle_secs() -> u64 { 60 * 60 }

impl ServerConfig {
  /// Read `path` (optional) and the environment.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("ROLLCALL").try_parsing(true))
      .build()
      .context("failed to read config file")?;
    Self::from_settings(settings)
  }

  fn from_settings(settings: config::Config) -> anyhow::Result<Self> {
    settings
      .try_deserialize()
      .context("failed to deserialise ServerConfig")
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn scan_cooldown(&self) -> Duration { Duration::from_millis(self.scan_cooldown_ms) }

  pub fn session_idle(&self) -> Duration { Duration::from_secs(self.session_idle_secs) }

  /// `store_path` with a leading `~` expanded.
  pub fn resolved_store_path(&self) -> PathBuf { expand_tilde(&self.store_path) }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
