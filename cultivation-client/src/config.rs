//! Client configuration: an optional JSON file, then CLI overrides.

use anyhow::{Context, Result};
use cultivation_game::SaveSchedule;
use cultivation_game::constants::LOCAL_SAVE_KEY;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:5000/api";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub schedule: SaveSchedule,
    /// Base URL of the save API, including the `/api` prefix.
    pub server_url: String,
    /// File holding the local save cache.
    pub cache_path: PathBuf,
    pub user_id: Option<String>,
    pub token: Option<String>,
    pub request_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            schedule: SaveSchedule::default(),
            server_url: DEFAULT_SERVER_URL.to_string(),
            cache_path: PathBuf::from(format!("{LOCAL_SAVE_KEY}.json")),
            user_id: None,
            token: None,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

/// Values given on the command line; each one that is set wins over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub server_url: Option<String>,
    pub cache_path: Option<PathBuf>,
    pub user_id: Option<String>,
    pub token: Option<String>,
}

impl ClientConfig {
    /// Read a config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }

    /// Defaults, then the file at `path` if given, then `overrides`.
    pub fn resolve(path: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        if let Some(url) = overrides.server_url {
            config.server_url = url;
        }
        if let Some(cache_path) = overrides.cache_path {
            config.cache_path = cache_path;
        }
        if overrides.user_id.is_some() {
            config.user_id = overrides.user_id;
        }
        if overrides.token.is_some() {
            config.token = overrides.token;
        }
        Ok(config)
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// The user id is mandatory for every mode that talks to the server.
    pub fn require_user_id(&self) -> Result<&str> {
        self.user_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .context("a user id is required (--user-id or \"user_id\" in the config file)")
    }
}
