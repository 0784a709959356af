//! Persistent configuration.
//!
//! Stored as TOML at `~/.flickrank.toml` and rewritten whenever the stored
//! credential changes. Every key is optional:
//!
//! ```toml
//! workers = 20                # concurrent detail fetches
//! cache_ttl_secs = 3600       # how long a cached photo stays fresh
//! verifier_timeout_secs = 300 # how long to wait for the browser grant
//! http_timeout_secs = 30      # per-request timeout
//!
//! [credential]
//! username = "jane"
//! user_nsid = "21207597@N07"
//! consumer_key = "..."
//! consumer_secret = "..."
//! access_token = "..."
//! access_token_secret = "..."
//! ```
//!
//! The file holds secrets, so on Unix it is written with mode `0600`.
//! Unknown keys are rejected.

use crate::oauth::{AccessGrant, ConsumerKey, TokenPair};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const CONFIG_FILENAME: &str = ".flickrank.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML write error: {0}")]
    TomlWrite(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub workers: usize,
    pub cache_ttl_secs: u64,
    pub verifier_timeout_secs: u64,
    pub http_timeout_secs: u64,
    pub credential: Credential,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workers: 20,
            cache_ttl_secs: 60 * 60,
            verifier_timeout_secs: 300,
            http_timeout_secs: 30,
            credential: Credential::default(),
        }
    }
}

/// Who we are (consumer key) and who we act for (access token).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Credential {
    /// Flickr screen name of the authorizing user.
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_nsid: Option<String>,
    pub consumer_key: String,
    pub consumer_secret: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token_secret: Option<String>,
}

impl Credential {
    /// The API key pair, once both halves are known.
    pub fn consumer(&self) -> Option<ConsumerKey> {
        if self.consumer_key.is_empty() || self.consumer_secret.is_empty() {
            return None;
        }
        Some(ConsumerKey::new(&self.consumer_key, &self.consumer_secret))
    }

    pub fn access_token(&self) -> Option<TokenPair> {
        match (&self.access_token, &self.access_token_secret) {
            (Some(token), Some(secret)) if !token.is_empty() && !secret.is_empty() => {
                Some(TokenPair::new(token, secret))
            }
            _ => None,
        }
    }

    /// Forget the access token (and the NSID that came with it).
    pub fn clear_access(&mut self) {
        self.access_token = None;
        self.access_token_secret = None;
        self.user_nsid = None;
    }

    /// Switch to `username`. A different user invalidates the stored token.
    /// Returns whether anything changed.
    pub fn set_username(&mut self, username: &str) -> bool {
        if self.username == username {
            return false;
        }
        self.username = username.to_string();
        self.clear_access();
        true
    }

    /// Store the granted token. `username` keeps the spelling the user
    /// typed; Flickr's canonical name only fills it when it is empty.
    pub fn apply_grant(&mut self, grant: &AccessGrant) {
        self.access_token = Some(grant.token.token.clone());
        self.access_token_secret = Some(grant.token.secret.clone());
        self.user_nsid = Some(grant.user_nsid.clone());
        if self.username.is_empty() {
            self.username = grant.username.clone();
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Validation("workers must be at least 1".into()));
        }
        if self.verifier_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "verifier_timeout_secs must be non-zero".into(),
            ));
        }
        if self.http_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "http_timeout_secs must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Load and validate. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        let mut file = create_private(path)?;
        file.write_all(content.as_bytes())?;
        tracing::debug!(path = %path.display(), "config saved");
        Ok(())
    }

    /// CLI override, else the configured value.
    pub fn effective_workers(&self, cli: Option<usize>) -> usize {
        cli.unwrap_or(self.workers)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn verifier_timeout(&self) -> Duration {
        Duration::from_secs(self.verifier_timeout_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// Open `path` for writing, owner-only from the moment it exists.
#[cfg(unix)]
fn create_private(path: &Path) -> io::Result<File> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
    let file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // `mode` only applies on creation.
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    Ok(file)
}

#[cfg(not(unix))]
fn create_private(path: &Path) -> io::Result<File> {
    File::create(path)
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CONFIG_FILENAME))
}

pub fn default_cache_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(crate::cache::CACHE_FILENAME))
}
