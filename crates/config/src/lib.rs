#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for plugfetch
//!
//! This crate handles loading and merging configuration from:
//! - Default values (hard-coded)
//! - Configuration file (~/.config/plugfetch/config.toml)
//! - Environment variables (`PLUGFETCH_*`)
//! - CLI flags (applied by the binary)

use plugfetch_errors::{ConfigError, Error};
use plugfetch_types::{ArtifactKind, ArtifactName, ArtifactSet, ArtifactSpec};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub layout: LayoutConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub paths: PathConfig,
}

/// Where releases are published
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Prefix of every artifact locator; `<base_url><version>/<artifact>`
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

/// Artifacts making up one release
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    #[serde(default = "default_artifacts")]
    pub artifacts: Vec<ArtifactSpec>,
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_timeout")]
    pub timeout: u64, // seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64, // seconds
    #[serde(default = "default_chunk_timeout")]
    pub chunk_timeout: u64, // seconds
    #[serde(default = "default_max_artifact_size")]
    pub max_artifact_size: u64, // bytes
    #[serde(default)]
    pub user_agent: Option<String>,
}

/// Path configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PathConfig {
    /// Final install directory
    pub destination: Option<PathBuf>,
    /// Parent of per-attempt staging directories (system temp dir if unset)
    pub staging_dir: Option<PathBuf>,
}

// Default implementations

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            artifacts: default_artifacts(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            connect_timeout: default_connect_timeout(),
            chunk_timeout: default_chunk_timeout(),
            max_artifact_size: default_max_artifact_size(),
            user_agent: None,
        }
    }
}

// Default value functions for serde
fn default_base_url() -> String {
    "https://plugins.plugfetch.dev/releases/".to_string()
}

fn default_artifacts() -> Vec<ArtifactSpec> {
    let spec = |name: &str, kind, signed| {
        ArtifactName::new(name).map(|name| ArtifactSpec { name, kind, signed })
    };
    // Static names; validation cannot fail for them.
    [
        spec("plugin-host", ArtifactKind::Executable, true),
        spec("libplugin.so.1", ArtifactKind::Library, true),
    ]
    .into_iter()
    .flatten()
    .collect()
}

fn default_timeout() -> u64 {
    300 // 5 minutes
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_chunk_timeout() -> u64 {
    30
}

fn default_max_artifact_size() -> u64 {
    512 * 1024 * 1024
}

impl SourceConfig {
    /// Base URL guaranteed to end with a `/`
    #[must_use]
    pub fn normalized_base_url(&self) -> String {
        if self.base_url.ends_with('/') {
            self.base_url.clone()
        } else {
            format!("{}/", self.base_url)
        }
    }
}

impl NetworkConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    #[must_use]
    pub fn chunk_timeout(&self) -> Duration {
        Duration::from_secs(self.chunk_timeout)
    }
}

impl Config {
    /// Get the default config file path
    ///
    /// # Errors
    ///
    /// Returns an error if the system config directory cannot be determined.
    pub fn default_path() -> Result<PathBuf, Error> {
        let config_dir = dirs::config_dir().ok_or_else(|| ConfigError::NotFound {
            path: "config directory".to_string(),
        })?;
        Ok(config_dir.join("plugfetch").join("config.toml"))
    }

    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the file contents
    /// contain invalid TOML syntax that cannot be parsed.
    pub async fn load_from_file(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|_| ConfigError::NotFound {
                path: path.display().to_string(),
            })?;

        Self::from_toml(&contents)
    }

    /// Parse configuration from a TOML document
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid TOML or has values of
    /// the wrong type.
    pub fn from_toml(contents: &str) -> Result<Self, Error> {
        toml::from_str(contents)
            .map_err(|e| ConfigError::ParseError {
                message: e.to_string(),
            })
            .map_err(Into::into)
    }

    /// Load configuration with fallback to defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read
    /// or contains invalid TOML syntax.
    pub async fn load() -> Result<Self, Error> {
        let config_path = Self::default_path()?;

        if config_path.exists() {
            tracing::debug!(path = %config_path.display(), "loading configuration");
            Self::load_from_file(&config_path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from an optional path or use default
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self, Error> {
        match path {
            Some(config_path) => Self::load_from_file(config_path).await,
            None => Self::load().await,
        }
    }

    /// Merge with environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables contain invalid values
    /// that cannot be parsed into the expected types.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        self.merge_env_from(|key| std::env::var(key).ok())
    }

    /// Merge values from an arbitrary variable lookup
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable does not parse.
    pub fn merge_env_from<F>(&mut self, lookup: F) -> Result<(), Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        // PLUGFETCH_BASE_URL
        if let Some(base_url) = lookup("PLUGFETCH_BASE_URL") {
            self.source.base_url = base_url;
        }

        // PLUGFETCH_DESTINATION
        if let Some(destination) = lookup("PLUGFETCH_DESTINATION") {
            self.paths.destination = Some(PathBuf::from(destination));
        }

        // PLUGFETCH_STAGING_DIR
        if let Some(staging) = lookup("PLUGFETCH_STAGING_DIR") {
            self.paths.staging_dir = Some(PathBuf::from(staging));
        }

        // PLUGFETCH_TIMEOUT
        if let Some(timeout) = lookup("PLUGFETCH_TIMEOUT") {
            self.network.timeout = timeout.parse().map_err(|_| ConfigError::InvalidValue {
                field: "PLUGFETCH_TIMEOUT".to_string(),
                value: timeout,
            })?;
        }

        Ok(())
    }

    /// Check values that serde alone cannot reject
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is not an absolute http(s) URL, the
    /// layout does not form a valid artifact set, or a timeout is zero.
    pub fn validate(&self) -> Result<(), Error> {
        let base = url::Url::parse(&self.source.normalized_base_url()).map_err(|e| {
            ConfigError::InvalidValue {
                field: "source.base_url".to_string(),
                value: format!("{} ({e})", self.source.base_url),
            }
        })?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidValue {
                field: "source.base_url".to_string(),
                value: self.source.base_url.clone(),
            }
            .into());
        }

        if self.network.timeout == 0 || self.network.chunk_timeout == 0 {
            return Err(ConfigError::Invalid {
                message: "network timeouts must be greater than zero".to_string(),
            }
            .into());
        }

        self.artifact_set().map(|_| ())
    }

    /// The artifact set every install attempt fetches
    ///
    /// # Errors
    ///
    /// Returns an error if the configured layout is empty or inconsistent.
    pub fn artifact_set(&self) -> Result<ArtifactSet, Error> {
        ArtifactSet::from_layout(&self.layout.artifacts)
    }

    /// Destination directory, if configured
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingField` when no destination is set.
    pub fn destination(&self) -> Result<PathBuf, Error> {
        self.paths.destination.clone().ok_or_else(|| {
            ConfigError::MissingField {
                field: "destination".to_string(),
            }
            .into()
        })
    }
}
