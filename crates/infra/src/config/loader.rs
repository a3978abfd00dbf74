//! Configuration loader
//!
//! Builds the Threads [`ProviderConfig`] from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If incomplete, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `THREADS_CLIENT_ID`: OAuth client ID (required)
//! - `THREADS_APP_SECRET`: Threads app secret (required)
//! - `THREADS_USE_PROXIED_URLS`: Route through the OAuth proxy (true/false)
//! - `THREADS_SCOPES`: Comma-separated scope list (optional)
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./threads-auth.{json,toml}` or `./config.{json,toml}` (current working
//!    directory)
//! 2. `threads-auth.{json,toml}` in the parent and grandparent directories
//! 3. `threads-auth.{json,toml}` next to the executable and its parents
//!
//! The generic `config.*` names are only honored in the working directory.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use threads_auth_common::auth::{EndpointSet, ProviderConfig};

const ENV_CLIENT_ID: &str = "THREADS_CLIENT_ID";
const ENV_APP_SECRET: &str = "THREADS_APP_SECRET";
const ENV_USE_PROXIED_URLS: &str = "THREADS_USE_PROXIED_URLS";
const ENV_SCOPES: &str = "THREADS_SCOPES";

const APP_CONFIG_FILE_NAMES: [&str; 2] = ["threads-auth.json", "threads-auth.toml"];
const GENERIC_CONFIG_FILE_NAMES: [&str; 2] = ["config.json", "config.toml"];

/// Error type for configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is not set
    #[error("missing required environment variable: {0}")]
    MissingVariable(String),

    /// A value is present but unusable
    #[error("invalid value for {key}: {message}")]
    InvalidValue {
        /// Variable or field name
        key: String,
        /// What is wrong with it
        message: String,
    },

    /// No config file at the given path or in any probed location
    #[error("config file not found: {0}")]
    NotFound(String),

    /// The config file exists but could not be read
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// File path
        path: String,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The config file is not valid JSON/TOML for the expected shape
    #[error("invalid {format} config: {message}")]
    Parse {
        /// `json` or `toml`
        format: &'static str,
        /// Parser message
        message: String,
    },

    /// The file extension is neither `json` nor `toml`
    #[error("unsupported config format: {0}")]
    UnsupportedFormat(String),

    /// A built-in endpoint URL failed to parse
    #[error("invalid endpoint URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Shape of the on-disk configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileConfig {
    /// OAuth client ID
    pub client_id: String,

    /// Threads app secret
    #[serde(alias = "client_secret")]
    pub app_secret: String,

    /// Scope list; defaults to the Threads scopes
    #[serde(default)]
    pub scopes: Option<Vec<String>>,

    /// Route through the OAuth proxy instead of the provider
    #[serde(default)]
    pub use_proxied_urls: bool,
}

impl FileConfig {
    /// Resolve into a provider configuration.
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidValue` for blank credentials or an empty
    /// scope list.
    pub fn into_provider_config(self) -> Result<ProviderConfig, ConfigError> {
        build_provider_config(self.client_id, self.app_secret, self.scopes, self.use_proxied_urls)
    }
}

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If any required
/// variables are missing, falls back to loading from a config file.
///
/// # Errors
/// Returns `ConfigError` if configuration cannot be loaded from either
/// source.
pub fn load() -> Result<ProviderConfig, ConfigError> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(ConfigError::MissingVariable(key)) => {
            tracing::debug!(missing = %key, "Environment incomplete, trying config file");
            load_from_file(None)
        }
        Err(e) => Err(e),
    }
}

/// Load configuration from environment variables
///
/// # Errors
/// Returns `ConfigError::MissingVariable` if the client ID or app secret is
/// unset, `ConfigError::InvalidValue` for blank values.
pub fn load_from_env() -> Result<ProviderConfig, ConfigError> {
    let client_id = env_var(ENV_CLIENT_ID)?;
    let app_secret = env_var(ENV_APP_SECRET)?;
    let scopes = std::env::var(ENV_SCOPES).ok().map(|raw| {
        raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect()
    });
    let use_proxied_urls = env_bool(ENV_USE_PROXIED_URLS, false);

    build_provider_config(client_id, app_secret, scopes, use_proxied_urls)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
///
/// # Errors
/// Returns `ConfigError` if the file is missing, unreadable or invalid.
pub fn load_from_file(path: Option<PathBuf>) -> Result<ProviderConfig, ConfigError> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ConfigError::NotFound(p.display().to_string()));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            ConfigError::NotFound("no config file in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path).map_err(|source| ConfigError::Read {
        path: config_path.display().to_string(),
        source,
    })?;

    parse_config(&contents, &config_path)?.into_provider_config()
}

/// Parse file contents; format is detected by extension.
///
/// # Errors
/// Returns `ConfigError::Parse` or `ConfigError::UnsupportedFormat`.
pub fn parse_config(contents: &str, path: &Path) -> Result<FileConfig, ConfigError> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| ConfigError::Parse { format: "toml", message: e.to_string() }),
        "json" => serde_json::from_str(contents)
            .map_err(|e| ConfigError::Parse { format: "json", message: e.to_string() }),
        other => Err(ConfigError::UnsupportedFormat(other.to_string())),
    }
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
#[must_use]
pub fn probe_config_paths() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok();
    let exe_dir = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf));
    probe_config_in(cwd.as_deref(), exe_dir.as_deref())
}

fn probe_config_in(cwd: Option<&Path>, exe_dir: Option<&Path>) -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(cwd) = cwd {
        candidates.extend(APP_CONFIG_FILE_NAMES.iter().map(|name| cwd.join(name)));
        candidates.extend(GENERIC_CONFIG_FILE_NAMES.iter().map(|name| cwd.join(name)));
        for ancestor in [cwd.join(".."), cwd.join("../..")] {
            candidates.extend(APP_CONFIG_FILE_NAMES.iter().map(|name| ancestor.join(name)));
        }
    }

    if let Some(exe_dir) = exe_dir {
        for root in [exe_dir.to_path_buf(), exe_dir.join(".."), exe_dir.join("../..")] {
            candidates.extend(APP_CONFIG_FILE_NAMES.iter().map(|name| root.join(name)));
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

fn build_provider_config(
    client_id: String,
    app_secret: String,
    scopes: Option<Vec<String>>,
    use_proxied_urls: bool,
) -> Result<ProviderConfig, ConfigError> {
    require_non_blank("client_id", &client_id)?;
    require_non_blank("app_secret", &app_secret)?;

    let set = if use_proxied_urls { EndpointSet::Proxied } else { EndpointSet::Direct };
    let config = ProviderConfig::threads(client_id, app_secret, set)?;

    match scopes {
        Some(scopes) if scopes.is_empty() => Err(ConfigError::InvalidValue {
            key: "scopes".to_string(),
            message: "scope list is empty".to_string(),
        }),
        Some(scopes) => Ok(config.with_scopes(scopes)),
        None => Ok(config),
    }
}

fn require_non_blank(key: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "must not be blank".to_string(),
        });
    }
    Ok(())
}

/// Get required environment variable
fn env_var(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingVariable(key.to_string()))
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
