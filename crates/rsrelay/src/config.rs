use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tokio::fs;

use crate::build_info;

// ============================================================================
// Config (root)
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_saphyr::Error),

    #[error("environment variable '{0}' is not set")]
    MissingEnvVar(String),

    #[error("unclosed variable reference '${{' (missing '}}')")]
    UnclosedVarReference,
}

impl Config {
    /// Load the config file, falling back to defaults when it does not exist.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = match fs::read_to_string(path.as_ref()).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(ConfigError::Io(e)),
        };
        let expanded = expand_env_vars(&contents)?;
        Ok(serde_saphyr::from_str(&expanded)?)
    }
}

/// Default config file name.
pub const DEFAULT_CONFIG_FILE: &str = "rsrelay.yaml";

// ============================================================================
// Private Helpers (Serde Defaults)
// ============================================================================

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_server_request_timeout() -> u64 {
    60
}

fn default_endpoint() -> String {
    "http://127.0.0.1:8000/api/v1".to_string()
}

fn default_auth_cookie_name() -> String {
    "Authorization".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_remote_request_timeout() -> u64 {
    10
}

fn default_download_timeout() -> u64 {
    3600
}

fn default_rows() -> u64 {
    10
}

fn default_autocomplete_min_chars() -> usize {
    2
}

fn default_highlight_open() -> String {
    "<em>".to_string()
}

fn default_highlight_close() -> String {
    "</em>".to_string()
}

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand `${VAR}`, `${VAR:-default}` and `$$` references in a string.
///
/// A `$` not followed by `{` or `$` is kept literally. Nested references in
/// defaults are not expanded.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(tail) = after.strip_prefix('$') {
            out.push('$');
            rest = tail;
        } else if let Some(body) = after.strip_prefix('{') {
            let end = body.find('}').ok_or(ConfigError::UnclosedVarReference)?;
            out.push_str(&resolve_var(&body[..end])?);
            rest = &body[end + 1..];
        } else {
            out.push('$');
            rest = after;
        }
    }

    out.push_str(rest);
    Ok(out)
}

fn resolve_var(reference: &str) -> Result<String, ConfigError> {
    let (name, default) = match reference.split_once(":-") {
        Some((name, default)) => (name, Some(default)),
        None => (reference, None),
    };

    match (std::env::var(name), default) {
        (Ok(value), _) => Ok(value),
        (Err(_), Some(default)) => Ok(default.to_string()),
        (Err(_), None) => Err(ConfigError::MissingEnvVar(name.to_string())),
    }
}

// ============================================================================
// ServerConfig
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Timeout for non-streaming caller requests.
    #[serde(default = "default_server_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Optional API token. If set, `/api/v1` requires `Authorization: Bearer <token>`.
    /// If not set, only loopback peers are accepted.
    #[serde(default)]
    pub api_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_seconds: default_server_request_timeout(),
            api_token: None,
        }
    }
}

// ============================================================================
// RemoteConfig
// ============================================================================

/// The remote repository API this relay acts against.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the remote API, e.g. `https://rs.example.org/api/v1`.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Name of the cookie carrying the auth token.
    #[serde(default = "default_auth_cookie_name")]
    pub auth_cookie_name: String,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    #[serde(default = "default_remote_request_timeout")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_download_timeout")]
    pub download_timeout_seconds: u64,
}

impl RemoteConfig {
    /// Endpoint with any trailing slash removed.
    pub fn base_url(&self) -> &str {
        self.endpoint.trim_end_matches('/')
    }

    pub fn user_agent(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(build_info::default_user_agent)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_seconds)
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            auth_cookie_name: default_auth_cookie_name(),
            user_agent: None,
            connect_timeout_seconds: default_connect_timeout(),
            request_timeout_seconds: default_remote_request_timeout(),
            download_timeout_seconds: default_download_timeout(),
        }
    }
}

// ============================================================================
// SearchConfig
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Page size used when the caller does not pass `rows`.
    #[serde(default = "default_rows")]
    pub default_rows: u64,
    /// Autocomplete terms shorter than this return no suggestions.
    #[serde(default = "default_autocomplete_min_chars")]
    pub autocomplete_min_chars: usize,
    #[serde(default = "default_highlight_open")]
    pub highlight_open: String,
    #[serde(default = "default_highlight_close")]
    pub highlight_close: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_rows: default_rows(),
            autocomplete_min_chars: default_autocomplete_min_chars(),
            highlight_open: default_highlight_open(),
            highlight_close: default_highlight_close(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
