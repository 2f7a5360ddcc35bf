// Configuration module

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::constants::{
    DEFAULT_ADDRESS, DEFAULT_CACHE_MAX_AGE_SECS, DEFAULT_PORT, DEFAULT_REDIRECT_STATUS_CODE,
    DEFAULT_THREADS, DEFAULT_UPSTREAM_TIMEOUT_SECS, REDIRECT_STATUS_CODES,
};
use crate::error::ProxyError;
use crate::format::ImageFormat;
use crate::proxy::upstream::UpstreamPeerConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub routing: RoutingConfig,
}

/// Listener configuration for the Pingora server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to (e.g., "0.0.0.0")
    #[serde(default = "default_address")]
    pub address: String,

    /// TCP port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of worker threads
    #[serde(default = "default_threads")]
    pub threads: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            threads: default_threads(),
        }
    }
}

/// Operating mode for the request-routing pipeline.
///
/// Proxy mode fetches the resource itself and streams it back; redirect
/// mode computes a target URL and sends the client there with a 3xx.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RoutingMode {
    #[default]
    Proxy,
    Redirect,
}

/// Routing configuration: where image traffic goes and how.
///
/// Resolved once at startup and treated as immutable for the lifetime
/// of the process; the whole pipeline is a pure function of
/// (request, config).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Operating mode (default: proxy)
    #[serde(default)]
    pub mode: RoutingMode,

    /// Origin base URL requests are rewritten to (required, absolute)
    #[serde(default)]
    pub target_domain: String,

    /// Image-optimization backend base URL (required, absolute)
    #[serde(default)]
    pub converter_base_url: String,

    /// API key sent to the optimizer as X-API-Key; empty means "do not send"
    #[serde(default)]
    pub api_key: String,

    /// Supported output formats in priority order (redirect mode)
    #[serde(default = "default_supported_formats")]
    pub supported_formats: Vec<ImageFormat>,

    /// Client-facing Cache-Control max-age and CDN cache TTL, in seconds
    #[serde(default = "default_cache_max_age")]
    pub cache_max_age_seconds: u64,

    /// Status code used for redirect-mode responses
    #[serde(default = "default_redirect_status_code")]
    pub redirect_status_code: u16,

    /// Upstream connect/read/write timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

fn default_address() -> String {
    DEFAULT_ADDRESS.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_threads() -> usize {
    DEFAULT_THREADS
}

fn default_supported_formats() -> Vec<ImageFormat> {
    vec![ImageFormat::Avif, ImageFormat::Webp]
}

fn default_cache_max_age() -> u64 {
    DEFAULT_CACHE_MAX_AGE_SECS
}

fn default_redirect_status_code() -> u16 {
    DEFAULT_REDIRECT_STATUS_CODE
}

fn default_timeout() -> u64 {
    DEFAULT_UPSTREAM_TIMEOUT_SECS
}

impl Config {
    pub fn from_yaml_with_env(yaml: &str) -> Result<Self, ProxyError> {
        // Replace ${VAR_NAME} with environment variable values
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
            .map_err(|e| ProxyError::Internal(e.to_string()))?;

        // First, check that all referenced environment variables exist
        for caps in re.captures_iter(yaml) {
            let var_name = &caps[1];
            std::env::var(var_name).map_err(|_| {
                ProxyError::Config(format!(
                    "Environment variable '{}' is referenced but not set",
                    var_name
                ))
            })?;
        }

        // Now perform the substitution (we know all vars exist)
        let substituted = re.replace_all(yaml, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap() // Safe because we checked above
        });

        let config: Config =
            serde_yaml::from_str(&substituted).map_err(|e| ProxyError::Config(e.to_string()))?;

        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ProxyError> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| ProxyError::Config(format!("Failed to read config file: {}", e)))?;
        Self::from_yaml_with_env(&yaml)
    }

    /// Validate the whole configuration.
    ///
    /// Runs at startup and again per request before any upstream
    /// contact, so a misconfigured deployment surfaces as a
    /// distinguishable configuration error and never as a fetch against
    /// an empty base URL.
    pub fn validate(&self) -> Result<(), ProxyError> {
        if self.server.threads == 0 {
            return Err(ProxyError::Config(
                "server.threads must be greater than 0".to_string(),
            ));
        }
        self.routing.validate()
    }
}

impl RoutingConfig {
    pub fn validate(&self) -> Result<(), ProxyError> {
        if self.target_domain.trim().is_empty() {
            return Err(ProxyError::Config(
                "routing.target_domain is required and must not be empty".to_string(),
            ));
        }
        // Raises the configuration error before any network call
        UpstreamPeerConfig::from_base_url(&self.target_domain)?;

        if self.converter_base_url.trim().is_empty() {
            return Err(ProxyError::Config(
                "routing.converter_base_url is required and must not be empty".to_string(),
            ));
        }
        UpstreamPeerConfig::from_base_url(&self.converter_base_url)?;

        if self.supported_formats.is_empty() {
            return Err(ProxyError::Config(
                "routing.supported_formats must list at least one format".to_string(),
            ));
        }

        if !REDIRECT_STATUS_CODES.contains(&self.redirect_status_code) {
            return Err(ProxyError::Config(format!(
                "routing.redirect_status_code {} is not a redirect status code",
                self.redirect_status_code
            )));
        }

        if self.timeout == 0 {
            return Err(ProxyError::Config(
                "routing.timeout must be greater than 0 seconds".to_string(),
            ));
        }

        Ok(())
    }

    /// Whether a non-empty API key is configured for the optimizer.
    pub fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }
}
