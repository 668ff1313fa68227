use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

// =============================================================================
// Time-related constants
// =============================================================================

/// Lifetime of a discovery cache entry in seconds (5 minutes)
pub const DEFAULT_CACHE_TTL_SECS: u64 = 5 * 60;

/// Timeout for a single HTTP request in milliseconds (30 seconds)
pub const FETCH_TIMEOUT_MS: u64 = 30_000;

/// Attempts made for a request failing with a transient error
pub const RETRY_MAX_ATTEMPTS: u32 = 3;

/// Delay before the first retry in milliseconds; doubles on every attempt
pub const RETRY_BASE_DELAY_MS: u64 = 500;

/// Upper bound of random jitter added to each retry delay, as a fraction of it
pub const RETRY_JITTER: f64 = 0.5;

// =============================================================================
// Upstream constants
// =============================================================================

pub const GITHUB_API_URL: &str = "https://api.github.com";
pub const GITHUB_GRAPHQL_URL: &str = "https://api.github.com/graphql";
pub const GITHUB_URL: &str = "https://github.com";

/// User agent for API requests
pub const USER_AGENT: &str = concat!("release-resolver/", env!("CARGO_PKG_VERSION"));

/// User agent for the ref advertisement; the server picks the smart protocol for git clients
pub const GIT_USER_AGENT: &str = "git/2.45.0";

/// Page size for REST and GraphQL listings (the upstream maximum)
pub const PAGE_SIZE: usize = 100;

/// Maximum GraphQL pages fetched for a single listing
pub const GRAPHQL_MAX_PAGES: usize = 5;

/// Environment variables searched for an API token, in priority order
pub const TOKEN_ENV_VARS: &[&str] = &["GITHUB_TOKEN", "GH_TOKEN", "GITHUB_ACCESS_TOKEN"];

/// Versions listed in a "version not found" error before truncating
pub const NOT_FOUND_LISTED_VERSIONS: usize = 10;

/// Versions fetched to enrich a "version not found" error
pub const NOT_FOUND_DISCOVERY_LIMIT: usize = 20;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Resolver configuration structure
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ResolverConfig {
    pub cache: CacheConfig,
    pub github: GitHubConfig,
    pub retry: RetryConfig,
    /// Refuse degraded resolutions that would come without a checksum
    pub strict_checksum: bool,
}

impl ResolverConfig {
    /// Load configuration from a JSON file. Missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Cache-related configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheConfig {
    /// Discovery cache TTL in seconds
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_CACHE_TTL_SECS,
        }
    }
}

/// GitHub endpoints and credentials
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct GitHubConfig {
    pub api_url: String,
    pub graphql_url: String,
    /// Base URL for git ref advertisements and release downloads
    pub web_url: String,
    pub token_env_vars: Vec<String>,
    pub timeout_ms: u64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: GITHUB_API_URL.to_string(),
            graphql_url: GITHUB_GRAPHQL_URL.to_string(),
            web_url: GITHUB_URL.to_string(),
            token_env_vars: TOKEN_ENV_VARS.iter().map(|s| s.to_string()).collect(),
            timeout_ms: FETCH_TIMEOUT_MS,
        }
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: RETRY_MAX_ATTEMPTS,
            base_delay_ms: RETRY_BASE_DELAY_MS,
            jitter: RETRY_JITTER,
        }
    }
}

/// Returns the path to the data directory for release-resolver.
/// Uses $XDG_DATA_HOME/release-resolver if XDG_DATA_HOME is set,
/// otherwise falls back to ~/.local/share/release-resolver,
/// or ./release-resolver if neither is available.
pub fn data_dir() -> PathBuf {
    data_dir_with_env(std::env::var("XDG_DATA_HOME").ok(), dirs::home_dir())
}

/// Returns the path to the log file.
pub fn log_path() -> PathBuf {
    data_dir().join("release-resolver.log")
}

fn data_dir_with_env(xdg_data_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    let data_dir = xdg_data_home
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));

    data_dir.join("release-resolver")
}
