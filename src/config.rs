//! Configuration types for pokeapi-pipeline

use crate::error::{Error, Result};
use crate::types::{FetchMode, PipelineVariant};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upper bound for `fetch.retry.backoff_multiplier`
pub const MAX_BACKOFF_MULTIPLIER: f64 = 10.0;

/// Upper bound for `fetch.retry.max_delay`
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(60 * 60);

/// Main configuration for [`Pipeline`](crate::Pipeline)
///
/// Every field has a default, so an empty TOML file (or `Config::default()`)
/// runs against the public PokeAPI with a one-day on-disk cache.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Pipeline shape and sub-resource fetch behavior
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Response cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Output file settings
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read {}: {}", path.display(), e),
            key: None,
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text and validate it
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(|e| Error::Config {
            message: e.to_string(),
            key: None,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check settings that serde defaults cannot guarantee
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.api.base_url).map_err(|e| Error::Config {
            message: format!("invalid base URL '{}': {}", self.api.base_url, e),
            key: Some("api.base_url".to_string()),
        })?;

        if self.api.request_timeout.is_zero() {
            return Err(Error::Config {
                message: "request timeout must be greater than zero".to_string(),
                key: Some("api.request_timeout".to_string()),
            });
        }

        if self.fetch.max_concurrent == Some(0) {
            return Err(Error::Config {
                message: "max_concurrent must be at least 1 when set".to_string(),
                key: Some("fetch.max_concurrent".to_string()),
            });
        }

        if self.fetch.max_concurrent_keys == 0 {
            return Err(Error::Config {
                message: "max_concurrent_keys must be at least 1".to_string(),
                key: Some("fetch.max_concurrent_keys".to_string()),
            });
        }

        let retry = &self.fetch.retry;
        if !retry.backoff_multiplier.is_finite()
            || !(1.0..=MAX_BACKOFF_MULTIPLIER).contains(&retry.backoff_multiplier)
        {
            return Err(Error::Config {
                message: format!(
                    "backoff_multiplier must be between 1.0 and {}, got {}",
                    MAX_BACKOFF_MULTIPLIER, retry.backoff_multiplier
                ),
                key: Some("fetch.retry.backoff_multiplier".to_string()),
            });
        }

        if retry.max_delay.is_zero() || retry.max_delay > MAX_RETRY_DELAY {
            return Err(Error::Config {
                message: format!(
                    "max_delay must be greater than zero and at most {}s",
                    MAX_RETRY_DELAY.as_secs()
                ),
                key: Some("fetch.retry.max_delay".to_string()),
            });
        }

        if retry.initial_delay > retry.max_delay {
            return Err(Error::Config {
                message: "initial_delay must not exceed max_delay".to_string(),
                key: Some("fetch.retry.initial_delay".to_string()),
            });
        }

        Ok(())
    }
}

/// Remote API configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL; type payloads are fetched from `{base_url}/type/{key}`
    /// (default: "https://pokeapi.co/api/v2")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout (default: 30 seconds)
    ///
    /// A timed-out request is a remote fetch failure and is eligible for retry
    /// in concurrent mode.
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout: default_request_timeout(),
        }
    }
}

/// Pipeline shape and sub-resource fetch configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// What gets persisted per key (default: forms)
    #[serde(default)]
    pub variant: PipelineVariant,

    /// Sub-resource execution mode (default: concurrent)
    #[serde(default)]
    pub mode: FetchMode,

    /// Upper bound on in-flight sub-resource requests in concurrent mode
    /// (None = dispatch every URL at once)
    #[serde(default)]
    pub max_concurrent: Option<usize>,

    /// Number of keys processed at once by a batch run (default: 4)
    #[serde(default = "default_max_concurrent_keys")]
    pub max_concurrent_keys: usize,

    /// Retry policy for sub-resource fetches in concurrent mode
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            variant: PipelineVariant::default(),
            mode: FetchMode::default(),
            max_concurrent: None,
            max_concurrent_keys: default_max_concurrent_keys(),
            retry: RetryConfig::default(),
        }
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt (default: 1)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Where cache entries live
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackendKind {
    /// Process-local map, lost on exit
    Memory,
    /// One JSON file per entry under `CacheConfig::dir`, shared across runs (default)
    #[default]
    Disk,
}

/// Response cache configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Enable caching (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Storage backend (default: disk)
    #[serde(default)]
    pub backend: CacheBackendKind,

    /// Cache directory for the disk backend (default: ".cache/pokeapi-pipeline")
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,

    /// Entry time-to-live (default: 1 day)
    #[serde(default = "default_cache_ttl", with = "duration_serde")]
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: CacheBackendKind::default(),
            dir: default_cache_dir(),
            ttl: default_cache_ttl(),
        }
    }
}

/// Output file configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving `type_{key}.txt` files (default: "pokemon_data")
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_base_url() -> String {
    "https://pokeapi.co/api/v2".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_concurrent_keys() -> usize {
    4
}

fn default_max_attempts() -> u32 {
    1
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".cache/pokeapi-pipeline")
}

fn default_cache_ttl() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("pokemon_data")
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
