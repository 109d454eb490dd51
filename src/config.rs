use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::core::{EloModel, PairingPolicy, RetryPolicy, DEFAULT_K_FACTOR};
use crate::core::selector::{DEFAULT_EXHAUSTIVE_THRESHOLD, DEFAULT_MAX_RANDOM_ATTEMPTS};
use crate::models::{DeletionPolicy, BASELINE_RATING};

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub rating: RatingSettings,
    #[serde(default)]
    pub pairing: PairingSettings,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub items: ItemSettings,
    #[serde(default)]
    pub leaderboard: LeaderboardSettings,
    #[serde(default)]
    pub seed: SeedSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Which store backs the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default)]
    pub url: String,
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub acquire_timeout_secs: Option<u64>,
    pub idle_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheSettings {
    /// Leave unset to run with the in-process cache only
    pub redis_url: Option<String>,
    pub ttl_secs: Option<u64>,
    pub l1_cache_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RatingSettings {
    #[serde(default = "default_k_factor")]
    pub k_factor: f64,
    #[serde(default = "default_baseline")]
    pub baseline: f64,
}

impl Default for RatingSettings {
    fn default() -> Self {
        Self {
            k_factor: default_k_factor(),
            baseline: default_baseline(),
        }
    }
}

impl RatingSettings {
    pub fn model(&self) -> EloModel {
        EloModel::new(self.k_factor)
    }
}

fn default_k_factor() -> f64 { DEFAULT_K_FACTOR }
fn default_baseline() -> f64 { BASELINE_RATING }

#[derive(Debug, Clone, Deserialize)]
pub struct PairingSettings {
    /// Whether voters may be shown their own items
    #[serde(default = "default_true")]
    pub include_own_items: bool,
    #[serde(default = "default_exhaustive_threshold")]
    pub exhaustive_threshold: usize,
    #[serde(default = "default_max_random_attempts")]
    pub max_random_attempts: usize,
}

impl Default for PairingSettings {
    fn default() -> Self {
        Self {
            include_own_items: true,
            exhaustive_threshold: default_exhaustive_threshold(),
            max_random_attempts: default_max_random_attempts(),
        }
    }
}

impl PairingSettings {
    pub fn policy(&self) -> PairingPolicy {
        PairingPolicy {
            include_own_items: self.include_own_items,
            exhaustive_threshold: self.exhaustive_threshold,
            max_random_attempts: self.max_random_attempts,
        }
    }
}

fn default_true() -> bool { true }
fn default_exhaustive_threshold() -> usize { DEFAULT_EXHAUSTIVE_THRESHOLD }
fn default_max_random_attempts() -> usize { DEFAULT_MAX_RANDOM_ATTEMPTS }

#[derive(Debug, Clone, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.base_delay_ms),
        }
    }
}

fn default_max_attempts() -> u32 { 3 }
fn default_base_delay_ms() -> u64 { 50 }

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemSettings {
    #[serde(default)]
    pub deletion_policy: DeletionPolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeaderboardSettings {
    #[serde(default = "default_leaderboard_limit")]
    pub default_limit: usize,
    #[serde(default = "default_leaderboard_max")]
    pub max_limit: usize,
}

impl Default for LeaderboardSettings {
    fn default() -> Self {
        Self {
            default_limit: default_leaderboard_limit(),
            max_limit: default_leaderboard_max(),
        }
    }
}

impl LeaderboardSettings {
    /// Clamp a requested page size to `1..=max_limit`
    pub fn clamp(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_limit)
            .clamp(1, self.max_limit.max(1))
    }
}

fn default_leaderboard_limit() -> usize { 5 }
fn default_leaderboard_max() -> usize { 100 }

/// Showcase items created when the store starts empty
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedSettings {
    #[serde(default)]
    pub titles: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl LoggingSettings {
    /// `LOG_LEVEL` / `LOG_FORMAT` take precedence over the config files
    pub fn with_env_overrides(mut self, level: Option<String>, format: Option<String>) -> Self {
        if let Some(level) = level.filter(|l| !l.trim().is_empty()) {
            self.level = level;
        }
        if let Some(format) = format.filter(|f| !f.trim().is_empty()) {
            self.format = format;
        }
        self
    }

    pub fn is_pretty(&self) -> bool {
        self.format.eq_ignore_ascii_case("pretty")
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "compact".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Local overrides (config/local.toml)
    /// 4. Environment variables (prefixed with DESKRANK__)
    /// 5. `DATABASE_URL` and `REDIS_URL`
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., DESKRANK__SERVER__PORT -> server.port
            .add_source(
                Environment::with_prefix("DESKRANK")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = apply_url_overrides(settings)?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("DESKRANK")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = settings.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values that would corrupt ratings
    pub fn validate(&self) -> Result<(), ConfigError> {
        let rating = &self.rating;
        if !rating.k_factor.is_finite() || rating.k_factor <= 0.0 {
            return Err(ConfigError::Message(format!(
                "rating.k_factor must be a positive finite number, got {}",
                rating.k_factor
            )));
        }
        if !rating.baseline.is_finite() {
            return Err(ConfigError::Message(format!(
                "rating.baseline must be finite, got {}",
                rating.baseline
            )));
        }
        Ok(())
    }
}

/// Conventional connection URL variables win over the config files
fn apply_url_overrides(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let mut builder = Config::builder().add_source(settings);

    if let Ok(database_url) = env::var("DATABASE_URL") {
        builder = builder.set_override("database.url", database_url)?;
    }
    if let Ok(redis_url) = env::var("REDIS_URL") {
        builder = builder.set_override("cache.redis_url", redis_url)?;
    }

    builder.build()
}
