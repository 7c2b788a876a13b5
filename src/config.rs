use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::core::{PromptLimits, ScoringWeights};

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub gemini: GeminiSettings,
    #[serde(default)]
    pub matching: MatchingSettings,
    #[serde(default)]
    pub scoring: ScoringSettings,
    #[serde(default)]
    pub catalog: CatalogSettings,
    #[serde(default)]
    pub retention: RetentionSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub workers: Option<usize>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: None,
        }
    }
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8000 }

/// Without a URL the service runs on the in-memory store
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiSettings {
    pub api_key: Option<String>,
    #[serde(default = "default_gemini_model")]
    pub model: String,
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_gemini_model(),
            base_url: default_gemini_base_url(),
            temperature: default_temperature(),
        }
    }
}

fn default_gemini_model() -> String { "gemini-1.5-flash".to_string() }
fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_temperature() -> f32 { 0.2 }

#[derive(Debug, Clone, Deserialize)]
pub struct MatchingSettings {
    #[serde(default = "default_remote_timeout_secs")]
    pub remote_timeout_secs: u64,
    #[serde(default = "default_max_prompt_offers")]
    pub max_prompt_offers: usize,
    #[serde(default = "default_max_prompt_text_chars")]
    pub max_prompt_text_chars: usize,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            remote_timeout_secs: default_remote_timeout_secs(),
            max_prompt_offers: default_max_prompt_offers(),
            max_prompt_text_chars: default_max_prompt_text_chars(),
        }
    }
}

impl MatchingSettings {
    pub fn remote_budget(&self) -> Duration {
        Duration::from_secs(self.remote_timeout_secs)
    }

    pub fn prompt_limits(&self) -> PromptLimits {
        PromptLimits {
            max_offers: self.max_prompt_offers,
            max_text_chars: self.max_prompt_text_chars,
        }
    }
}

fn default_remote_timeout_secs() -> u64 { 10 }
fn default_max_prompt_offers() -> usize { 200 }
fn default_max_prompt_text_chars() -> usize { 400 }

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScoringSettings {
    #[serde(default)]
    pub weights: WeightsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeightsConfig {
    #[serde(default = "default_base_weight")]
    pub base: f64,
    #[serde(default = "default_social_care_weight")]
    pub social_care: f64,
    #[serde(default = "default_major_weight")]
    pub major_match: f64,
    #[serde(default = "default_deadline_weight")]
    pub deadline: f64,
    #[serde(default = "default_high_amount_weight")]
    pub high_amount: f64,
    #[serde(default = "default_high_amount_threshold")]
    pub high_amount_threshold: i64,
    #[serde(default = "default_deadline_window_days")]
    pub deadline_window_days: i64,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            base: default_base_weight(),
            social_care: default_social_care_weight(),
            major_match: default_major_weight(),
            deadline: default_deadline_weight(),
            high_amount: default_high_amount_weight(),
            high_amount_threshold: default_high_amount_threshold(),
            deadline_window_days: default_deadline_window_days(),
        }
    }
}

impl From<&WeightsConfig> for ScoringWeights {
    fn from(w: &WeightsConfig) -> Self {
        Self {
            base: w.base,
            social_care: w.social_care,
            major_match: w.major_match,
            deadline: w.deadline,
            high_amount: w.high_amount,
            high_amount_threshold: w.high_amount_threshold,
            deadline_window_days: w.deadline_window_days,
        }
    }
}

fn default_base_weight() -> f64 { 0.1 }
fn default_social_care_weight() -> f64 { 0.5 }
fn default_major_weight() -> f64 { 0.2 }
fn default_deadline_weight() -> f64 { 0.1 }
fn default_high_amount_weight() -> f64 { 0.3 }
fn default_high_amount_threshold() -> i64 { 500_000 }
fn default_deadline_window_days() -> i64 { 30 }

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogSettings {
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// JSON array of offers loaded at startup
    pub seed_path: Option<String>,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl_secs(),
            seed_path: None,
        }
    }
}

fn default_cache_ttl_secs() -> u64 { 60 }

#[derive(Debug, Clone, Deserialize)]
pub struct RetentionSettings {
    #[serde(default = "default_retention_days")]
    pub days: i64,
    #[serde(default = "default_retention_interval_secs")]
    pub interval_secs: u64,
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self {
            days: default_retention_days(),
            interval_secs: default_retention_interval_secs(),
        }
    }
}

impl RetentionSettings {
    /// Sweep period, at least one second
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

fn default_retention_days() -> i64 { 90 }
fn default_retention_interval_secs() -> u64 { 86_400 }

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
    /// `pretty` selects multi-line human output, anything else the compact default
    pub fn is_pretty(&self) -> bool {
        self.format.eq_ignore_ascii_case("pretty")
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration files (config/default.toml, config/local.toml)
    /// 3. Environment variables (prefixed with HOPE_)
    /// 4. DATABASE_URL, GEMINI_API_KEY, LOG_LEVEL and LOG_FORMAT
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., HOPE__SERVER__PORT -> server.port
            .add_source(
                Environment::with_prefix("HOPE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        apply_env_overrides(settings)?.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("HOPE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        apply_env_overrides(settings)?.try_deserialize()
    }
}

/// Apply the conventional unprefixed variables on top of everything else
fn apply_env_overrides(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let mut builder = Config::builder().add_source(settings);

    if let Ok(url) = env::var("DATABASE_URL") {
        builder = builder.set_override("database.url", url)?;
    }
    if let Ok(key) = env::var("GEMINI_API_KEY") {
        builder = builder.set_override("gemini.api_key", key)?;
    }
    if let Ok(level) = env::var("LOG_LEVEL") {
        builder = builder.set_override("logging.level", level)?;
    }
    if let Ok(format) = env::var("LOG_FORMAT") {
        builder = builder.set_override("logging.format", format)?;
    }

    builder.build()
}
