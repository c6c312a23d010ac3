use crate::pricing::ModelTier;
use crate::selector::OptimizationLevel;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// "text" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Cost optimization, budget and model selection options
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OptimizerConfig {
    #[serde(default)]
    pub optimization_level: OptimizationLevel,

    #[serde(default = "default_daily_budget")]
    pub daily_budget_usd: f64,

    #[serde(default = "default_monthly_budget")]
    pub monthly_budget_usd: f64,

    /// Fraction of a budget (0-1) above which spending is flagged
    #[serde(default = "default_alert_threshold")]
    pub budget_alert_threshold: f64,

    #[serde(default = "default_true")]
    pub enable_request_caching: bool,

    #[serde(default = "default_true")]
    pub enable_model_switching: bool,

    #[serde(default = "default_true")]
    pub cost_tracking_enabled: bool,

    #[serde(default = "default_model_tier")]
    pub default_model_tier: ModelTier,

    #[serde(default = "default_fallback_tier")]
    pub fallback_model_tier: ModelTier,

    /// Cost records older than this are dropped from history
    #[serde(default = "default_retention_days")]
    pub cost_retention_days: u32,

    /// Maximum number of cost records kept in memory
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            optimization_level: OptimizationLevel::default(),
            daily_budget_usd: default_daily_budget(),
            monthly_budget_usd: default_monthly_budget(),
            budget_alert_threshold: default_alert_threshold(),
            enable_request_caching: true,
            enable_model_switching: true,
            cost_tracking_enabled: true,
            default_model_tier: default_model_tier(),
            fallback_model_tier: default_fallback_tier(),
            cost_retention_days: default_retention_days(),
            history_capacity: default_history_capacity(),
        }
    }
}

/// Response cache sizing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_max_size")]
    pub max_size: usize,

    #[serde(default = "default_cache_ttl")]
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: default_cache_max_size(),
            ttl_seconds: default_cache_ttl(),
        }
    }
}

/// Per-user request allowance over a sliding window
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_rate_limit_requests")]
    pub requests: u32,

    #[serde(default = "default_rate_limit_window")]
    pub window_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests: default_rate_limit_requests(),
            window_seconds: default_rate_limit_window(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub openai: Vec<ProviderInstanceConfig>,
    #[serde(default)]
    pub anthropic: Vec<AnthropicInstanceConfig>,
    /// DeepSeek speaks the OpenAI chat completions protocol
    #[serde(default)]
    pub deepseek: Vec<ProviderInstanceConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderInstanceConfig {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub api_key: String,
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    /// Model used when a request does not name one
    #[serde(default)]
    pub default_model: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnthropicInstanceConfig {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub api_key: String,
    #[serde(default = "default_anthropic_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_anthropic_version")]
    pub api_version: String,
    #[serde(default)]
    pub default_model: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_true() -> bool {
    true
}

fn default_daily_budget() -> f64 {
    100.0
}

fn default_monthly_budget() -> f64 {
    3000.0
}

fn default_alert_threshold() -> f64 {
    0.8
}

fn default_model_tier() -> ModelTier {
    ModelTier::Standard
}

fn default_fallback_tier() -> ModelTier {
    ModelTier::Basic
}

fn default_retention_days() -> u32 {
    90
}

fn default_history_capacity() -> usize {
    10_000
}

fn default_cache_max_size() -> usize {
    10_000
}

fn default_cache_ttl() -> u64 {
    3600
}

fn default_rate_limit_requests() -> u32 {
    100
}

fn default_rate_limit_window() -> u64 {
    3600
}

fn default_timeout() -> u64 {
    60
}

fn default_anthropic_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_anthropic_version() -> String {
    "2023-06-01".to_string()
}

impl Config {
    /// Number of enabled provider instances across all vendors
    pub fn enabled_provider_count(&self) -> usize {
        self.providers.openai.iter().filter(|p| p.enabled).count()
            + self.providers.anthropic.iter().filter(|p| p.enabled).count()
            + self.providers.deepseek.iter().filter(|p| p.enabled).count()
    }

    /// Commands that talk to upstream APIs need at least one provider
    pub fn require_providers(&self) -> anyhow::Result<()> {
        if self.enabled_provider_count() == 0 {
            anyhow::bail!("At least one provider instance must be enabled");
        }
        Ok(())
    }
}

/// Load configuration from a TOML file, overlaid by `LLM_BROKER__*` env vars
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let config = config::Config::builder()
        .add_source(config::File::from(path))
        .add_source(config::Environment::with_prefix("LLM_BROKER").separator("__"))
        .build()?;

    let cfg: Config = config.try_deserialize()?;
    validate_config(&cfg)?;

    Ok(cfg)
}

const MIN_RATE_LIMIT_WINDOW_SECS: u64 = 60;

pub fn validate_config(cfg: &Config) -> anyhow::Result<()> {
    let opt = &cfg.optimizer;

    if opt.daily_budget_usd <= 0.0 {
        anyhow::bail!("daily_budget_usd must be positive");
    }
    if opt.monthly_budget_usd <= 0.0 {
        anyhow::bail!("monthly_budget_usd must be positive");
    }
    if !(opt.budget_alert_threshold > 0.0 && opt.budget_alert_threshold <= 1.0) {
        anyhow::bail!("budget_alert_threshold must be in (0, 1]");
    }
    if opt.cost_retention_days == 0 {
        anyhow::bail!("cost_retention_days must be >= 1");
    }
    if opt.history_capacity == 0 {
        anyhow::bail!("history_capacity must be >= 1");
    }
    if cfg.cache.max_size == 0 {
        anyhow::bail!("cache max_size must be >= 1");
    }
    if cfg.rate_limit.requests == 0 {
        anyhow::bail!("rate_limit requests must be >= 1");
    }
    if cfg.rate_limit.window_seconds < MIN_RATE_LIMIT_WINDOW_SECS {
        anyhow::bail!("rate_limit window_seconds must be >= {}", MIN_RATE_LIMIT_WINDOW_SECS);
    }
    if !matches!(cfg.logging.format.as_str(), "text" | "json") {
        anyhow::bail!("logging format must be 'text' or 'json', got '{}'", cfg.logging.format);
    }

    // Instance names identify providers in stats and failover, so they must be
    // unique across every vendor section.
    let mut names = std::collections::HashSet::new();
    let instances = cfg
        .providers
        .openai
        .iter()
        .map(|p| ("OpenAI", p.name.as_str(), p.enabled, p.api_key.as_str()))
        .chain(
            cfg.providers
                .deepseek
                .iter()
                .map(|p| ("DeepSeek", p.name.as_str(), p.enabled, p.api_key.as_str())),
        )
        .chain(
            cfg.providers
                .anthropic
                .iter()
                .map(|p| ("Anthropic", p.name.as_str(), p.enabled, p.api_key.as_str())),
        );

    for (vendor, name, enabled, api_key) in instances {
        if name.is_empty() {
            anyhow::bail!("{} instance name cannot be empty", vendor);
        }
        if !names.insert(name) {
            anyhow::bail!("{} instance name '{}' is duplicated", vendor, name);
        }
        if enabled && api_key.is_empty() {
            anyhow::bail!("{} instance '{}': api_key cannot be empty", vendor, name);
        }
    }

    for instance in &cfg.providers.anthropic {
        if instance.api_version.is_empty() {
            anyhow::bail!("Anthropic instance '{}': api_version cannot be empty", instance.name);
        }
    }

    Ok(())
}
