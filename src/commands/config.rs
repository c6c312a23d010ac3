use anyhow::Result;
use colored::Colorize;
use llm_broker::config::{self, Config};
use std::path::Path;
use tracing::info;

/// Execute the config show command
///
/// Displays the current configuration with secrets masked
pub fn show(path: &Path) -> Result<()> {
    println!("{}", "Loading configuration...".yellow());
    info!(path = %path.display(), "Loading configuration for display");

    let cfg = config::load_config(path)?;
    let sanitized = sanitize_secrets(&cfg);

    println!("{}", "Current Configuration:".green().bold());
    println!();

    let toml_string = toml::to_string_pretty(&sanitized)?;
    println!("{}", toml_string);

    Ok(())
}

/// Execute the config validate command
pub fn validate(path: &Path) -> Result<()> {
    println!("{}", "Validating configuration...".yellow());
    info!(path = %path.display(), "Validating configuration file");

    let cfg = config::load_config(path)?;
    cfg.require_providers()?;

    println!("{}", "✓ Configuration is valid".green());
    println!();
    println!("{}", "Summary:".bold());
    println!("  Optimization Level: {}", cfg.optimizer.optimization_level);
    println!(
        "  Budgets: ${:.2}/day, ${:.2}/month (alert at {:.0}%)",
        cfg.optimizer.daily_budget_usd,
        cfg.optimizer.monthly_budget_usd,
        cfg.optimizer.budget_alert_threshold * 100.0
    );
    println!(
        "  Request Caching: {} (max {} entries, ttl {}s)",
        on_off(cfg.optimizer.enable_request_caching),
        cfg.cache.max_size,
        cfg.cache.ttl_seconds
    );
    if cfg.rate_limit.enabled {
        println!(
            "  Rate Limit: {} requests per {}s per user",
            cfg.rate_limit.requests, cfg.rate_limit.window_seconds
        );
    } else {
        println!("  Rate Limit: off");
    }
    println!("  Enabled Provider Instances: {}", cfg.enabled_provider_count());

    Ok(())
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}

/// Mask API keys for safe display
fn sanitize_secrets(cfg: &Config) -> Config {
    let mut sanitized = cfg.clone();

    for instance in sanitized
        .providers
        .openai
        .iter_mut()
        .chain(sanitized.providers.deepseek.iter_mut())
    {
        instance.api_key = mask_api_key(&instance.api_key);
    }
    for instance in &mut sanitized.providers.anthropic {
        instance.api_key = mask_api_key(&instance.api_key);
    }

    sanitized
}

/// Shows first 7 and last 4 characters with dots in between
/// Example: "sk-1234567890abcdef" -> "sk-1234...cdef"
fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 11 {
        return "***".to_string();
    }

    let prefix: String = chars[..7].iter().collect();
    let suffix: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", prefix, suffix)
}
