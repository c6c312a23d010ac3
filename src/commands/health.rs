use anyhow::Result;
use colored::Colorize;
use llm_broker::build_service;
use llm_broker::config::load_config;
use llm_broker::manager::OverallHealth;
use std::path::Path;

/// Initialize every configured provider and print the health report
pub async fn execute(config_path: &Path) -> Result<()> {
    let cfg = load_config(config_path)?;
    cfg.require_providers()?;

    let service = build_service(&cfg)?;
    let report = service.manager().health_check().await;

    let overall = match report.overall {
        OverallHealth::Healthy => "healthy".green().bold(),
        OverallHealth::Degraded => "degraded".yellow().bold(),
        OverallHealth::Unhealthy => "unhealthy".red().bold(),
    };
    println!(
        "Overall: {} ({}/{} providers active)",
        overall, report.active_providers, report.total_providers
    );
    println!();

    for provider in &report.providers {
        let marker = if provider.healthy { "✓".green() } else { "✗".red() };
        match &provider.error {
            Some(error) => println!("  {} {:<20} {}", marker, provider.name, error.dimmed()),
            None => println!("  {} {}", marker, provider.name),
        }
    }

    if report.overall == OverallHealth::Unhealthy {
        anyhow::bail!("no provider could be initialized");
    }
    Ok(())
}
