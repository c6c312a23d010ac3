pub mod budget;
pub mod cache;
pub mod config;
pub mod error;
pub mod load_balancer;
pub mod logging;
pub mod manager;
pub mod metrics;
pub mod models;
pub mod optimizer;
pub mod pricing;
pub mod providers;
pub mod rate_limit;
pub mod selector;
pub mod service;
pub mod streaming;

use std::sync::Arc;

pub use logging::init_tracing;

/// Wire the provider manager, cost optimizer, rate limiter and service facade from configuration
pub fn build_service(cfg: &config::Config) -> anyhow::Result<service::AiService> {
    let providers = providers::build_providers(&cfg.providers)?;
    let manager = Arc::new(manager::ProviderManager::new(providers));
    let optimizer = Arc::new(build_optimizer(cfg));

    Ok(service::AiService::new(manager, optimizer).with_rate_limit(&cfg.rate_limit))
}

pub fn build_optimizer(cfg: &config::Config) -> optimizer::CostOptimizer {
    optimizer::CostOptimizer::new(
        cfg.optimizer.clone(),
        &cfg.cache,
        Arc::new(pricing::PricingTable::default()),
    )
}
