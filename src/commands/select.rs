use anyhow::{anyhow, bail, Result};
use colored::Colorize;
use llm_broker::build_optimizer;
use llm_broker::pricing::PricingTable;
use llm_broker::selector::{ModelSelector, OptimizationLevel, SelectionCriteria, TaskComplexity};
use std::path::Path;
use std::sync::Arc;

pub struct SelectOptions {
    pub service: String,
    pub complexity: String,
    pub quality: f64,
    pub cost_sensitivity: f64,
    pub level: Option<String>,
}

pub fn execute(config_path: &Path, options: SelectOptions) -> Result<()> {
    let cfg = super::load_or_default(config_path)?;

    if !(0.0..=1.0).contains(&options.quality) {
        bail!("--quality must be between 0 and 1");
    }
    if !(0.0..=1.0).contains(&options.cost_sensitivity) {
        bail!("--cost-sensitivity must be between 0 and 1");
    }

    let task_complexity: TaskComplexity = options.complexity.parse().map_err(|e: String| anyhow!(e))?;
    let criteria = SelectionCriteria {
        service_type: options.service,
        task_complexity,
        quality_requirement: options.quality,
        cost_sensitivity: options.cost_sensitivity,
    };

    let (choice, level) = match options.level {
        Some(level) => {
            let level: OptimizationLevel = level.parse().map_err(|e: String| anyhow!(e))?;
            let selector = ModelSelector::new(Arc::new(PricingTable::default()), level)
                .with_model_switching(cfg.optimizer.enable_model_switching, cfg.optimizer.default_model_tier)
                .with_fallback_tier(cfg.optimizer.fallback_model_tier);
            (selector.select(&criteria), level)
        }
        None => {
            let optimizer = build_optimizer(&cfg);
            (optimizer.select_model(&criteria), cfg.optimizer.optimization_level)
        }
    };

    let table = PricingTable::default();
    let pricing = table.get_or_default(&choice.model_name);

    println!(
        "{} {} ({})",
        "Selected:".green().bold(),
        choice.model_name.bold(),
        choice.tier
    );
    println!("  Optimization Level: {} ({:?})", level, level.strategy());
    println!(
        "  Price per 1K tokens: ${:.5} in / ${:.5} out",
        pricing.input_price_per_1k, pricing.output_price_per_1k
    );
    println!(
        "  Example cost (1K in + 1K out): ${:.5}",
        pricing.calculate_cost(1000, 1000, 1)
    );

    Ok(())
}
