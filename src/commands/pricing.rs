use colored::Colorize;
use llm_broker::pricing::{ModelTier, PricingTable};

/// Print the built-in pricing table, cheapest first
pub fn execute() {
    let table = PricingTable::default();
    let mut models: Vec<_> = table.iter().collect();
    models.sort_by(|a, b| a.total_price_per_1k().total_cmp(&b.total_price_per_1k()));

    println!("{}", "Model Pricing (USD per 1K tokens)".green().bold());
    println!();
    println!(
        "{:<28} {:<9} {:<10} {:>10} {:>10} {:>9}",
        "MODEL".bold(),
        "TIER".bold(),
        "KIND".bold(),
        "INPUT".bold(),
        "OUTPUT".bold(),
        "CONTEXT".bold()
    );

    for m in models {
        let kind = format!("{:?}", m.kind).to_lowercase();
        println!(
            "{:<28} {:<9} {:<10} {:>10.5} {:>10.5} {:>9}",
            m.model_name,
            colorize_tier(m.tier),
            kind,
            m.input_price_per_1k,
            m.output_price_per_1k,
            m.context_window
        );
    }
}

fn colorize_tier(tier: ModelTier) -> colored::ColoredString {
    let label = format!("{:<9}", tier.as_str());
    match tier {
        ModelTier::Basic => label.normal(),
        ModelTier::Standard => label.cyan(),
        ModelTier::Premium => label.yellow(),
        ModelTier::Ultra => label.magenta(),
    }
}
