use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "broker", version, about = "LLM Broker: cost-aware multi-provider LLM client")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "broker.toml", global = true, env = "LLM_BROKER_CONFIG")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Configuration management commands
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Print the model pricing table
    Pricing,

    /// Show which model the selector would pick
    Select {
        /// Service type ("llm", "embedding", ...)
        #[arg(short, long, default_value = "llm")]
        service: String,

        /// Task complexity: simple, medium, complex
        #[arg(long, default_value = "medium")]
        complexity: String,

        /// Minimum quality requirement (0-1)
        #[arg(short, long, default_value = "0.8")]
        quality: f64,

        /// Weight of price over quality (0-1)
        #[arg(long, default_value = "0.5")]
        cost_sensitivity: f64,

        /// Override the configured optimization level
        #[arg(short, long)]
        level: Option<String>,
    },

    /// Send a prompt through the provider manager
    Generate {
        /// User prompt
        #[arg(short, long)]
        prompt: String,

        /// Optional system prompt
        #[arg(long)]
        system: Option<String>,

        /// Model name (provider default when omitted)
        #[arg(short, long)]
        model: Option<String>,

        /// Pin the request to one provider instance
        #[arg(long)]
        provider: Option<String>,

        /// Caller id the rate limit is counted against
        #[arg(long)]
        user: Option<String>,

        /// Stream the response as it arrives
        #[arg(long)]
        stream: bool,

        /// Print the cost report afterwards: json or csv
        #[arg(long)]
        export: Option<String>,

        /// Print Prometheus metrics afterwards
        #[arg(long)]
        metrics: bool,
    },

    /// Initialize providers and report their health
    Health,

    /// Show version information
    Version,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommands {
    /// Display current configuration (with secrets masked)
    Show,

    /// Validate configuration file
    Validate,
}
