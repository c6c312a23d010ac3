mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use llm_broker::config::{load_config, LoggingConfig};
use llm_broker::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    // Logging settings come from the config file when it is readable;
    // commands report load errors themselves.
    let logging = load_config(&args.config)
        .map(|cfg| cfg.logging)
        .unwrap_or_else(|_| LoggingConfig::default());
    init_tracing(&logging.level, &logging.format)?;

    match args.command {
        cli::Commands::Config { action } => match action {
            cli::ConfigCommands::Show => commands::config::show(&args.config)?,
            cli::ConfigCommands::Validate => commands::config::validate(&args.config)?,
        },
        cli::Commands::Pricing => commands::pricing::execute(),
        cli::Commands::Select {
            service,
            complexity,
            quality,
            cost_sensitivity,
            level,
        } => {
            let options = commands::select::SelectOptions {
                service,
                complexity,
                quality,
                cost_sensitivity,
                level,
            };
            commands::select::execute(&args.config, options)?;
        }
        cli::Commands::Generate {
            prompt,
            system,
            model,
            provider,
            user,
            stream,
            export,
            metrics,
        } => {
            let options = commands::generate::GenerateOptions {
                prompt,
                system,
                model,
                provider,
                user,
                stream,
                export,
                metrics,
            };
            commands::generate::execute(&args.config, options).await?;
        }
        cli::Commands::Health => commands::health::execute(&args.config).await?,
        cli::Commands::Version => {
            println!("LLM Broker v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
